//! HTTP client for the brain backend API (REST + streamed chat).

mod sse;

use std::pin::Pin;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures_core::Stream;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use brainboard_schema::{ChatSession, Edge, Entity, KgStats, SessionHistory, StreamEvent};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

/// Environment override for the backend host. The only externally
/// meaningful configuration surface of the client.
pub const API_BASE_ENV: &str = "BRAINBOARD_API_BASE";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiErrorKind {
    RateLimit,
    ServerError,
    Timeout,
    AuthError,
    InvalidRequest,
    NotFound,
    Unknown,
}

impl ApiErrorKind {
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            429 => Self::RateLimit,
            401 | 403 => Self::AuthError,
            404 => Self::NotFound,
            400 | 422 => Self::InvalidRequest,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::ServerError | Self::Timeout)
    }
}

/// Body of `POST /api/v1/chat/stream`. `session_id` is omitted entirely
/// while the client only holds a temporary session id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamRequest {
    pub query: String,
    pub org_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub max_context_items: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct SessionList {
    sessions: Vec<ChatSession>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityPage {
    pub entities: Vec<Entity>,
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgePage {
    pub edges: Vec<Edge>,
    pub total: u64,
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct BrainClient {
    client: reqwest::Client,
    api_base: String,
}

impl BrainClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(config.base_url.clone())
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Open the streaming chat call. The response body is consumed
    /// incrementally and parsed into typed events; this request is never
    /// retried.
    pub async fn stream_chat(
        &self,
        request: &ChatStreamRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>> {
        let url = format!("{}/api/v1/chat/stream", self.api_base);
        let resp = match self
            .client
            .post(url)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return Err(transport_error(e)),
        };

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            return Err(format_api_error(status, detail_from_body(&text)));
        }

        Ok(Box::pin(sse::parse_event_stream(resp.bytes_stream())))
    }

    /// `GET /api/v1/chat/{session_id}`: full message history.
    pub async fn get_session(&self, session_id: &str) -> Result<SessionHistory> {
        self.get_json(
            &format!("{}/api/v1/chat/{session_id}", self.api_base),
            &[],
        )
        .await
    }

    /// `GET /api/v1/chat/history`: session summaries for a user/org.
    pub async fn list_sessions(
        &self,
        user_id: &str,
        org_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatSession>> {
        let list: SessionList = self
            .get_json(
                &format!("{}/api/v1/chat/history", self.api_base),
                &[
                    ("user_id", user_id.to_string()),
                    ("org_id", org_id.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(list.sessions)
    }

    /// `DELETE /api/v1/chat/{session_id}`. Destructive, never retried.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let url = format!("{}/api/v1/chat/{session_id}", self.api_base);
        let resp = match self.client.delete(url).send().await {
            Ok(r) => r,
            Err(e) => return Err(transport_error(e)),
        };
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(format_api_error(status, detail_from_body(&text)));
        }
        Ok(())
    }

    pub async fn kg_stats(&self, org_id: &str) -> Result<KgStats> {
        self.get_json(&format!("{}/api/v1/kg/stats/{org_id}", self.api_base), &[])
            .await
    }

    /// One page of entities.
    pub async fn kg_entities(&self, org_id: &str, limit: u32, offset: u64) -> Result<EntityPage> {
        self.get_json(
            &format!("{}/api/v1/kg/entities/{org_id}", self.api_base),
            &[("limit", limit.to_string()), ("offset", offset.to_string())],
        )
        .await
    }

    /// One page of edges.
    pub async fn kg_edges(&self, org_id: &str, limit: u32, offset: u64) -> Result<EdgePage> {
        self.get_json(
            &format!("{}/api/v1/kg/edges/{org_id}", self.api_base),
            &[("limit", limit.to_string()), ("offset", offset.to_string())],
        )
        .await
    }

    /// Page through `/kg/entities` until the local count reaches the
    /// server-reported total. An empty page before that point ends the
    /// loop early rather than spinning.
    pub async fn fetch_all_entities(&self, org_id: &str, page_size: u32) -> Result<Vec<Entity>> {
        let mut all = Vec::new();
        loop {
            let page = self.kg_entities(org_id, page_size, all.len() as u64).await?;
            let fetched = page.entities.len();
            all.extend(page.entities);
            if all.len() as u64 >= page.total || fetched == 0 {
                if (all.len() as u64) < page.total {
                    tracing::warn!(
                        org_id,
                        have = all.len(),
                        total = page.total,
                        "entity pagination ended early on an empty page"
                    );
                }
                return Ok(all);
            }
        }
    }

    /// Page through `/kg/edges` the same way.
    pub async fn fetch_all_edges(&self, org_id: &str, page_size: u32) -> Result<Vec<Edge>> {
        let mut all = Vec::new();
        loop {
            let page = self.kg_edges(org_id, page_size, all.len() as u64).await?;
            let fetched = page.edges.len();
            all.extend(page.edges);
            if all.len() as u64 >= page.total || fetched == 0 {
                if (all.len() as u64) < page.total {
                    tracing::warn!(
                        org_id,
                        have = all.len(),
                        total = page.total,
                        "edge pagination ended early on an empty page"
                    );
                }
                return Ok(all);
            }
        }
    }

    /// GET with bounded retry. Only idempotent reads come through here;
    /// retry is gated on the `[retryable]` classification.
    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_get_json(url, query).await {
                Ok(value) => return Ok(value),
                Err(err)
                    if attempt < RETRY_ATTEMPTS && err.to_string().contains("[retryable]") =>
                {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                    tracing::debug!(url, attempt, ?delay, "retrying idempotent read");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let resp = match self.client.get(url).query(query).send().await {
            Ok(r) => r,
            Err(e) => return Err(transport_error(e)),
        };
        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            return Err(format_api_error(status, detail_from_body(&text)));
        }
        Ok(resp.json().await?)
    }
}

fn transport_error(e: reqwest::Error) -> anyhow::Error {
    if e.is_timeout() {
        anyhow!("brain api error (timeout) [retryable]: request timed out after 60s")
    } else if e.is_connect() {
        anyhow!("brain api error (connect) [retryable]: {e}")
    } else {
        e.into()
    }
}

/// Backend errors carry a `detail` field when they come from the API layer;
/// anything else is reported raw.
fn detail_from_body(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        detail: String,
    }
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.detail)
        .ok()
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
}

fn format_api_error(status: StatusCode, detail: Option<String>) -> anyhow::Error {
    let kind = ApiErrorKind::from_status(status);
    let retryable = if kind.is_retryable() {
        " [retryable]"
    } else {
        ""
    };
    match detail {
        Some(detail) => anyhow!("brain api error ({status}){retryable}: {detail}"),
        None => anyhow!("brain api error ({status}){retryable}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let client = BrainClient::new("http://localhost:8000/");
        assert_eq!(client.api_base(), "http://localhost:8000");
    }

    #[test]
    fn api_error_kind_classification() {
        assert_eq!(
            ApiErrorKind::from_status(StatusCode::TOO_MANY_REQUESTS),
            ApiErrorKind::RateLimit
        );
        assert_eq!(
            ApiErrorKind::from_status(StatusCode::INTERNAL_SERVER_ERROR),
            ApiErrorKind::ServerError
        );
        assert_eq!(
            ApiErrorKind::from_status(StatusCode::UNAUTHORIZED),
            ApiErrorKind::AuthError
        );
        assert_eq!(
            ApiErrorKind::from_status(StatusCode::NOT_FOUND),
            ApiErrorKind::NotFound
        );
        assert!(ApiErrorKind::RateLimit.is_retryable());
        assert!(ApiErrorKind::Timeout.is_retryable());
        assert!(!ApiErrorKind::NotFound.is_retryable());
        assert!(!ApiErrorKind::InvalidRequest.is_retryable());
    }

    #[test]
    fn format_api_error_marks_retryable() {
        let err = format_api_error(StatusCode::INTERNAL_SERVER_ERROR, None);
        assert!(err.to_string().contains("[retryable]"));
        assert!(err.to_string().contains("500"));

        let err = format_api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            Some("query: field required".into()),
        );
        let text = err.to_string();
        assert!(!text.contains("[retryable]"));
        assert!(text.contains("query: field required"));
    }

    #[test]
    fn detail_parsing_falls_back_to_raw_body() {
        assert_eq!(
            detail_from_body(r#"{"detail":"session not found"}"#).as_deref(),
            Some("session not found")
        );
        assert_eq!(
            detail_from_body("upstream exploded").as_deref(),
            Some("upstream exploded")
        );
        assert_eq!(detail_from_body("   "), None);
    }

    #[test]
    fn stream_request_omits_temporary_session_id() {
        let request = ChatStreamRequest {
            query: "what changed this week?".into(),
            org_id: "org-1".into(),
            user_id: "user-1".into(),
            session_id: None,
            max_context_items: 10,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("session_id").is_none());
        assert_eq!(json["max_context_items"], 10);
    }

    #[test]
    fn stream_request_carries_durable_session_id() {
        let request = ChatStreamRequest {
            query: "follow up".into(),
            org_id: "org-1".into(),
            user_id: "user-1".into(),
            session_id: Some("9f3c2a".into()),
            max_context_items: 10,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["session_id"], "9f3c2a");
    }

    #[test]
    fn api_config_default_points_at_local_dev() {
        assert_eq!(ApiConfig::default().base_url, DEFAULT_API_BASE);
    }
}
