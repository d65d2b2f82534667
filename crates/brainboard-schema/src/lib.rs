use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session ids minted locally before the backend has assigned a durable id.
/// A temporary id must never be sent back to the server.
pub const TEMP_SESSION_PREFIX: &str = "temp-";

/// A node in the org's knowledge graph as the backend reports it.
/// `entity_type` drives visual styling only, never behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Edges reference entities by name, not id. The graph layer resolves the
/// name join; an endpoint that resolves to no known entity drops the edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeEndpoint {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
}

/// A directed, confidence-scored relationship between two named entities.
/// Multiple edges between the same pair with different relations are allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub relation: String,
    /// In [0, 1].
    pub confidence: f64,
    pub source: EdgeEndpoint,
    pub target: EdgeEndpoint,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One retrieval source surfaced during a conversation and mirrored into
/// the context drawer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnippet {
    pub source: String,
    pub snippet: String,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// High and critical plans demand operator attention before execution.
    pub fn needs_attention(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }

    /// Lenient parse for values rehydrated from stored metadata.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "medium" => Self::Medium,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Proposed,
    Approved,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub description: String,
    #[serde(default)]
    pub tool: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedStep {
    pub step: String,
    pub result: String,
}

/// A multi-step, risk-scored, optionally approval-gated agent execution plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub goal: String,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub requires_approval: bool,
    pub status: PlanStatus,
    #[serde(default)]
    pub steps_completed: u32,
    #[serde(default)]
    pub steps_total: u32,
    #[serde(default)]
    pub executed_steps: Vec<ExecutedStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substep {
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: String,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub progress: f32,
    #[serde(default)]
    pub substeps: Vec<Substep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
    pub severity: EventSeverity,
    pub event: String,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// Confidence-scored self-assessment emitted by the reasoning backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    pub content: String,
    pub confidence: f64,
}

/// Variant payload of a chat message, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePayload {
    Text,
    ActionPlan(ActionPlan),
    Insight(Insight),
    Task(TaskItem),
    SystemEvent(SystemEvent),
    Reflection(Reflection),
}

impl MessagePayload {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::ActionPlan(_) => "action_plan",
            Self::Insight(_) => "insight",
            Self::Task(_) => "task",
            Self::SystemEvent(_) => "system_event",
            Self::Reflection(_) => "reflection",
        }
    }
}

/// A rendered chat message. Created when a stream event of the matching
/// type arrives and mutated in place (by id) as later events refine it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub context: Vec<ContextSnippet>,
    #[serde(flatten)]
    pub payload: MessagePayload,
}

impl ChatMessage {
    pub fn user(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            role: ChatRole::User,
            content: content.into(),
            created_at: Utc::now(),
            context: vec![],
            payload: MessagePayload::Text,
        }
    }

    /// Empty assistant placeholder, progressively filled by stream events.
    pub fn assistant_placeholder(session_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            role: ChatRole::Assistant,
            content: String::new(),
            created_at: Utc::now(),
            context: vec![],
            payload: MessagePayload::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub org_id: String,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub message_count: u32,
}

impl ChatSession {
    /// In-memory placeholder used until the first message is actually sent
    /// and the backend assigns a durable id.
    pub fn temporary(user_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("{TEMP_SESSION_PREFIX}{}", Uuid::new_v4()),
            user_id: user_id.into(),
            org_id: org_id.into(),
            title: "New conversation".to_string(),
            status: "active".to_string(),
            category: None,
            created_at: now,
            updated_at: now,
            message_count: 0,
        }
    }

    pub fn is_temporary(&self) -> bool {
        self.id.starts_with(TEMP_SESSION_PREFIX)
    }
}

/// One JSON record in a server-sent chat response, tagged by `type`.
/// Unrecognized types deserialize to `Unknown` so new server event kinds
/// never break the reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Session {
        session_id: String,
        #[serde(default)]
        title: Option<String>,
    },
    Context {
        items: Vec<ContextSnippet>,
    },
    Token {
        text: String,
    },
    ActionPlan(ActionPlan),
    Insight(Insight),
    TaskUpdate(TaskItem),
    SystemEvent(SystemEvent),
    Reflection(Reflection),
    Done,
    Error {
        message: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Warning,
    Error,
}

/// A user-facing notice raised by the chat reducer. Non-auto-dismissing
/// notifications stay until the operator acts on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub auto_dismiss: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>, auto_dismiss: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            auto_dismiss,
            created_at: Utc::now(),
        }
    }
}

/// Wire shape of one row in `GET /api/v1/chat/{session_id}`. The payload
/// variant is reconstructed from `metadata.message_type` on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub session_id: String,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub context: Vec<ContextSnippet>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHistory {
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<StoredMessage>,
}

/// Aggregate counts from `GET /api/v1/kg/stats/{org_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KgStats {
    pub entity_count: u64,
    pub edge_count: u64,
}
