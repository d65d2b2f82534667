use anyhow::Result;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use brainboard_client::{BrainClient, ChatStreamRequest};
use brainboard_schema::{ChatSession, NotificationKind};

use crate::rehydrate::rehydrate_message;
use crate::store::ChatStore;

const DEFAULT_MAX_CONTEXT_ITEMS: u32 = 10;

/// Drives one conversation: opens the streaming call, folds events into the
/// store, reloads history. Owns the store for the lifetime of the chat view.
pub struct ChatService {
    client: BrainClient,
    pub(crate) store: ChatStore,
    max_context_items: u32,
    cancel: CancellationToken,
}

impl ChatService {
    pub fn new(
        client: BrainClient,
        user_id: impl Into<String>,
        org_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store: ChatStore::new(user_id, org_id),
            max_context_items: DEFAULT_MAX_CONTEXT_ITEMS,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_max_context_items(mut self, max_context_items: u32) -> Self {
        self.max_context_items = max_context_items;
        self
    }

    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    /// Token for the current stream; cancelling it ends the read loop
    /// deterministically, keeping whatever was already folded.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Send one user message and fold the response stream to completion.
    ///
    /// No-ops on empty/whitespace content and while a previous send is
    /// still loading or streaming, checked synchronously before any state
    /// mutation, so rapid double calls produce exactly one request.
    /// Failures surface in the store (apology text + notification), never
    /// as a return error; flags are cleared on every exit path.
    pub async fn send_message(&mut self, content: &str) {
        let content = content.trim();
        if content.is_empty() {
            return;
        }
        if self.store.is_busy() {
            debug!("send refused: a previous send is still in flight");
            return;
        }

        self.store.begin_exchange(content);

        let session = self.store.session();
        let request = ChatStreamRequest {
            query: content.to_string(),
            org_id: session.org_id.clone(),
            user_id: session.user_id.clone(),
            // A temp- placeholder id must never reach the server.
            session_id: (!session.is_temporary()).then(|| session.id.clone()),
            max_context_items: self.max_context_items,
        };

        if let Err(err) = self.run_stream(&request).await {
            warn!(error = %err, "chat stream failed");
            self.store.fail_stream(&err.to_string());
        }
        self.store.finish_exchange();
    }

    async fn run_stream(&mut self, request: &ChatStreamRequest) -> Result<()> {
        let cancel = self.cancel.clone();
        let mut stream = self.client.stream_chat(request).await?;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("stream read cancelled");
                    return Ok(());
                }
                next = stream.next() => match next {
                    Some(Ok(event)) => self.store.apply_event(event),
                    Some(Err(err)) => return Err(err),
                    None => return Ok(()),
                },
            }
        }
    }

    /// Load a stored session and reconstruct its messages. On failure the
    /// current view is kept and an error notification raised.
    pub async fn load_session(&mut self, session_id: &str) {
        if self.store.is_busy() {
            debug!("load refused while a send is in flight");
            return;
        }
        match self.client.get_session(session_id).await {
            Ok(history) => {
                let messages = history.messages.iter().map(rehydrate_message).collect::<Vec<_>>();
                let current = self.store.session();
                let session = ChatSession {
                    id: session_id.to_string(),
                    user_id: current.user_id.clone(),
                    org_id: current.org_id.clone(),
                    title: history.title,
                    status: "active".to_string(),
                    category: None,
                    created_at: history.created_at,
                    updated_at: history.updated_at,
                    message_count: messages.len() as u32,
                };
                self.store.replace_session(session, messages);
            }
            Err(err) => {
                warn!(session_id, error = %err, "failed to load session");
                self.notify_error(format!("Failed to load session: {err}"));
            }
        }
    }

    /// Session summaries for the sidebar. Falls back to an empty list on
    /// failure rather than blocking the view.
    pub async fn list_sessions(&mut self, limit: u32) -> Vec<ChatSession> {
        let session = self.store.session();
        let (user_id, org_id) = (session.user_id.clone(), session.org_id.clone());
        match self.client.list_sessions(&user_id, &org_id, limit).await {
            Ok(sessions) => sessions,
            Err(err) => {
                warn!(error = %err, "failed to list sessions");
                self.notify_error(format!("Failed to load history: {err}"));
                vec![]
            }
        }
    }

    pub async fn delete_session(&mut self, session_id: &str) -> bool {
        match self.client.delete_session(session_id).await {
            Ok(()) => {
                if self.store.session().id == session_id {
                    self.new_chat();
                }
                true
            }
            Err(err) => {
                warn!(session_id, error = %err, "failed to delete session");
                self.notify_error(format!("Failed to delete session: {err}"));
                false
            }
        }
    }

    /// Abandon the current conversation: cancel any in-flight stream and
    /// reset to a fresh temporary session.
    pub fn new_chat(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.store.start_new_session();
    }

    pub fn dismiss_notification(&mut self, id: uuid::Uuid) {
        self.store.dismiss_notification(id);
    }

    fn notify_error(&mut self, message: String) {
        self.store.notifications.push(
            brainboard_schema::Notification::new(NotificationKind::Error, message, false),
        );
    }
}
