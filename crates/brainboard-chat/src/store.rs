use tracing::debug;
use uuid::Uuid;

use brainboard_schema::{
    ChatMessage, ChatSession, ContextSnippet, MessagePayload, Notification, NotificationKind,
    StreamEvent, TaskItem,
};

/// Shown in place of the assistant reply when the stream fails outright.
pub const STREAM_FAILURE_MESSAGE: &str =
    "Sorry, something went wrong while answering. Please try again.";

/// Shared mutable state for one chat view, created and torn down with it.
/// Updated only through the operations below; the async service layer calls
/// them, nothing mutates fields from outside.
#[derive(Debug)]
pub struct ChatStore {
    session: ChatSession,
    pub messages: Vec<ChatMessage>,
    pub notifications: Vec<Notification>,
    /// The context drawer: retrieval sources mirrored out of messages.
    pub context_items: Vec<ContextSnippet>,
    /// Active tasks side list, upserted by task id.
    pub active_tasks: Vec<TaskItem>,
    pub last_error: Option<String>,
    is_loading: bool,
    is_streaming: bool,
    streaming_message_id: Option<String>,
}

impl ChatStore {
    pub fn new(user_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            session: ChatSession::temporary(user_id, org_id),
            messages: Vec::new(),
            notifications: Vec::new(),
            context_items: Vec::new(),
            active_tasks: Vec::new(),
            last_error: None,
            is_loading: false,
            is_streaming: false,
            streaming_message_id: None,
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    /// The send guard: true while a previous send is loading or streaming.
    pub fn is_busy(&self) -> bool {
        self.is_loading || self.is_streaming
    }

    /// Optimistically append the user message and the empty assistant
    /// placeholder the stream will fill, and mark the exchange in flight.
    pub fn begin_exchange(&mut self, content: &str) {
        let user = ChatMessage::user(self.session.id.clone(), content);
        let assistant = ChatMessage::assistant_placeholder(self.session.id.clone());
        self.streaming_message_id = Some(assistant.id.clone());
        self.messages.push(user);
        self.messages.push(assistant);
        self.session.message_count += 2;
        self.is_loading = true;
        self.is_streaming = true;
        self.last_error = None;
    }

    /// Fold one stream event into the store.
    pub fn apply_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Session { session_id, title } => {
                // Adopt the server-issued id only while we hold a placeholder.
                if self.session.is_temporary() {
                    for msg in &mut self.messages {
                        if msg.session_id == self.session.id {
                            msg.session_id = session_id.clone();
                        }
                    }
                    self.session.id = session_id;
                    if let Some(title) = title {
                        self.session.title = title;
                    }
                }
            }
            StreamEvent::Context { items } => {
                if let Some(msg) = self.streaming_message_mut() {
                    msg.context.extend(items.iter().cloned());
                }
                self.context_items.extend(items);
            }
            StreamEvent::Token { text } => {
                if let Some(msg) = self.streaming_message_mut() {
                    msg.content.push_str(&text);
                }
            }
            StreamEvent::ActionPlan(plan) => {
                let needs_attention = plan.risk_level.needs_attention();
                if let Some(msg) = self.streaming_message_mut() {
                    msg.payload = MessagePayload::ActionPlan(plan);
                }
                if needs_attention {
                    self.notify(
                        NotificationKind::Warning,
                        "Action plan requires operator review before execution",
                        false,
                    );
                }
            }
            StreamEvent::Insight(insight) => {
                if let Some(msg) = self.streaming_message_mut() {
                    msg.payload = MessagePayload::Insight(insight);
                }
            }
            StreamEvent::TaskUpdate(task) => {
                self.upsert_task(task.clone());
                if let Some(msg) = self.streaming_message_mut() {
                    msg.payload = MessagePayload::Task(task);
                }
            }
            StreamEvent::SystemEvent(event) => {
                match event.severity {
                    brainboard_schema::EventSeverity::Error => {
                        self.notify(NotificationKind::Error, event.event.clone(), true);
                    }
                    brainboard_schema::EventSeverity::Warning => {
                        self.notify(NotificationKind::Warning, event.event.clone(), true);
                    }
                    brainboard_schema::EventSeverity::Info => {}
                }
                if let Some(msg) = self.streaming_message_mut() {
                    msg.payload = MessagePayload::SystemEvent(event);
                }
            }
            StreamEvent::Reflection(reflection) => {
                if let Some(msg) = self.streaming_message_mut() {
                    msg.payload = MessagePayload::Reflection(reflection);
                }
            }
            StreamEvent::Done => {
                self.is_streaming = false;
            }
            StreamEvent::Error { message } => {
                self.last_error = Some(message.clone());
                self.notify(NotificationKind::Error, message, false);
                // Terminal, but the partially built message is retained.
                self.is_streaming = false;
            }
            StreamEvent::Unknown => {
                debug!("ignoring unrecognized stream event type");
            }
        }
    }

    /// Transport or parse failure: the placeholder is overwritten with a
    /// generic apology rather than discarded.
    pub fn fail_stream(&mut self, error: &str) {
        self.last_error = Some(error.to_string());
        if let Some(msg) = self.streaming_message_mut() {
            msg.content = STREAM_FAILURE_MESSAGE.to_string();
            msg.payload = MessagePayload::Text;
        }
        self.notify(NotificationKind::Error, error.to_string(), false);
    }

    /// Guaranteed-cleanup path: flags are cleared on every exit, success or
    /// failure.
    pub fn finish_exchange(&mut self) {
        self.is_loading = false;
        self.is_streaming = false;
        self.streaming_message_id = None;
    }

    /// Swap in a session loaded from the backend, rebuilding the side lists
    /// from the reconstructed messages.
    pub fn replace_session(&mut self, session: ChatSession, messages: Vec<ChatMessage>) {
        self.context_items = messages
            .iter()
            .flat_map(|m| m.context.iter().cloned())
            .collect();
        self.active_tasks = messages
            .iter()
            .filter_map(|m| match &m.payload {
                MessagePayload::Task(task) => Some(task.clone()),
                _ => None,
            })
            .collect();
        self.session = session;
        self.messages = messages;
        self.last_error = None;
        self.finish_exchange();
    }

    /// Reset to a fresh in-memory session.
    pub fn start_new_session(&mut self) {
        let user_id = self.session.user_id.clone();
        let org_id = self.session.org_id.clone();
        *self = Self::new(user_id, org_id);
    }

    pub fn dismiss_notification(&mut self, id: Uuid) {
        self.notifications.retain(|n| n.id != id);
    }

    fn notify(&mut self, kind: NotificationKind, message: impl Into<String>, auto_dismiss: bool) {
        self.notifications
            .push(Notification::new(kind, message, auto_dismiss));
    }

    fn upsert_task(&mut self, task: TaskItem) {
        match self.active_tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => self.active_tasks.push(task),
        }
    }

    fn streaming_message_mut(&mut self) -> Option<&mut ChatMessage> {
        let id = self.streaming_message_id.as_deref()?;
        self.messages.iter_mut().find(|m| m.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainboard_schema::{
        ActionPlan, ChatRole, EventSeverity, PlanStatus, Reflection, RiskLevel, SystemEvent,
    };

    fn store() -> ChatStore {
        ChatStore::new("user-1", "org-1")
    }

    fn busy_store() -> ChatStore {
        let mut s = store();
        s.begin_exchange("what changed this week?");
        s
    }

    #[test]
    fn begin_exchange_appends_user_and_placeholder() {
        let s = busy_store();
        assert_eq!(s.messages.len(), 2);
        assert_eq!(s.messages[0].role, ChatRole::User);
        assert_eq!(s.messages[0].content, "what changed this week?");
        assert_eq!(s.messages[1].role, ChatRole::Assistant);
        assert!(s.messages[1].content.is_empty());
        assert!(s.is_busy());
    }

    #[test]
    fn tokens_accumulate_on_the_placeholder() {
        let mut s = busy_store();
        s.apply_event(StreamEvent::Token { text: "Two ".into() });
        s.apply_event(StreamEvent::Token {
            text: "launches.".into(),
        });
        assert_eq!(s.messages[1].content, "Two launches.");
        assert!(s.messages[0].content.contains("week"));
    }

    #[test]
    fn session_event_adopts_server_id_once() {
        let mut s = busy_store();
        assert!(s.session().is_temporary());
        s.apply_event(StreamEvent::Session {
            session_id: "sess-1".into(),
            title: Some("Weekly changes".into()),
        });
        assert_eq!(s.session().id, "sess-1");
        assert_eq!(s.session().title, "Weekly changes");
        assert_eq!(s.messages[0].session_id, "sess-1");

        // A durable id is never replaced.
        s.apply_event(StreamEvent::Session {
            session_id: "sess-2".into(),
            title: None,
        });
        assert_eq!(s.session().id, "sess-1");
    }

    #[test]
    fn context_is_attached_and_mirrored_to_drawer() {
        let mut s = busy_store();
        let items = vec![ContextSnippet {
            source: "notion/roadmap".into(),
            snippet: "Q3 plan".into(),
            score: Some(0.91),
        }];
        s.apply_event(StreamEvent::Context {
            items: items.clone(),
        });
        assert_eq!(s.messages[1].context, items);
        assert_eq!(s.context_items, items);
    }

    #[test]
    fn high_risk_plan_raises_sticky_notification() {
        let mut s = busy_store();
        s.apply_event(StreamEvent::ActionPlan(ActionPlan {
            goal: "rotate credentials".into(),
            steps: vec![],
            risk_level: RiskLevel::Critical,
            requires_approval: true,
            status: PlanStatus::Proposed,
            steps_completed: 0,
            steps_total: 0,
            executed_steps: vec![],
        }));
        assert!(matches!(
            s.messages[1].payload,
            MessagePayload::ActionPlan(_)
        ));
        assert_eq!(s.notifications.len(), 1);
        assert_eq!(s.notifications[0].kind, NotificationKind::Warning);
        assert!(!s.notifications[0].auto_dismiss);
    }

    #[test]
    fn low_risk_plan_is_silent() {
        let mut s = busy_store();
        s.apply_event(StreamEvent::ActionPlan(ActionPlan {
            goal: "summarize standups".into(),
            steps: vec![],
            risk_level: RiskLevel::Low,
            requires_approval: false,
            status: PlanStatus::Proposed,
            steps_completed: 0,
            steps_total: 0,
            executed_steps: vec![],
        }));
        assert!(s.notifications.is_empty());
    }

    #[test]
    fn task_update_upserts_by_id() {
        let mut s = busy_store();
        let task = |progress: f32| TaskItem {
            id: "t1".into(),
            title: "reindex memory".into(),
            status: "running".into(),
            progress,
            substeps: vec![],
        };
        s.apply_event(StreamEvent::TaskUpdate(task(0.2)));
        s.apply_event(StreamEvent::TaskUpdate(task(0.8)));
        assert_eq!(s.active_tasks.len(), 1);
        assert!((s.active_tasks[0].progress - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn system_event_severity_drives_notifications() {
        let mut s = busy_store();
        s.apply_event(StreamEvent::SystemEvent(SystemEvent {
            severity: EventSeverity::Info,
            event: "index refreshed".into(),
            detail: None,
        }));
        assert!(s.notifications.is_empty());

        s.apply_event(StreamEvent::SystemEvent(SystemEvent {
            severity: EventSeverity::Error,
            event: "retriever degraded".into(),
            detail: None,
        }));
        assert_eq!(s.notifications.len(), 1);
        assert_eq!(s.notifications[0].kind, NotificationKind::Error);
        assert!(s.notifications[0].auto_dismiss);
        // Log-and-continue: the stream is still live.
        assert!(s.is_streaming());
    }

    #[test]
    fn done_clears_streaming_flag() {
        let mut s = busy_store();
        s.apply_event(StreamEvent::Done);
        assert!(!s.is_streaming());
        // Loading is cleared by the service's guaranteed-cleanup path.
        assert!(s.is_loading());
        s.finish_exchange();
        assert!(!s.is_busy());
    }

    #[test]
    fn error_event_keeps_partial_message() {
        let mut s = busy_store();
        s.apply_event(StreamEvent::Token {
            text: "partial answer".into(),
        });
        s.apply_event(StreamEvent::Error {
            message: "reasoner crashed".into(),
        });
        assert_eq!(s.messages[1].content, "partial answer");
        assert_eq!(s.last_error.as_deref(), Some("reasoner crashed"));
        assert_eq!(s.notifications.len(), 1);
        assert_eq!(s.notifications[0].kind, NotificationKind::Error);
    }

    #[test]
    fn unknown_event_is_ignored() {
        let mut s = busy_store();
        s.apply_event(StreamEvent::Unknown);
        assert_eq!(s.messages[1].content, "");
        assert!(s.notifications.is_empty());
    }

    #[test]
    fn fail_stream_overwrites_placeholder_with_apology() {
        let mut s = busy_store();
        s.apply_event(StreamEvent::Token {
            text: "half a".into(),
        });
        s.fail_stream("connection reset");
        s.finish_exchange();
        assert_eq!(s.messages[1].content, STREAM_FAILURE_MESSAGE);
        assert_eq!(s.last_error.as_deref(), Some("connection reset"));
        assert_eq!(s.notifications.len(), 1);
        assert!(!s.is_busy());
    }

    #[test]
    fn reflection_replaces_payload() {
        let mut s = busy_store();
        s.apply_event(StreamEvent::Reflection(Reflection {
            content: "answer grounded in 3 sources".into(),
            confidence: 0.82,
        }));
        assert!(matches!(
            s.messages[1].payload,
            MessagePayload::Reflection(_)
        ));
    }

    #[test]
    fn replace_session_rebuilds_side_lists() {
        let mut s = store();
        let mut msg = ChatMessage::assistant_placeholder("sess-1");
        msg.context = vec![ContextSnippet {
            source: "jira".into(),
            snippet: "BB-42".into(),
            score: None,
        }];
        msg.payload = MessagePayload::Task(TaskItem {
            id: "t1".into(),
            title: "triage".into(),
            status: "running".into(),
            progress: 0.1,
            substeps: vec![],
        });
        let session = ChatSession {
            id: "sess-1".into(),
            ..ChatSession::temporary("user-1", "org-1")
        };
        s.replace_session(session, vec![msg]);
        assert_eq!(s.session().id, "sess-1");
        assert_eq!(s.context_items.len(), 1);
        assert_eq!(s.active_tasks.len(), 1);
        assert!(!s.is_busy());
    }

    #[test]
    fn start_new_session_resets_to_temporary() {
        let mut s = busy_store();
        s.apply_event(StreamEvent::Session {
            session_id: "sess-1".into(),
            title: None,
        });
        s.start_new_session();
        assert!(s.session().is_temporary());
        assert!(s.messages.is_empty());
        assert!(!s.is_busy());
    }

    #[test]
    fn dismiss_notification_removes_by_id() {
        let mut s = busy_store();
        s.fail_stream("boom");
        let id = s.notifications[0].id;
        s.dismiss_notification(id);
        assert!(s.notifications.is_empty());
    }
}
