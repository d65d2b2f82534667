//! Reconstruction of typed messages from stored history rows.
//!
//! The backend persists the variant discriminator and the plan/task fields
//! in each row's metadata. Reconstruction must mirror what the live
//! streaming path produces so a reloaded conversation renders identically
//! to a freshly streamed one.

use serde_json::Value;

use brainboard_schema::{
    ActionPlan, ChatMessage, EventSeverity, ExecutedStep, Insight, MessagePayload, PlanStatus,
    PlanStep, Reflection, RiskLevel, StoredMessage, SystemEvent, TaskItem,
};

pub fn rehydrate_message(stored: &StoredMessage) -> ChatMessage {
    let meta = stored.metadata.as_ref();
    let message_type = meta
        .and_then(|m| m.get("message_type"))
        .and_then(Value::as_str)
        .unwrap_or("text");

    let payload = match (message_type, meta) {
        ("action_plan", Some(meta)) => MessagePayload::ActionPlan(rehydrate_plan(meta)),
        ("insight", meta) => MessagePayload::Insight(Insight {
            title: str_field(meta, "title").unwrap_or_else(|| "Insight".to_string()),
            body: stored.content.clone(),
            category: str_field(meta, "category"),
        }),
        ("task", Some(meta)) => MessagePayload::Task(rehydrate_task(stored, meta)),
        ("system_event", meta) => MessagePayload::SystemEvent(SystemEvent {
            severity: severity_field(meta),
            event: str_field(meta, "event").unwrap_or_else(|| stored.content.clone()),
            detail: str_field(meta, "detail"),
        }),
        ("reflection", meta) => MessagePayload::Reflection(Reflection {
            content: stored.content.clone(),
            confidence: meta
                .and_then(|m| m.get("confidence"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
        }),
        _ => MessagePayload::Text,
    };

    ChatMessage {
        id: stored.id.clone(),
        session_id: stored.session_id.clone(),
        role: stored.role,
        content: stored.content.clone(),
        created_at: stored.created_at,
        context: stored.context.clone(),
        payload,
    }
}

/// Plan fields are stored flattened on the metadata object. Status is
/// derived: completed once any executed steps exist, approved otherwise
/// (a stored plan was necessarily past the proposal stage).
fn rehydrate_plan(meta: &Value) -> ActionPlan {
    let steps: Vec<PlanStep> = json_field(meta, "steps");
    let executed_steps: Vec<ExecutedStep> = json_field(meta, "executed_steps");
    let status = if executed_steps.is_empty() {
        PlanStatus::Approved
    } else {
        PlanStatus::Completed
    };
    ActionPlan {
        goal: meta
            .get("goal")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        risk_level: RiskLevel::parse(meta.get("risk_level").and_then(Value::as_str).unwrap_or("")),
        requires_approval: meta
            .get("requires_approval")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        steps_completed: meta
            .get("steps_completed")
            .and_then(Value::as_u64)
            .unwrap_or(executed_steps.len() as u64) as u32,
        steps_total: meta
            .get("steps_total")
            .and_then(Value::as_u64)
            .unwrap_or(steps.len() as u64) as u32,
        steps,
        status,
        executed_steps,
    }
}

fn rehydrate_task(stored: &StoredMessage, meta: &Value) -> TaskItem {
    if let Some(task) = meta
        .get("task")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
    {
        return task;
    }
    TaskItem {
        id: str_field(Some(meta), "task_id").unwrap_or_else(|| stored.id.clone()),
        title: str_field(Some(meta), "title").unwrap_or_else(|| stored.content.clone()),
        status: str_field(Some(meta), "status").unwrap_or_else(|| "pending".to_string()),
        progress: meta
            .get("progress")
            .and_then(Value::as_f64)
            .unwrap_or(0.0) as f32,
        substeps: json_field(meta, "substeps"),
    }
}

fn str_field(meta: Option<&Value>, key: &str) -> Option<String> {
    meta.and_then(|m| m.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn severity_field(meta: Option<&Value>) -> EventSeverity {
    match meta
        .and_then(|m| m.get("severity"))
        .and_then(Value::as_str)
        .unwrap_or("info")
    {
        "error" => EventSeverity::Error,
        "warning" => EventSeverity::Warning,
        _ => EventSeverity::Info,
    }
}

fn json_field<T: serde::de::DeserializeOwned + Default>(meta: &Value, key: &str) -> T {
    meta.get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}
