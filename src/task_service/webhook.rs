use super::is_blank_result;
use crate::report::shape::is_truthy;
use serde_json::Value;

pub const TASK_STOPPED_EVENT: &str = "task_stopped";
pub const COMPLETION_STOP_REASONS: [&str; 2] = ["finish", "end_turn"];

/// Fields of an inbound task-service webhook that matter for ingestion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WebhookEvent {
    pub event_type: Option<String>,
    pub task_id: Option<String>,
    pub stop_reason: Option<String>,
    pub inline_result: Option<Value>,
}

impl WebhookEvent {
    /// A delivery without a task id is a verification ping.
    pub fn is_verification(&self) -> bool {
        self.task_id.is_none()
    }

    pub fn is_completion(&self) -> bool {
        self.event_type.as_deref() == Some(TASK_STOPPED_EVENT)
            && self
                .stop_reason
                .as_deref()
                .is_some_and(|reason| COMPLETION_STOP_REASONS.contains(&reason))
    }
}

/// Reads `{event_type, task_detail{task_id, stop_reason, message}, task_id,
/// result, message, output, data}`. Unknown or malformed fields are treated
/// as absent.
pub fn parse_webhook(body: &Value) -> WebhookEvent {
    let detail = body.get("task_detail").filter(|detail| detail.is_object());
    let detail_field = |key: &str| detail.and_then(|detail| detail.get(key));

    let task_id = detail_field("task_id")
        .and_then(non_blank_str)
        .or_else(|| body.get("task_id").and_then(non_blank_str));

    let inline_result = body
        .get("result")
        .filter(|value| is_truthy(value))
        .cloned()
        .or_else(|| {
            [
                detail_field("message"),
                body.get("message"),
                body.get("output"),
                body.get("data"),
            ]
            .into_iter()
            .flatten()
            .find(|value| is_truthy(value))
            .map(decode_embedded_json)
        })
        .filter(|value| !is_blank_result(value));

    WebhookEvent {
        event_type: body.get("event_type").and_then(non_blank_str),
        task_id,
        stop_reason: detail_field("stop_reason").and_then(non_blank_str),
        inline_result,
    }
}

fn non_blank_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn decode_embedded_json(value: &Value) -> Value {
    if let Some(text) = value.as_str() {
        let trimmed = text.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(parsed) = serde_json::from_str(trimmed) {
                return parsed;
            }
        }
    }
    value.clone()
}
