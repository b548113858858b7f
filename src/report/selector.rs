use super::shape::is_report_shaped;
use serde_json::Value;

/// Roles that mark a turn as produced by the task service. Compared
/// case-sensitively.
pub const GENERATED_ROLES: &[&str] = &["assistant", "model", "ai"];

pub fn is_generated_turn(message: &Value) -> bool {
    message
        .get("role")
        .and_then(Value::as_str)
        .is_some_and(|role| GENERATED_ROLES.contains(&role))
}

pub const USER_ROLE: &str = "user";

pub fn is_user_turn(value: &Value) -> bool {
    value.get("role").and_then(Value::as_str) == Some(USER_ROLE)
}

/// Picks the conversation turn most likely to carry the report.
///
/// Priority, first match wins:
/// 1. no generated turns at all: the last message, unfiltered
/// 2. a generated turn with an `output_file` attachment that has a url
/// 3. a generated turn with a content item that is already a report
/// 4. a generated turn whose text looks like embedded company JSON
/// 5. the last generated turn
pub fn select_best_message(messages: &[Value]) -> Option<&Value> {
    let generated: Vec<&Value> = messages.iter().filter(|m| is_generated_turn(m)).collect();
    if generated.is_empty() {
        return messages.last();
    }

    generated
        .iter()
        .find(|m| content_items(m).any(has_output_file_url))
        .or_else(|| {
            generated
                .iter()
                .find(|m| content_items(m).any(|item| item.is_object() && is_report_shaped(item)))
        })
        .or_else(|| {
            generated
                .iter()
                .find(|m| content_items(m).any(has_embedded_company_json))
        })
        .or_else(|| generated.last())
        .copied()
}

fn content_items(message: &Value) -> impl Iterator<Item = &Value> {
    message
        .get("content")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

pub(crate) fn output_file_url(item: &Value) -> Option<&str> {
    if item.get("type").and_then(Value::as_str) != Some("output_file") {
        return None;
    }
    ["fileUrl", "file_url", "url"]
        .iter()
        .filter_map(|key| item.get(*key).and_then(Value::as_str))
        .find(|url| !url.trim().is_empty())
}

fn has_output_file_url(item: &Value) -> bool {
    output_file_url(item).is_some()
}

fn has_embedded_company_json(item: &Value) -> bool {
    item_text(item).is_some_and(|text| text.contains('{') && text.contains("company"))
}

fn item_text(item: &Value) -> Option<String> {
    let text = item.get("text")?;
    if let Some(plain) = text.as_str() {
        return Some(plain.to_string());
    }
    if let Some(value) = text.get("value").and_then(Value::as_str) {
        return Some(value.to_string());
    }
    text.get("content").and_then(Value::as_array).map(|lines| {
        lines
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    })
}
