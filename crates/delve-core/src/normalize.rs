//! Inbound normalization of backend JSON.
//!
//! The backend has answered in several shapes over time. Everything here takes
//! an untyped [`Value`] and checks each field's type before trusting it, so no
//! response shape can produce a message whose content disagrees with its tag.

use serde_json::{Map, Value};
use tracing::debug;

use crate::admin::{AdminSessionSummary, LatestAnswer};
use crate::conversation::{ConversationDetail, ConversationSummary};
use crate::message::{CodeContent, Message, MessageBody, MessageKind, Role};

/// Collapse one chat response envelope into messages.
///
/// Rules are tried in order and the first one that matches wins:
/// `data.components`, then `answer` + `content_type`, then a bare
/// `{type, content}` object, then `message`. An empty result means none of
/// them matched and the caller should treat the response as unexpected.
pub fn normalize_llm_payload(payload: &Value) -> Vec<Message> {
    let components = payload
        .get("data")
        .filter(|data| data.is_object())
        .and_then(|data| data.get("components"))
        .and_then(Value::as_array);

    if let Some(components) = components {
        let messages = normalize_components(components, Role::Ai);
        if !messages.is_empty() {
            return messages;
        }
    }

    if let Some(answer) = non_empty_str(payload.get("answer")) {
        return vec![flat_message(Role::Ai, answer, content_type(payload).as_deref())];
    }

    if let (Some(kind), Some(content)) = (
        payload.get("type").and_then(Value::as_str),
        payload.get("content"),
    ) {
        let role = resolve_role(payload.get("role"), Role::Ai);
        return vec![Message::new(role, direct_body(kind, content))];
    }

    if let Some(message) = payload.get("message").and_then(Value::as_str) {
        return vec![Message::markdown(Role::Ai, message)];
    }

    Vec::new()
}

/// Normalize a list of components, dropping the ones that fail.
pub fn normalize_components(components: &[Value], default_role: Role) -> Vec<Message> {
    components
        .iter()
        .enumerate()
        .filter_map(|(index, component)| {
            let message = normalize_component(component, default_role);
            if message.is_none() {
                debug!(index, "dropping component that failed normalization");
            }
            message
        })
        .collect()
}

/// Normalize one `{type, role?, payload}` component.
///
/// Returns `None` when the component has no usable type or nothing to show.
pub fn normalize_component(component: &Value, default_role: Role) -> Option<Message> {
    let record = component.as_object()?;
    let kind = record
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_lowercase)
        .filter(|kind| !kind.is_empty())?;

    let role = resolve_role(record.get("role"), default_role);
    let payload = record.get("payload");
    let content = payload.map(extract_payload_content);

    let body = match kind.as_str() {
        "text" => non_empty_str(content).map(|s| MessageBody::Text(s.to_string())),
        "markdown" => non_empty_str(content).map(|s| MessageBody::Markdown(s.to_string())),
        "code" => content.and_then(Value::as_object).and_then(code_content).map(MessageBody::Code),
        "table" => payload.and_then(Value::as_object).and_then(table_rows).map(MessageBody::Table),
        _ => None,
    };

    if let Some(body) = body {
        return Some(Message::new(role, body));
    }

    let fallback = match content {
        Some(Value::String(text)) => text.clone(),
        _ => safe_json_stringify(payload?),
    };

    if fallback.is_empty() {
        return None;
    }

    Some(Message::text(role, fallback))
}

/// `payload.content` when the payload is an object holding one, else the payload
pub fn extract_payload_content(payload: &Value) -> &Value {
    payload
        .as_object()
        .and_then(|object| object.get("content"))
        .unwrap_or(payload)
}

/// Pretty JSON, degrading to a plain coercion instead of failing
pub fn safe_json_stringify(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn resolve_role(role: Option<&Value>, default_role: Role) -> Role {
    match role.and_then(Value::as_str).map(str::to_lowercase).as_deref() {
        Some("user") => Role::User,
        Some("agent") => Role::Agent,
        _ => default_role,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn content_type(record: &Value) -> Option<String> {
    record
        .get("content_type")
        .and_then(Value::as_str)
        .map(str::to_lowercase)
}

fn flat_message(role: Role, content: &str, content_type: Option<&str>) -> Message {
    match content_type {
        Some("markdown") => Message::markdown(role, content),
        _ => Message::text(role, content),
    }
}

fn code_content(record: &Map<String, Value>) -> Option<CodeContent> {
    let code = non_empty_str(record.get("code"))?;
    let language = record
        .get("language")
        .and_then(Value::as_str)
        .unwrap_or("text");

    Some(CodeContent {
        language: language.to_string(),
        code: code.to_string(),
    })
}

fn table_rows(record: &Map<String, Value>) -> Option<Vec<Vec<String>>> {
    let headers: Vec<String> = record
        .get("headers")
        .and_then(Value::as_array)
        .map(|cells| string_cells(cells))
        .unwrap_or_default();

    let rows = record
        .get("rows")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .map(|row| row.as_array().map(|cells| string_cells(cells)).unwrap_or_default())
                .filter(|row| !row.is_empty())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let mut grid = Vec::with_capacity(rows.len() + 1);
    if !headers.is_empty() {
        grid.push(headers);
    }
    grid.extend(rows);

    if grid.is_empty() {
        None
    } else {
        Some(grid)
    }
}

fn string_cells(cells: &[Value]) -> Vec<String> {
    cells
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

/// Body for an envelope that is itself a `{type, content}` pair
fn direct_body(kind: &str, content: &Value) -> MessageBody {
    let Some(known) = MessageKind::from_str(kind) else {
        return MessageBody::Unsupported {
            kind: kind.to_string(),
            content: content.clone(),
        };
    };

    match MessageBody::from_parts(known, content) {
        Ok(body) => body,
        Err(e) => {
            debug!(kind, error = %e, "content does not match declared type, showing as text");
            let text = match content {
                Value::String(text) => text.clone(),
                other => safe_json_stringify(other),
            };
            MessageBody::Text(text)
        }
    }
}

fn as_count(value: Option<&Value>) -> Option<u64> {
    let value = value?;
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n as u64)
    })
}

fn first_str<'a>(record: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| record.get(*key).and_then(Value::as_str))
}

/// One entry of `GET /sessions`
pub fn normalize_conversation(input: &Value) -> Option<ConversationSummary> {
    if !input.is_object() {
        return None;
    }

    let conversation_id = first_str(input, &["session_id", "conversation_id"])?;
    let title = first_str(input, &["title", "name", "session_title"])
        .unwrap_or("Untitled conversation");
    let updated_at = first_str(input, &["updated_at", "last_activity_at"]);
    let message_count =
        as_count(input.get("message_count")).or_else(|| as_count(input.get("messages_count")));

    Some(ConversationSummary {
        conversation_id: conversation_id.to_string(),
        title: title.to_string(),
        updated_at: updated_at.map(str::to_string),
        message_count,
    })
}

/// Body of `GET /sessions/{id}`
pub fn normalize_conversation_detail(payload: &Value, fallback_id: &str) -> ConversationDetail {
    let conversation_id = first_str(payload, &["session_id", "conversation_id"])
        .unwrap_or(fallback_id)
        .to_string();
    let title = first_str(payload, &["title", "name"]).map(str::to_string);

    let messages = payload
        .get("messages")
        .and_then(Value::as_array)
        .map(|items| items.iter().flat_map(normalize_session_message).collect())
        .unwrap_or_default();

    ConversationDetail {
        conversation_id,
        title,
        messages,
    }
}

/// One stored message: either a component list or flat `content`
pub fn normalize_session_message(input: &Value) -> Vec<Message> {
    if !input.is_object() {
        return Vec::new();
    }

    let role = match input.get("role").and_then(Value::as_str).map(str::to_lowercase).as_deref() {
        Some("user") => Role::User,
        _ => Role::Ai,
    };

    if let Some(components) = input.get("components").and_then(Value::as_array) {
        let messages = normalize_components(components, role);
        if !messages.is_empty() {
            return messages;
        }
    }

    let Some(content) = non_empty_str(input.get("content")) else {
        return Vec::new();
    };

    let message = match content_type(input).as_deref() {
        Some("table") => Message::new(role, MessageBody::Table(vec![vec![content.to_string()]])),
        other => flat_message(role, content, other),
    };

    vec![message]
}

/// One entry of `GET /admin/conversations/{user}`
pub fn normalize_admin_session(input: &Value) -> Option<AdminSessionSummary> {
    if !input.is_object() {
        return None;
    }

    let session_id = input.get("session_id").and_then(Value::as_str)?;
    let text = |key: &str| input.get(key).and_then(Value::as_str).unwrap_or("").to_string();

    let latest_answer = input
        .get("latest_answer")
        .filter(|latest| latest.is_object())
        .and_then(|latest| {
            let timestamp = latest.get("timestamp").and_then(Value::as_str)?;
            Some(LatestAnswer {
                session_id: latest
                    .get("session_id")
                    .and_then(Value::as_str)
                    .unwrap_or(session_id)
                    .to_string(),
                timestamp: timestamp.to_string(),
            })
        });

    Some(AdminSessionSummary {
        session_id: session_id.to_string(),
        title: input
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Untitled")
            .to_string(),
        message_count: as_count(input.get("message_count")).unwrap_or(0),
        created_at: text("created_at"),
        updated_at: text("updated_at"),
        tokens_used: as_count(input.get("tokens_used")).unwrap_or(0),
        latest_answer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{AlertContent, AlertLevel};
    use serde_json::json;

    #[test]
    fn test_components_keep_order_and_drop_failures() {
        let envelope = json!({
            "data": {
                "components": [
                    {"type": "markdown", "payload": {"content": "# Title"}},
                    {"payload": "no type here"},
                    42,
                    {"type": "TEXT", "payload": "second"},
                    {"type": "text", "payload": ""},
                    {"type": "code", "payload": {"code": "fn main() {}", "language": "rust"}}
                ]
            }
        });

        let messages = normalize_llm_payload(&envelope);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], Message::markdown(Role::Ai, "# Title"));
        assert_eq!(messages[1], Message::text(Role::Ai, "second"));
        assert_eq!(
            messages[2].body,
            MessageBody::Code(CodeContent {
                language: "rust".to_string(),
                code: "fn main() {}".to_string(),
            })
        );
    }

    #[test]
    fn test_all_components_failing_falls_through_to_answer() {
        let envelope = json!({
            "data": {"components": [{"payload": "x"}]},
            "answer": "plain answer"
        });
        assert_eq!(
            normalize_llm_payload(&envelope),
            vec![Message::text(Role::Ai, "plain answer")]
        );
    }

    #[test]
    fn test_answer_with_markdown_content_type() {
        let envelope = json!({"answer": "hi", "content_type": "MarkDown"});
        assert_eq!(normalize_llm_payload(&envelope), vec![Message::markdown(Role::Ai, "hi")]);
    }

    #[test]
    fn test_answer_without_content_type_is_text() {
        let envelope = json!({"answer": "hi"});
        assert_eq!(normalize_llm_payload(&envelope), vec![Message::text(Role::Ai, "hi")]);
    }

    #[test]
    fn test_bare_message_is_markdown() {
        let envelope = json!({"message": "hi"});
        assert_eq!(normalize_llm_payload(&envelope), vec![Message::markdown(Role::Ai, "hi")]);
    }

    #[test]
    fn test_direct_typed_envelope() {
        let envelope = json!({
            "type": "alert",
            "content": {"level": "info", "message": "heads up"}
        });
        let messages = normalize_llm_payload(&envelope);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Ai);
        assert_eq!(
            messages[0].body,
            MessageBody::Alert(AlertContent {
                level: AlertLevel::Info,
                message: "heads up".to_string(),
            })
        );
    }

    #[test]
    fn test_direct_envelope_keeps_its_role() {
        let agent = json!({"type": "text", "content": "x", "role": "agent"});
        assert_eq!(normalize_llm_payload(&agent)[0].role, Role::Agent);

        let unknown = json!({"type": "text", "content": "x", "role": "robot"});
        assert_eq!(normalize_llm_payload(&unknown)[0].role, Role::Ai);
    }

    #[test]
    fn test_direct_envelope_with_wrong_shape_degrades_to_text() {
        let envelope = json!({"type": "code", "content": "print('x')"});
        assert_eq!(
            normalize_llm_payload(&envelope),
            vec![Message::text(Role::Ai, "print('x')")]
        );
    }

    #[test]
    fn test_direct_envelope_with_unknown_type_is_unsupported() {
        let envelope = json!({"type": "hologram", "content": {"frames": 3}});
        let messages = normalize_llm_payload(&envelope);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body.type_name(), "hologram");
    }

    #[test]
    fn test_unrecognized_envelope_is_empty() {
        assert!(normalize_llm_payload(&json!({"status": "ok"})).is_empty());
        assert!(normalize_llm_payload(&json!({"answer": ""})).is_empty());
        assert!(normalize_llm_payload(&json!(["not", "an", "object"])).is_empty());
    }

    #[test]
    fn test_component_role_resolution() {
        let user = json!({"type": "text", "role": "USER", "payload": "from user"});
        let agent = json!({"type": "text", "role": "Agent", "payload": "from agent"});
        let system = json!({"type": "text", "role": "system", "payload": "from system"});

        assert_eq!(normalize_component(&user, Role::Ai).unwrap().role, Role::User);
        assert_eq!(normalize_component(&agent, Role::Ai).unwrap().role, Role::Agent);
        assert_eq!(normalize_component(&system, Role::User).unwrap().role, Role::User);
    }

    #[test]
    fn test_code_defaults_language() {
        let component = json!({"type": "code", "payload": {"content": {"code": "ls -la"}}});
        let message = normalize_component(&component, Role::Ai).unwrap();
        assert_eq!(
            message.body,
            MessageBody::Code(CodeContent {
                language: "text".to_string(),
                code: "ls -la".to_string(),
            })
        );
    }

    #[test]
    fn test_table_headers_prefix_rows() {
        let component = json!({
            "type": "table",
            "payload": {"headers": ["a", "b"], "rows": [["1", "2"]]}
        });
        let message = normalize_component(&component, Role::Ai).unwrap();
        assert_eq!(
            message.body,
            MessageBody::Table(vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["1".to_string(), "2".to_string()],
            ])
        );
    }

    #[test]
    fn test_table_filters_non_string_cells_and_empty_rows() {
        let component = json!({
            "type": "table",
            "payload": {"rows": [["x", 1, null, "y"], [2, 3], "not a row", ["z"]]}
        });
        let message = normalize_component(&component, Role::Ai).unwrap();
        assert_eq!(
            message.body,
            MessageBody::Table(vec![
                vec!["x".to_string(), "y".to_string()],
                vec!["z".to_string()],
            ])
        );
    }

    #[test]
    fn test_unhandled_type_falls_back_to_pretty_json() {
        let component = json!({"type": "kpi", "payload": [{"label": "Users", "value": "10"}]});
        let message = normalize_component(&component, Role::Ai).unwrap();
        let MessageBody::Text(text) = message.body else {
            panic!("expected text fallback");
        };
        assert!(text.contains("\"label\": \"Users\""));
        assert!(text.starts_with('['));
    }

    #[test]
    fn test_failed_shape_with_string_content_uses_the_string() {
        let component = json!({"type": "code", "payload": {"content": "not an object"}});
        assert_eq!(
            normalize_component(&component, Role::Ai),
            Some(Message::text(Role::Ai, "not an object"))
        );
    }

    #[test]
    fn test_fallback_json_keeps_backend_key_order() {
        let component = json!({"type": "weather", "payload": {"zeta": 1, "alpha": 2}});
        let message = normalize_component(&component, Role::Ai).unwrap();
        assert_eq!(
            message.body,
            MessageBody::Text("{\n  \"zeta\": 1,\n  \"alpha\": 2\n}".to_string())
        );
    }

    #[test]
    fn test_component_without_payload_fails() {
        assert_eq!(normalize_component(&json!({"type": "chart"}), Role::Ai), None);
        assert_eq!(normalize_component(&json!({"type": ""}), Role::Ai), None);
    }

    #[test]
    fn test_normalize_conversation_field_fallbacks() {
        let summary = normalize_conversation(&json!({
            "conversation_id": "c-1",
            "name": "Budget review",
            "last_activity_at": "2024-01-01T00:00:00Z",
            "messages_count": 4
        }))
        .unwrap();
        assert_eq!(summary.conversation_id, "c-1");
        assert_eq!(summary.title, "Budget review");
        assert_eq!(summary.updated_at.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(summary.message_count, Some(4));

        let untitled = normalize_conversation(&json!({"session_id": "s-9"})).unwrap();
        assert_eq!(untitled.title, "Untitled conversation");
        assert_eq!(normalize_conversation(&json!({"title": "orphan"})), None);
    }

    #[test]
    fn test_conversation_detail_flattens_messages() {
        let detail = normalize_conversation_detail(
            &json!({
                "title": "Trip",
                "messages": [
                    {"role": "user", "content": "plan a trip"},
                    {"role": "assistant", "components": [
                        {"type": "markdown", "payload": "**Day 1**"},
                        {"type": "text", "payload": "Day 2"}
                    ]},
                    {"role": "assistant", "content": "cell", "content_type": "table"},
                    {"role": "assistant"}
                ]
            }),
            "fallback-id",
        );

        assert_eq!(detail.conversation_id, "fallback-id");
        assert_eq!(detail.title.as_deref(), Some("Trip"));
        assert_eq!(
            detail.messages,
            vec![
                Message::text(Role::User, "plan a trip"),
                Message::markdown(Role::Ai, "**Day 1**"),
                Message::text(Role::Ai, "Day 2"),
                Message::new(Role::Ai, MessageBody::Table(vec![vec!["cell".to_string()]])),
            ]
        );
    }

    #[test]
    fn test_admin_session_defaults() {
        let session = normalize_admin_session(&json!({
            "session_id": "s-1",
            "tokens_used": 120,
            "latest_answer": {"timestamp": "2024-02-02T10:00:00Z"}
        }))
        .unwrap();

        assert_eq!(session.title, "Untitled");
        assert_eq!(session.message_count, 0);
        assert_eq!(session.tokens_used, 120);
        assert_eq!(session.created_at, "");
        assert_eq!(
            session.latest_answer,
            Some(LatestAnswer {
                session_id: "s-1".to_string(),
                timestamp: "2024-02-02T10:00:00Z".to_string(),
            })
        );

        let no_timestamp = normalize_admin_session(&json!({
            "session_id": "s-2",
            "latest_answer": {"session_id": "s-2"}
        }))
        .unwrap();
        assert_eq!(no_timestamp.latest_answer, None);
        assert_eq!(normalize_admin_session(&json!({"title": "x"})), None);
    }
}
