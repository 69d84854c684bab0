//! Chat message model shared by every UI.
//!
//! A [`Message`] pairs a [`Role`] with a [`MessageBody`]. The body is a closed
//! union: each variant carries exactly one content shape, so a message can
//! never declare one type and hold another type's content.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Ai,
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Ai => "ai",
            Role::Agent => "agent",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Ai => "Assistant",
            Role::Agent => "Agent",
        }
    }
}

/// The closed set of message tags the backend may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Markdown,
    Code,
    Table,
    Chart,
    Kpi,
    Timeline,
    Image,
    Video,
    Audio,
    Form,
    Options,
    Buttons,
    Checklist,
    Citations,
    Knowledge,
    Search,
    ToolCall,
    ActionResult,
    Alert,
    File,
    Map,
    Graph,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Markdown => "markdown",
            MessageKind::Code => "code",
            MessageKind::Table => "table",
            MessageKind::Chart => "chart",
            MessageKind::Kpi => "kpi",
            MessageKind::Timeline => "timeline",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
            MessageKind::Audio => "audio",
            MessageKind::Form => "form",
            MessageKind::Options => "options",
            MessageKind::Buttons => "buttons",
            MessageKind::Checklist => "checklist",
            MessageKind::Citations => "citations",
            MessageKind::Knowledge => "knowledge",
            MessageKind::Search => "search",
            MessageKind::ToolCall => "tool_call",
            MessageKind::ActionResult => "action_result",
            MessageKind::Alert => "alert",
            MessageKind::File => "file",
            MessageKind::Map => "map",
            MessageKind::Graph => "graph",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::all().into_iter().find(|kind| kind.as_str() == s)
    }

    pub fn all() -> Vec<MessageKind> {
        vec![
            MessageKind::Text,
            MessageKind::Markdown,
            MessageKind::Code,
            MessageKind::Table,
            MessageKind::Chart,
            MessageKind::Kpi,
            MessageKind::Timeline,
            MessageKind::Image,
            MessageKind::Video,
            MessageKind::Audio,
            MessageKind::Form,
            MessageKind::Options,
            MessageKind::Buttons,
            MessageKind::Checklist,
            MessageKind::Citations,
            MessageKind::Knowledge,
            MessageKind::Search,
            MessageKind::ToolCall,
            MessageKind::ActionResult,
            MessageKind::Alert,
            MessageKind::File,
            MessageKind::Map,
            MessageKind::Graph,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeContent {
    pub language: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiEntry {
    pub label: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub date: String,
    pub event: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// Video and audio both carry only a source URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaContent {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormContent {
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonEntry {
    pub label: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub task: String,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeContent {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallContent {
    pub tool: String,
    pub input: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertContent {
    pub level: AlertLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileContent {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMarker {
    pub lat: f64,
    pub lng: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphContent {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Tagged message content. Serialized as `{"type": ..., "content": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum MessageBody {
    Text(String),
    Markdown(String),
    Code(CodeContent),
    Table(Vec<Vec<String>>),
    /// Chart data is shape-checked when rendered, so it stays raw here
    Chart(Value),
    Kpi(Vec<KpiEntry>),
    Timeline(Vec<TimelineEntry>),
    Image(ImageContent),
    Video(MediaContent),
    Audio(MediaContent),
    Form(FormContent),
    Options(Vec<String>),
    Buttons(Vec<ButtonEntry>),
    Checklist(Vec<ChecklistItem>),
    Citations(Vec<Citation>),
    Knowledge(KnowledgeContent),
    Search(Vec<SearchResult>),
    ToolCall(ToolCallContent),
    ActionResult(String),
    Alert(AlertContent),
    File(FileContent),
    Map(Vec<MapMarker>),
    Graph(GraphContent),
    /// A tag outside the known set, carried as-is
    #[serde(skip)]
    Unsupported { kind: String, content: Value },
}

impl MessageBody {
    /// Decode a `(type, content)` pair into the matching variant.
    ///
    /// Fails when the content does not have the shape the tag declares.
    pub fn from_parts(kind: MessageKind, content: &Value) -> serde_json::Result<Self> {
        let tagged = serde_json::json!({
            "type": kind.as_str(),
            "content": content,
        });
        serde_json::from_value(tagged)
    }

    pub fn type_name(&self) -> &str {
        match self {
            MessageBody::Unsupported { kind, .. } => kind,
            other => other.kind().map(|k| k.as_str()).unwrap_or("unknown"),
        }
    }

    pub fn kind(&self) -> Option<MessageKind> {
        let kind = match self {
            MessageBody::Text(_) => MessageKind::Text,
            MessageBody::Markdown(_) => MessageKind::Markdown,
            MessageBody::Code(_) => MessageKind::Code,
            MessageBody::Table(_) => MessageKind::Table,
            MessageBody::Chart(_) => MessageKind::Chart,
            MessageBody::Kpi(_) => MessageKind::Kpi,
            MessageBody::Timeline(_) => MessageKind::Timeline,
            MessageBody::Image(_) => MessageKind::Image,
            MessageBody::Video(_) => MessageKind::Video,
            MessageBody::Audio(_) => MessageKind::Audio,
            MessageBody::Form(_) => MessageKind::Form,
            MessageBody::Options(_) => MessageKind::Options,
            MessageBody::Buttons(_) => MessageKind::Buttons,
            MessageBody::Checklist(_) => MessageKind::Checklist,
            MessageBody::Citations(_) => MessageKind::Citations,
            MessageBody::Knowledge(_) => MessageKind::Knowledge,
            MessageBody::Search(_) => MessageKind::Search,
            MessageBody::ToolCall(_) => MessageKind::ToolCall,
            MessageBody::ActionResult(_) => MessageKind::ActionResult,
            MessageBody::Alert(_) => MessageKind::Alert,
            MessageBody::File(_) => MessageKind::File,
            MessageBody::Map(_) => MessageKind::Map,
            MessageBody::Graph(_) => MessageKind::Graph,
            MessageBody::Unsupported { .. } => return None,
        };
        Some(kind)
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub body: MessageBody,
}

impl Message {
    pub fn new(role: Role, body: MessageBody) -> Self {
        Self { role, body }
    }

    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self::new(role, MessageBody::Text(content.into()))
    }

    pub fn markdown(role: Role, content: impl Into<String>) -> Self {
        Self::new(role, MessageBody::Markdown(content.into()))
    }

    /// Synthetic error notice appended when a request fails
    pub fn error_alert(message: impl Into<String>) -> Self {
        Self::new(
            Role::Ai,
            MessageBody::Alert(AlertContent {
                level: AlertLevel::Error,
                message: message.into(),
            }),
        )
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in MessageKind::all() {
            assert_eq!(MessageKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(MessageKind::from_str("hologram"), None);
    }

    #[test]
    fn test_from_parts_decodes_matching_shape() {
        let body = MessageBody::from_parts(
            MessageKind::Alert,
            &json!({"level": "warning", "message": "disk almost full"}),
        )
        .unwrap();
        assert_eq!(
            body,
            MessageBody::Alert(AlertContent {
                level: AlertLevel::Warning,
                message: "disk almost full".to_string(),
            })
        );
    }

    #[test]
    fn test_from_parts_rejects_mismatched_shape() {
        assert!(MessageBody::from_parts(MessageKind::Code, &json!("just a string")).is_err());
        assert!(MessageBody::from_parts(MessageKind::Checklist, &json!([{"task": "x"}])).is_err());
    }

    #[test]
    fn test_chart_accepts_any_json() {
        let body = MessageBody::from_parts(MessageKind::Chart, &json!({"not": "a list"})).unwrap();
        assert!(matches!(body, MessageBody::Chart(_)));
    }

    #[test]
    fn test_type_name_for_unsupported() {
        let body = MessageBody::Unsupported {
            kind: "hologram".to_string(),
            content: Value::Null,
        };
        assert_eq!(body.type_name(), "hologram");
        assert_eq!(body.kind(), None);
        assert_eq!(MessageBody::ToolCall(ToolCallContent {
            tool: "search".to_string(),
            input: Map::new(),
        }).type_name(), "tool_call");
    }
}
