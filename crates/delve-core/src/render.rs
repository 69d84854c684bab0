//! Message renderer.
//!
//! [`render_message`] maps a [`Message`] to a [`Rendered`] block: a small,
//! UI-agnostic description of what to draw. The TUI turns blocks into styled
//! terminal lines and the one-shot CLI prints them with [`Rendered::plain_lines`].
//! Rendering is pure: the same message always yields the same block.

use serde_json::Value;

use crate::message::{AlertLevel, Message, MessageBody};
use crate::normalize::safe_json_stringify;

pub const CHART_FALLBACK: &str = "Unable to render chart preview.";
pub const UNSUPPORTED: &str = "Unsupported message type";
const DEFAULT_IMAGE_ALT: &str = "AI generated";

/// Visual weight of a notice line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeVariant {
    Info,
    Success,
    Warning,
    Destructive,
    Muted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceLayout {
    List,
    Row,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormControl {
    TextArea,
    Input { input_type: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormInput {
    pub label: String,
    pub name: String,
    pub control: FormControl,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartBar {
    pub label: String,
    pub value: f64,
    /// Width relative to the largest value, 0-100
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub caption: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub link: Option<Link>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckItem {
    pub label: String,
    pub checked: bool,
}

/// Presentation of one message
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Text(String),
    Markdown(String),
    Code { language: String, code: String },
    Table(Vec<Vec<String>>),
    Chart(Vec<ChartBar>),
    Cards(Vec<Card>),
    Timeline(Vec<(String, String)>),
    Media { kind: MediaKind, url: String, alt: Option<String> },
    Form { fields: Vec<FormInput>, submit_label: String },
    Choices { layout: ChoiceLayout, labels: Vec<String> },
    Checklist(Vec<CheckItem>),
    Links { numbered: bool, links: Vec<Link> },
    ToolCall { tool: String, input: String },
    Notice { variant: NoticeVariant, text: String },
    FileLink { name: String, url: String },
    Lines(Vec<String>),
    Json(String),
}

pub fn render_message(message: &Message) -> Rendered {
    match &message.body {
        MessageBody::Text(text) => Rendered::Text(text.clone()),
        MessageBody::Markdown(text) => Rendered::Markdown(text.clone()),
        MessageBody::Code(code) => Rendered::Code {
            language: code.language.clone(),
            code: code.code.clone(),
        },
        MessageBody::Table(rows) => Rendered::Table(rows.clone()),
        MessageBody::Chart(data) => match chart_bars(data) {
            Some(bars) => Rendered::Chart(bars),
            None => Rendered::Notice {
                variant: NoticeVariant::Muted,
                text: CHART_FALLBACK.to_string(),
            },
        },
        MessageBody::Kpi(entries) => Rendered::Cards(
            entries
                .iter()
                .map(|kpi| Card {
                    caption: Some(kpi.label.clone()),
                    title: kpi.value.clone(),
                    description: kpi.change.clone().filter(|c| !c.is_empty()),
                    link: None,
                })
                .collect(),
        ),
        MessageBody::Timeline(entries) => Rendered::Timeline(
            entries
                .iter()
                .map(|item| (item.date.clone(), item.event.clone()))
                .collect(),
        ),
        MessageBody::Image(image) => Rendered::Media {
            kind: MediaKind::Image,
            url: image.url.clone(),
            alt: Some(
                image
                    .alt
                    .clone()
                    .filter(|alt| !alt.is_empty())
                    .unwrap_or_else(|| DEFAULT_IMAGE_ALT.to_string()),
            ),
        },
        MessageBody::Video(media) => Rendered::Media {
            kind: MediaKind::Video,
            url: media.url.clone(),
            alt: None,
        },
        MessageBody::Audio(media) => Rendered::Media {
            kind: MediaKind::Audio,
            url: media.url.clone(),
            alt: None,
        },
        MessageBody::Form(form) => Rendered::Form {
            fields: form
                .fields
                .iter()
                .map(|field| FormInput {
                    label: field.label.clone(),
                    name: field.name.clone(),
                    control: if field.field_type == "textarea" {
                        FormControl::TextArea
                    } else {
                        FormControl::Input {
                            input_type: field.field_type.clone(),
                        }
                    },
                })
                .collect(),
            submit_label: "Submit".to_string(),
        },
        MessageBody::Options(options) => Rendered::Choices {
            layout: ChoiceLayout::List,
            labels: options.clone(),
        },
        MessageBody::Buttons(buttons) => Rendered::Choices {
            layout: ChoiceLayout::Row,
            labels: buttons.iter().map(|b| b.label.clone()).collect(),
        },
        MessageBody::Checklist(items) => Rendered::Checklist(
            items
                .iter()
                .map(|item| CheckItem {
                    label: item.task.clone(),
                    checked: item.done,
                })
                .collect(),
        ),
        MessageBody::Citations(citations) => Rendered::Links {
            numbered: true,
            links: citations
                .iter()
                .map(|c| Link {
                    title: c.text.clone(),
                    url: c.url.clone(),
                    snippet: None,
                })
                .collect(),
        },
        MessageBody::Search(results) => Rendered::Links {
            numbered: false,
            links: results
                .iter()
                .map(|r| Link {
                    title: r.title.clone(),
                    url: r.url.clone(),
                    snippet: Some(r.snippet.clone()),
                })
                .collect(),
        },
        MessageBody::Knowledge(card) => Rendered::Cards(vec![Card {
            caption: None,
            title: card.title.clone(),
            description: Some(card.description.clone()),
            link: card.url.clone().filter(|u| !u.is_empty()).map(|url| Link {
                title: "Learn more".to_string(),
                url,
                snippet: None,
            }),
        }]),
        MessageBody::ToolCall(call) => Rendered::ToolCall {
            tool: call.tool.clone(),
            input: safe_json_stringify(&Value::Object(call.input.clone())),
        },
        MessageBody::ActionResult(text) => Rendered::Notice {
            variant: NoticeVariant::Success,
            text: format!("✅ {}", text),
        },
        MessageBody::Alert(alert) => Rendered::Notice {
            variant: alert_variant(alert.level),
            text: alert.message.clone(),
        },
        MessageBody::File(file) => Rendered::FileLink {
            name: file.name.clone(),
            url: file.url.clone(),
        },
        MessageBody::Map(markers) => Rendered::Lines(
            markers
                .iter()
                .map(|m| format!("📍 {} ({}, {})", m.label, m.lat, m.lng))
                .collect(),
        ),
        MessageBody::Graph(graph) => Rendered::Json(
            serde_json::to_value(graph)
                .map(|value| safe_json_stringify(&value))
                .unwrap_or_default(),
        ),
        MessageBody::Unsupported { .. } => Rendered::Notice {
            variant: NoticeVariant::Muted,
            text: UNSUPPORTED.to_string(),
        },
    }
}

/// Error is the most severe level and maps to the destructive style
pub fn alert_variant(level: AlertLevel) -> NoticeVariant {
    match level {
        AlertLevel::Info => NoticeVariant::Info,
        AlertLevel::Success => NoticeVariant::Success,
        AlertLevel::Warning => NoticeVariant::Warning,
        AlertLevel::Error => NoticeVariant::Destructive,
    }
}

/// Validate chart data and scale it against the largest value.
///
/// Returns `None` for anything that is not a non-empty list of
/// `{label: string, value: finite number}`.
pub fn chart_bars(data: &Value) -> Option<Vec<ChartBar>> {
    let items = data.as_array().filter(|items| !items.is_empty())?;

    let points = items
        .iter()
        .map(|item| {
            let label = item.get("label").and_then(Value::as_str)?;
            let value = item
                .get("value")
                .filter(|v| v.is_number())
                .and_then(Value::as_f64)
                .filter(|v| v.is_finite())?;
            Some((label.to_string(), value))
        })
        .collect::<Option<Vec<_>>>()?;

    let max = points.iter().fold(1.0_f64, |max, (_, value)| max.max(*value));

    Some(
        points
            .into_iter()
            .map(|(label, value)| ChartBar {
                percent: value / max * 100.0,
                label,
                value,
            })
            .collect(),
    )
}

impl Rendered {
    /// Plain-text rendition, one entry per output line
    pub fn plain_lines(&self) -> Vec<String> {
        match self {
            Rendered::Text(text) | Rendered::Markdown(text) | Rendered::Json(text) => {
                text.lines().map(str::to_string).collect()
            }
            Rendered::Code { language, code } => {
                let mut lines = vec![format!("[{}]", language)];
                lines.extend(code.lines().map(|l| format!("  {}", l)));
                lines
            }
            Rendered::Table(rows) => rows.iter().map(|row| row.join(" | ")).collect(),
            Rendered::Chart(bars) => bars
                .iter()
                .map(|bar| {
                    let filled = (bar.percent.max(0.0) / 5.0).round() as usize;
                    format!("{} {} {}", bar.label, "#".repeat(filled), bar.value)
                })
                .collect(),
            Rendered::Cards(cards) => cards
                .iter()
                .flat_map(|card| {
                    let mut lines = Vec::new();
                    if let Some(caption) = &card.caption {
                        lines.push(caption.to_uppercase());
                    }
                    lines.push(card.title.clone());
                    if let Some(description) = &card.description {
                        lines.push(description.clone());
                    }
                    if let Some(link) = &card.link {
                        lines.push(format!("{}: {}", link.title, link.url));
                    }
                    lines
                })
                .collect(),
            Rendered::Timeline(items) => items
                .iter()
                .map(|(date, event)| format!("{} - {}", date, event))
                .collect(),
            Rendered::Media { kind, url, alt } => match alt {
                Some(alt) => vec![format!("[{}: {}] {}", kind.label(), alt, url)],
                None => vec![format!("[{}] {}", kind.label(), url)],
            },
            Rendered::Form { fields, submit_label } => {
                let mut lines: Vec<String> = fields
                    .iter()
                    .map(|field| match &field.control {
                        FormControl::TextArea => format!("{}: [ ... ]", field.label),
                        FormControl::Input { input_type } => {
                            format!("{}: [{}]", field.label, input_type)
                        }
                    })
                    .collect();
                lines.push(format!("[ {} ]", submit_label));
                lines
            }
            Rendered::Choices { layout, labels } => match layout {
                ChoiceLayout::List => labels.iter().map(|l| format!("> {}", l)).collect(),
                ChoiceLayout::Row => vec![labels
                    .iter()
                    .map(|l| format!("[ {} ]", l))
                    .collect::<Vec<_>>()
                    .join(" ")],
            },
            Rendered::Checklist(items) => items
                .iter()
                .map(|item| format!("[{}] {}", if item.checked { "x" } else { " " }, item.label))
                .collect(),
            Rendered::Links { numbered, links } => links
                .iter()
                .enumerate()
                .flat_map(|(i, link)| {
                    let head = if *numbered {
                        format!("{}. {} <{}>", i + 1, link.title, link.url)
                    } else {
                        format!("{} <{}>", link.title, link.url)
                    };
                    std::iter::once(head).chain(link.snippet.iter().map(|s| format!("   {}", s)))
                })
                .collect(),
            Rendered::ToolCall { tool, input } => {
                let mut lines = vec![format!("🔧 Tool invoked: {}", tool)];
                lines.extend(input.lines().map(str::to_string));
                lines
            }
            Rendered::Notice { text, .. } => vec![text.clone()],
            Rendered::FileLink { name, url } => vec![format!("📂 {} <{}>", name, url)],
            Rendered::Lines(lines) => lines.clone(),
        }
    }
}
