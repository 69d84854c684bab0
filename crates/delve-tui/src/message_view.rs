//! Styled terminal lines for rendered messages

use delve_core::render::{
    Card, ChoiceLayout, FormControl, Link, NoticeVariant, Rendered,
};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

const MAX_BAR_WIDTH: usize = 30;

/// Parse a line of text and convert **bold**, *italic* and `code` markdown to styled spans
pub fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                // Consume the second *
                chars.next();

                // Find closing **
                let mut bold_text = String::new();
                let mut found_close = false;
                while let Some(c) = chars.next() {
                    if c == '*' && chars.peek() == Some(&'*') {
                        chars.next();
                        found_close = true;
                        break;
                    }
                    bold_text.push(c);
                }

                if found_close && !bold_text.is_empty() {
                    if !current_text.is_empty() {
                        spans.push(Span::raw(std::mem::take(&mut current_text)));
                    }
                    spans.push(Span::styled(
                        bold_text,
                        Style::default().add_modifier(Modifier::BOLD),
                    ));
                } else {
                    // No closing **, treat as literal
                    current_text.push_str("**");
                    current_text.push_str(&bold_text);
                }
            }
            '*' | '`' => {
                let mut inner = String::new();
                let mut found_close = false;
                while let Some(next) = chars.next() {
                    if next == c {
                        found_close = true;
                        break;
                    }
                    inner.push(next);
                }

                if found_close && !inner.is_empty() {
                    if !current_text.is_empty() {
                        spans.push(Span::raw(std::mem::take(&mut current_text)));
                    }
                    let style = if c == '`' {
                        Style::default().fg(Color::Magenta)
                    } else {
                        Style::default().add_modifier(Modifier::ITALIC)
                    };
                    spans.push(Span::styled(inner, style));
                } else {
                    current_text.push(c);
                    current_text.push_str(&inner);
                    if found_close {
                        current_text.push(c);
                    }
                }
            }
            _ => current_text.push(c),
        }
    }

    // Push any remaining text
    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Block-level markdown: headings, bullets, quotes and fenced code
fn markdown_lines(text: &str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut in_fence = false;

    for raw in text.lines() {
        let trimmed = raw.trim_start();

        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }

        if in_fence {
            lines.push(Line::from(Span::styled(
                format!("  {}", raw),
                Style::default().fg(Color::Green),
            )));
            continue;
        }

        if let Some(heading) = trimmed.strip_prefix('#') {
            let heading = heading.trim_start_matches('#').trim();
            lines.push(Line::from(Span::styled(
                heading.to_string(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
        } else if let Some(item) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            let mut line = parse_markdown_line(item);
            line.spans.insert(0, Span::styled("  • ", Style::default().fg(Color::DarkGray)));
            lines.push(line);
        } else if let Some(quote) = trimmed.strip_prefix('>') {
            let mut line = parse_markdown_line(quote.trim_start());
            line.spans.insert(0, Span::styled("│ ", Style::default().fg(Color::DarkGray)));
            lines.push(line.style(Style::default().add_modifier(Modifier::ITALIC)));
        } else {
            lines.push(parse_markdown_line(raw));
        }
    }

    lines
}

fn notice_style(variant: NoticeVariant) -> Style {
    match variant {
        NoticeVariant::Info => Style::default().fg(Color::Blue),
        NoticeVariant::Success => Style::default().fg(Color::Green),
        NoticeVariant::Warning => Style::default().fg(Color::Yellow),
        NoticeVariant::Destructive => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        NoticeVariant::Muted => Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    }
}

fn notice_icon(variant: NoticeVariant) -> &'static str {
    match variant {
        NoticeVariant::Info => "ℹ ",
        NoticeVariant::Success => "",
        NoticeVariant::Warning => "⚠ ",
        NoticeVariant::Destructive => "✖ ",
        NoticeVariant::Muted => "",
    }
}

fn link_lines(index: Option<usize>, link: &Link) -> Vec<Line<'static>> {
    let prefix = index.map(|i| format!("{}. ", i + 1)).unwrap_or_default();
    let mut lines = vec![Line::from(vec![
        Span::raw(prefix),
        Span::styled(
            link.title.clone(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::UNDERLINED),
        ),
        Span::styled(format!(" <{}>", link.url), Style::default().fg(Color::DarkGray)),
    ])];
    if let Some(snippet) = &link.snippet {
        lines.push(Line::from(Span::styled(
            format!("   {}", snippet),
            Style::default().fg(Color::Gray),
        )));
    }
    lines
}

fn card_lines(card: &Card) -> Vec<Line<'static>> {
    let border = Style::default().fg(Color::DarkGray);
    let mut lines = Vec::new();
    if let Some(caption) = &card.caption {
        lines.push(Line::from(vec![
            Span::styled("┃ ", border),
            Span::styled(caption.to_uppercase(), Style::default().fg(Color::DarkGray)),
        ]));
    }
    lines.push(Line::from(vec![
        Span::styled("┃ ", border),
        Span::styled(card.title.clone(), Style::default().add_modifier(Modifier::BOLD)),
    ]));
    if let Some(description) = &card.description {
        lines.push(Line::from(vec![
            Span::styled("┃ ", border),
            Span::raw(description.clone()),
        ]));
    }
    if let Some(link) = &card.link {
        lines.push(Line::from(vec![
            Span::styled("┃ ", border),
            Span::styled(
                format!("{} → {}", link.title, link.url),
                Style::default().fg(Color::Cyan),
            ),
        ]));
    }
    lines
}

fn table_lines(rows: &[Vec<String>]) -> Vec<Line<'static>> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|c| {
            rows.iter()
                .filter_map(|row| row.get(c))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    rows.iter()
        .map(|row| {
            let text = widths
                .iter()
                .enumerate()
                .map(|(c, width)| {
                    let cell = row.get(c).map(String::as_str).unwrap_or("");
                    let pad = width.saturating_sub(cell.chars().count());
                    format!("{}{}", cell, " ".repeat(pad))
                })
                .collect::<Vec<_>>()
                .join(" │ ");
            Line::from(text)
        })
        .collect()
}

/// Convert a rendered block to styled lines
pub fn rendered_lines(rendered: &Rendered) -> Vec<Line<'static>> {
    match rendered {
        Rendered::Text(text) => text.lines().map(|l| Line::from(l.to_string())).collect(),
        Rendered::Markdown(text) => markdown_lines(text),
        Rendered::Code { language, code } => {
            let mut lines = vec![Line::from(Span::styled(
                format!("┌ {}", language),
                Style::default().fg(Color::DarkGray),
            ))];
            lines.extend(code.lines().map(|l| {
                Line::from(vec![
                    Span::styled("│ ", Style::default().fg(Color::DarkGray)),
                    Span::styled(l.to_string(), Style::default().fg(Color::Green)),
                ])
            }));
            lines.push(Line::from(Span::styled("└", Style::default().fg(Color::DarkGray))));
            lines
        }
        Rendered::Table(rows) => table_lines(rows),
        Rendered::Chart(bars) => {
            let label_width = bars.iter().map(|b| b.label.chars().count()).max().unwrap_or(0);
            bars.iter()
                .map(|bar| {
                    let filled =
                        ((bar.percent.clamp(0.0, 100.0) / 100.0) * MAX_BAR_WIDTH as f64).round()
                            as usize;
                    let pad = label_width.saturating_sub(bar.label.chars().count());
                    Line::from(vec![
                        Span::raw(format!("{}{} ", bar.label, " ".repeat(pad))),
                        Span::styled("█".repeat(filled), Style::default().fg(Color::Cyan)),
                        Span::styled(format!(" {}", bar.value), Style::default().fg(Color::DarkGray)),
                    ])
                })
                .collect()
        }
        Rendered::Cards(cards) => {
            let mut lines = Vec::new();
            for (i, card) in cards.iter().enumerate() {
                if i > 0 {
                    lines.push(Line::default());
                }
                lines.extend(card_lines(card));
            }
            lines
        }
        Rendered::Timeline(items) => items
            .iter()
            .map(|(date, event)| {
                Line::from(vec![
                    Span::styled("● ", Style::default().fg(Color::Cyan)),
                    Span::styled(date.clone(), Style::default().fg(Color::DarkGray)),
                    Span::raw(format!("  {}", event)),
                ])
            })
            .collect(),
        Rendered::Media { kind, url, alt } => {
            let label = match alt {
                Some(alt) => format!("[{}: {}]", kind.label(), alt),
                None => format!("[{}]", kind.label()),
            };
            vec![Line::from(vec![
                Span::styled(label, Style::default().fg(Color::Magenta)),
                Span::styled(format!(" {}", url), Style::default().fg(Color::DarkGray)),
            ])]
        }
        Rendered::Form {
            fields,
            submit_label,
        } => {
            let mut lines: Vec<Line> = fields
                .iter()
                .map(|field| {
                    let control = match &field.control {
                        FormControl::TextArea => "[ ................ ]".to_string(),
                        FormControl::Input { input_type } => format!("[ {:<16} ]", input_type),
                    };
                    Line::from(vec![
                        Span::styled(
                            format!("{}: ", field.label),
                            Style::default().add_modifier(Modifier::BOLD),
                        ),
                        Span::styled(control, Style::default().fg(Color::DarkGray)),
                    ])
                })
                .collect();
            lines.push(Line::from(Span::styled(
                format!("[ {} ]", submit_label),
                Style::default().fg(Color::Black).bg(Color::Cyan),
            )));
            lines
        }
        Rendered::Choices { layout, labels } => {
            let style = Style::default().fg(Color::Cyan);
            match layout {
                ChoiceLayout::List => labels
                    .iter()
                    .map(|label| Line::from(Span::styled(format!("› {}", label), style)))
                    .collect(),
                ChoiceLayout::Row => {
                    let spans: Vec<Span> = labels
                        .iter()
                        .flat_map(|label| {
                            [Span::styled(format!("[ {} ]", label), style), Span::raw(" ")]
                        })
                        .collect();
                    vec![Line::from(spans)]
                }
            }
        }
        Rendered::Checklist(items) => items
            .iter()
            .map(|item| {
                let (mark, style) = if item.checked {
                    ("[x] ", Style::default().fg(Color::Green))
                } else {
                    ("[ ] ", Style::default())
                };
                Line::from(vec![Span::styled(mark, style), Span::raw(item.label.clone())])
            })
            .collect(),
        Rendered::Links { numbered, links } => links
            .iter()
            .enumerate()
            .flat_map(|(i, link)| link_lines(numbered.then_some(i), link))
            .collect(),
        Rendered::ToolCall { tool, input } => {
            let mut lines = vec![Line::from(Span::styled(
                format!("🔧 Tool invoked: {}", tool),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ))];
            lines.extend(input.lines().map(|l| {
                Line::from(Span::styled(l.to_string(), Style::default().fg(Color::DarkGray)))
            }));
            lines
        }
        Rendered::Notice { variant, text } => text
            .lines()
            .enumerate()
            .map(|(i, l)| {
                let icon = if i == 0 { notice_icon(*variant) } else { "" };
                Line::from(Span::styled(format!("{}{}", icon, l), notice_style(*variant)))
            })
            .collect(),
        Rendered::FileLink { name, url } => vec![Line::from(vec![
            Span::raw("📎 "),
            Span::styled(
                name.clone(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::UNDERLINED),
            ),
            Span::styled(format!(" <{}>", url), Style::default().fg(Color::DarkGray)),
        ])],
        Rendered::Lines(lines) => lines.iter().map(|l| Line::from(l.clone())).collect(),
        Rendered::Json(text) => text
            .lines()
            .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(Color::Gray))))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_core::render::ChartBar;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_bold_and_italic_spans() {
        let line = parse_markdown_line("a **bold** and *soft* `x`");
        let texts: Vec<&str> = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(texts, vec!["a ", "bold", " and ", "soft", " ", "x"]);
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert!(line.spans[3].style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn test_unclosed_markers_are_literal() {
        assert_eq!(line_text(&parse_markdown_line("2 * 3 = 6")), "2 * 3 = 6");
        assert_eq!(line_text(&parse_markdown_line("**open")), "**open");
    }

    #[test]
    fn test_markdown_blocks() {
        let lines = markdown_lines("# Title\n- item\n```\nlet x = 1;\n```\nplain");
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["Title", "  • item", "  let x = 1;", "plain"]);
    }

    #[test]
    fn test_table_columns_are_aligned() {
        let lines = table_lines(&[
            vec!["Name".to_string(), "Qty".to_string()],
            vec!["Apples".to_string(), "3".to_string()],
        ]);
        assert_eq!(line_text(&lines[0]), "Name   │ Qty");
        assert_eq!(line_text(&lines[1]), "Apples │ 3  ");
    }

    #[test]
    fn test_table_first_row_is_not_a_header() {
        let lines = table_lines(&[
            vec!["1".to_string(), "2".to_string()],
            vec!["3".to_string(), "4".to_string()],
        ]);
        assert_eq!(lines[0].spans[0].style, lines[1].spans[0].style);
        assert_eq!(lines[0].spans[0].style.add_modifier, Modifier::empty());
    }

    #[test]
    fn test_chart_bar_width() {
        let lines = rendered_lines(&Rendered::Chart(vec![
            ChartBar {
                label: "a".to_string(),
                value: 10.0,
                percent: 100.0,
            },
            ChartBar {
                label: "b".to_string(),
                value: 5.0,
                percent: 50.0,
            },
        ]));
        assert_eq!(lines[0].spans[1].content.chars().count(), MAX_BAR_WIDTH);
        assert_eq!(lines[1].spans[1].content.chars().count(), MAX_BAR_WIDTH / 2);
    }

    #[test]
    fn test_error_notice_is_red() {
        let lines = rendered_lines(&Rendered::Notice {
            variant: NoticeVariant::Destructive,
            text: "Chat request failed (500)".to_string(),
        });
        assert_eq!(line_text(&lines[0]), "✖ Chat request failed (500)");
        assert_eq!(lines[0].spans[0].style.fg, Some(Color::Red));
    }
}
