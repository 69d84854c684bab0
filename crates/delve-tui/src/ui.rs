use delve_core::admin::{AdminSessionSummary, AdminUserSummary};
use delve_core::{render_message, Message, Role};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, Wrap,
    },
    Frame,
};

use crate::app::{App, BackendStatus, FocusPane, InputMode, Screen};
use crate::message_view::rendered_lines;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let banners = banner_lines(app);

    // Main layout: header, banners, body, footer
    let [header_area, banner_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(banners.len() as u16),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    if !banners.is_empty() {
        frame.render_widget(Paragraph::new(banners), banner_area);
    }

    match app.screen {
        Screen::Chat => render_chat_screen(app, frame, body_area),
        Screen::Admin => render_admin_screen(app, frame, body_area),
        Screen::AdminUser => render_admin_user_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    if app.confirm.is_some() {
        render_confirm(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let (status_text, status_color) = match &app.backend {
        BackendStatus::Checking => ("● checking".to_string(), Color::Yellow),
        BackendStatus::Online(detail) => (
            match detail {
                Some(detail) => format!("● online ({})", detail),
                None => "● online".to_string(),
            },
            Color::Green,
        ),
        BackendStatus::Offline(_) => ("● offline".to_string(), Color::Red),
    };

    let title = Line::from(vec![
        Span::styled(" Delve ", Style::default().fg(Color::Cyan).bold()),
        Span::styled("LLM assistant workspace ", Style::default().fg(Color::Gray)),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  "),
        Span::styled(format!("user: {}", app.user_id), Style::default().fg(Color::White)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn banner_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    match &app.backend {
        BackendStatus::Checking if app.screen == Screen::Chat => {
            lines.push(Line::from(Span::styled(
                " Checking LLM backend status...",
                Style::default().fg(Color::Blue),
            )));
        }
        BackendStatus::Offline(detail) if app.screen == Screen::Chat => {
            lines.push(Line::from(vec![
                Span::styled(
                    " LLM backend is offline: ",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
                Span::styled(detail.clone(), Style::default().fg(Color::Red)),
                Span::styled("  [r] retry", Style::default().fg(Color::DarkGray)),
            ]));
        }
        _ => {}
    }

    if let Some(error) = &app.banner {
        lines.push(Line::from(vec![
            Span::styled(" ✖ ", Style::default().fg(Color::Red)),
            Span::styled(error.clone(), Style::default().fg(Color::Red)),
            Span::styled("  [x] dismiss", Style::default().fg(Color::DarkGray)),
        ]));
    }

    lines
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Chat => " CHAT ",
        Screen::Admin => " ADMIN ",
        Screen::AdminUser => " USER ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [
            Span::styled(format!(" {} ", key), key_style),
            Span::styled(format!(" {} ", label), label_style),
        ]
    };

    let mut hints: Vec<Span> = Vec::new();
    match (app.screen, app.input_mode) {
        (Screen::Chat, InputMode::Editing) => {
            hints.extend(hint("Enter", "send"));
            hints.extend(hint("Esc", "stop typing"));
            hints.extend(hint("Tab", "sidebar"));
        }
        (Screen::Chat, InputMode::Normal) => {
            match app.focus {
                FocusPane::Sidebar => {
                    hints.extend(hint("j/k", "nav"));
                    hints.extend(hint("Enter", "open"));
                    hints.extend(hint("d", "delete"));
                }
                FocusPane::Chat => {
                    hints.extend(hint("j/k", "scroll"));
                    hints.extend(hint("g/G", "top/bottom"));
                }
                FocusPane::Input => {
                    hints.extend(hint("i", "type"));
                }
            }
            hints.extend(hint("Tab", "focus"));
            hints.extend(hint("n", "new"));
            if !app.store.conversations.items.is_empty() {
                hints.extend(hint("D", "clear all"));
            }
            if matches!(app.backend, BackendStatus::Offline(_)) {
                hints.extend(hint("r", "retry"));
            }
            hints.extend(hint("A", "admin"));
            hints.extend(hint("q", "quit"));
        }
        (Screen::Admin, _) => {
            hints.extend(hint("j/k", "nav"));
            hints.extend(hint("Enter", "user"));
            hints.extend(hint("r", "refresh"));
            hints.extend(hint("Esc", "chat"));
        }
        (Screen::AdminUser, _) => {
            hints.extend(hint("j/k", "nav"));
            hints.extend(hint("r", "refresh"));
            hints.extend(hint("Esc", "dashboard"));
        }
    }

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [sidebar_area, main_area] = Layout::horizontal([
        Constraint::Length(32),
        Constraint::Min(0),
    ])
    .areas(area);

    let warning_height = if app.is_online() { 0 } else { 1 };
    let [chat_area, warning_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(warning_height),
        Constraint::Length(3),
    ])
    .areas(main_area);

    // Store areas for mouse hit-testing
    app.sidebar_area = Some(sidebar_area);
    app.chat_area = Some(chat_area);

    render_sidebar(app, frame, sidebar_area);
    render_messages(app, frame, chat_area);

    if warning_height > 0 {
        let warning = Paragraph::new(Line::from(Span::styled(
            " The backend is currently unavailable. Try again once it is online.",
            Style::default().fg(Color::Yellow),
        )));
        frame.render_widget(warning, warning_area);
    }

    render_composer(app, frame, input_area);
}

fn render_sidebar(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Sidebar;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Conversations ");

    let conversations = &app.store.conversations;
    let selected = conversations.selected_conversation_id.as_deref();

    let new_style = if app.is_new_conversation_active() {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    let mut items = vec![ListItem::new(" + Start new conversation").style(new_style)];

    for item in &conversations.items {
        let is_active = selected == Some(item.conversation_id.as_str());
        let marker = if is_active { "● " } else { "  " };
        let style = if is_active {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        items.push(ListItem::new(format!("{}{}", marker, item.title)).style(style));
    }

    // Notices below the list
    if conversations.is_loading() && !conversations.items.is_empty() {
        items.push(ListItem::new(Span::styled(
            "  Loading conversations...",
            Style::default().fg(Color::DarkGray),
        )));
    } else if !conversations.is_loading() && conversations.items.is_empty() {
        items.push(ListItem::new(Span::styled(
            "  No conversations available.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(if focused { "> " } else { "  " });

    frame.render_stateful_widget(list, area, &mut app.sidebar_state);
}

fn role_line(role: Role) -> Line<'static> {
    let color = match role {
        Role::User => Color::Cyan,
        Role::Ai => Color::Yellow,
        Role::Agent => Color::Magenta,
    };
    Line::from(Span::styled(
        format!("{}:", role.display_name()),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

fn message_lines(messages: &[Message]) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for message in messages {
        lines.push(role_line(message.role));
        lines.extend(rendered_lines(&render_message(message)));
        lines.push(Line::default());
    }
    lines
}

/// Number of terminal rows the lines occupy once wrapped at `width`
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    let width = width.max(1) as usize;
    let rows: usize = lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(width))
        .sum();
    rows.min(u16::MAX as usize) as u16
}

fn render_messages(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Chat;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let title = match &app.store.chat.conversation_id {
        Some(id) => {
            let name = app
                .store
                .conversations
                .position_of(id)
                .map(|i| app.store.conversations.items[i].title.clone())
                .unwrap_or_else(|| id.clone());
            format!(" {} ", name)
        }
        None => " New conversation ".to_string(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let chat = &app.store.chat;
    let lines = if chat.messages.is_empty() && !chat.is_loading() {
        vec![Line::from(Span::styled(
            "Ask the assistant anything...",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        let mut lines = message_lines(&chat.messages);
        if chat.is_loading() {
            lines.push(role_line(Role::Ai));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
        lines
    };

    app.total_chat_lines = wrapped_height(&lines, app.chat_width);
    let max_scroll = app.total_chat_lines.saturating_sub(app.chat_height);
    if app.follow_tail {
        app.chat_scroll = max_scroll;
    } else {
        app.chat_scroll = app.chat_scroll.min(max_scroll);
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(paragraph, area);
}

fn render_composer(app: &App, frame: &mut Frame, area: Rect) {
    let enabled = app.composer_enabled();
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if !enabled {
        Color::DarkGray
    } else if editing || app.focus == FocusPane::Input {
        Color::Yellow
    } else {
        Color::Gray
    };

    let title = if app.store.chat.is_loading() {
        " Waiting for the assistant... "
    } else if !app.is_online() {
        " Composer disabled "
    } else {
        " Message (i to type, Enter to send) "
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let input = if app.input.is_empty() && !editing {
        Paragraph::new(Span::styled(
            "Ask the assistant anything...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let visible_text: String = app
            .input
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect();
        let color = if enabled { Color::Cyan } else { Color::DarkGray };
        Paragraph::new(visible_text).style(Style::default().fg(color))
    };

    frame.render_widget(input.block(block), area);

    // Show cursor when editing
    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn stat_card(frame: &mut Frame, area: Rect, label: &str, value: String) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(format!(" {} ", label), Style::default().fg(Color::Gray)));
    let paragraph = Paragraph::new(Line::from(Span::styled(
        value,
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    )))
    .block(block);
    frame.render_widget(paragraph, area);
}

/// Trim an ISO-8601 timestamp to minutes for table cells
fn short_timestamp(value: &str) -> String {
    if value.is_empty() {
        return "—".to_string();
    }
    value.replacen('T', " ", 1).chars().take(16).collect()
}

fn placeholder(frame: &mut Frame, area: Rect, title: &str, text: &str, color: Color) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" {} ", title));
    let paragraph = Paragraph::new(text.to_string())
        .style(Style::default().fg(color))
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn user_row(user: &AdminUserSummary) -> Row<'static> {
    let status = if user.is_active {
        Cell::from(Span::styled("active", Style::default().fg(Color::Green)))
    } else {
        Cell::from(Span::styled("inactive", Style::default().fg(Color::DarkGray)))
    };
    Row::new(vec![
        Cell::from(user.user_id.clone()),
        Cell::from(user.session_count.to_string()),
        Cell::from(user.total_tokens.to_string()),
        status,
        Cell::from(short_timestamp(user.last_active.as_deref().unwrap_or(""))),
    ])
}

fn session_row(session: &AdminSessionSummary) -> Row<'static> {
    let title = if session.title.is_empty() {
        session.session_id.clone()
    } else {
        session.title.clone()
    };
    Row::new(vec![
        Cell::from(title),
        Cell::from(session.message_count.to_string()),
        Cell::from(session.tokens_used.to_string()),
        Cell::from(short_timestamp(&session.created_at)),
        Cell::from(short_timestamp(&session.updated_at)),
    ])
}

fn header_row(labels: &[&'static str]) -> Row<'static> {
    Row::new(labels.to_vec())
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .bottom_margin(1)
}

fn render_admin_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [cards_area, table_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    let [users_area, active_area, sessions_area, tokens_area] = Layout::horizontal([
        Constraint::Ratio(1, 4),
        Constraint::Ratio(1, 4),
        Constraint::Ratio(1, 4),
        Constraint::Ratio(1, 4),
    ])
    .areas(cards_area);

    let dashboard = app.admin.dashboard.clone().unwrap_or_default();
    let value = |n: u64| {
        if app.admin.loading && app.admin.dashboard.is_none() {
            "...".to_string()
        } else {
            n.to_string()
        }
    };
    stat_card(frame, users_area, "Total Users", value(dashboard.total_users));
    stat_card(frame, active_area, "Active Users", value(dashboard.active_users));
    stat_card(frame, sessions_area, "Total Sessions", value(dashboard.total_sessions));
    stat_card(frame, tokens_area, "Total Tokens Used", value(dashboard.total_tokens));

    if app.admin.loading && app.admin.dashboard.is_none() {
        placeholder(frame, table_area, "User Activity", "Loading dashboard...", Color::DarkGray);
        return;
    }
    if let Some(error) = &app.admin.error {
        placeholder(frame, table_area, "User Activity", error, Color::Red);
        return;
    }
    if dashboard.users.is_empty() {
        placeholder(frame, table_area, "User Activity", "No users yet.", Color::DarkGray);
        return;
    }

    let rows: Vec<Row> = dashboard.users.iter().map(user_row).collect();
    let table = Table::new(
        rows,
        [
            Constraint::Min(16),
            Constraint::Length(10),
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(18),
        ],
    )
    .header(header_row(&["User", "Sessions", "Tokens", "Status", "Last Updated"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" User Activity (Enter to view) "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

    frame.render_stateful_widget(table, table_area, &mut app.admin.user_state);
}

fn render_admin_user_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [cards_area, table_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    let [count_area, tokens_area] = Layout::horizontal([
        Constraint::Ratio(1, 2),
        Constraint::Ratio(1, 2),
    ])
    .areas(cards_area);

    let user_id = app.admin.selected_user.clone().unwrap_or_default();
    let loading = app.admin.user_loading;
    let count = if loading {
        "...".to_string()
    } else {
        app.admin.user_sessions.len().to_string()
    };
    let tokens = if loading {
        "...".to_string()
    } else {
        app.admin.user_tokens().to_string()
    };
    stat_card(frame, count_area, "Conversations", count);
    stat_card(frame, tokens_area, "Total Tokens", tokens);

    let title = format!("Conversations for {}", user_id);
    if loading {
        placeholder(frame, table_area, &title, "Loading conversations...", Color::DarkGray);
        return;
    }
    if let Some(error) = &app.admin.user_error {
        placeholder(frame, table_area, &title, error, Color::Red);
        return;
    }
    if app.admin.user_sessions.is_empty() {
        placeholder(
            frame,
            table_area,
            &title,
            "No conversations for this user.",
            Color::DarkGray,
        );
        return;
    }

    let rows: Vec<Row> = app.admin.user_sessions.iter().map(session_row).collect();
    let table = Table::new(
        rows,
        [
            Constraint::Min(20),
            Constraint::Length(10),
            Constraint::Length(12),
            Constraint::Length(18),
            Constraint::Length(18),
        ],
    )
    .header(header_row(&["Conversation", "Messages", "Tokens", "Created", "Updated"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(format!(" {} ", title)),
    )
    .highlight_style(
        Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

    frame.render_stateful_widget(table, table_area, &mut app.admin.session_state);
}

fn render_confirm(app: &App, frame: &mut Frame, area: Rect) {
    let Some(confirm) = &app.confirm else {
        return;
    };

    // Calculate popup size and position (centered)
    let popup_width = 60.min(area.width.saturating_sub(4));
    let popup_height = 6;

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Confirm ");

    let text = Text::from(vec![
        Line::from(confirm.prompt()),
        Line::default(),
        Line::from(vec![
            Span::styled(" y ", Style::default().bg(Color::Red).fg(Color::White)),
            Span::raw(" delete   "),
            Span::styled(" n ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" cancel"),
        ]),
    ]);

    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_height_counts_rows() {
        let lines = vec![
            Line::from("x".repeat(25)),
            Line::default(),
            Line::from("short"),
        ];
        assert_eq!(wrapped_height(&lines, 10), 5);
        assert_eq!(wrapped_height(&lines, 0), 31);
    }

    #[test]
    fn test_short_timestamp() {
        assert_eq!(short_timestamp("2024-05-01T10:20:30.123Z"), "2024-05-01 10:20");
        assert_eq!(short_timestamp(""), "—");
    }

    #[test]
    fn test_message_lines_label_roles() {
        let lines = message_lines(&[
            Message::text(Role::User, "hi"),
            Message::text(Role::Ai, "hello"),
        ]);
        let texts: Vec<String> = lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();
        assert_eq!(texts, vec!["You:", "hi", "", "Assistant:", "hello", ""]);
    }
}
