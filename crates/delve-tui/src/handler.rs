use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use delve_core::{ChatAction, ConversationsAction};
use ratatui::layout::Rect;
use tracing::{debug, warn};

use crate::app::{App, BackendStatus, Confirm, FocusPane, InputMode, Screen};
use crate::tui::{ApiEvent, AppEvent};

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Api(event) => apply_api_event(app, event),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.confirm.is_some() {
        handle_confirm(app, key);
        return;
    }

    match app.screen {
        Screen::Chat => match app.input_mode {
            InputMode::Normal => handle_chat_normal(app, key),
            InputMode::Editing => handle_editing(app, key),
        },
        Screen::Admin => handle_admin(app, key),
        Screen::AdminUser => handle_admin_user(app, key),
    }
}

fn handle_confirm(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter => {
            match app.confirm.take() {
                Some(Confirm::Delete {
                    conversation_id, ..
                }) => app.delete_conversation(conversation_id),
                Some(Confirm::ClearAll) => app.clear_conversations(),
                None => {}
            }
        }
        KeyCode::Char('n') | KeyCode::Esc => app.confirm = None,
        _ => {}
    }
}

fn focus_input(app: &mut App) {
    app.focus = FocusPane::Input;
    if app.composer_enabled() {
        app.input_mode = InputMode::Editing;
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    // Keys shared by every pane
    match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            return;
        }
        KeyCode::Tab => {
            match app.focus {
                FocusPane::Sidebar => app.focus = FocusPane::Chat,
                FocusPane::Chat => focus_input(app),
                FocusPane::Input => app.focus = FocusPane::Sidebar,
            }
            return;
        }
        KeyCode::Char('i') => {
            focus_input(app);
            return;
        }
        KeyCode::Char('n') => {
            app.start_new_conversation();
            return;
        }
        KeyCode::Char('D') => {
            if !app.store.conversations.items.is_empty() {
                app.confirm = Some(Confirm::ClearAll);
            }
            return;
        }
        KeyCode::Char('r') => {
            if matches!(app.backend, BackendStatus::Offline(_)) {
                app.check_backend();
            }
            return;
        }
        KeyCode::Char('x') | KeyCode::Esc => {
            app.banner = None;
            return;
        }
        KeyCode::Char('A') => {
            app.open_admin();
            return;
        }
        _ => {}
    }

    match app.focus {
        FocusPane::Sidebar => handle_sidebar(app, key),
        FocusPane::Chat => handle_chat_scroll(app, key),
        FocusPane::Input => {
            if key.code == KeyCode::Enter {
                focus_input(app);
            }
        }
    }
}

fn handle_sidebar(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.sidebar_down(),
        KeyCode::Char('k') | KeyCode::Up => app.sidebar_up(),
        KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => {
            match app.highlighted_conversation() {
                Some((conversation_id, _)) => {
                    app.open_conversation(&conversation_id);
                    app.focus = FocusPane::Chat;
                }
                None => app.start_new_conversation(),
            }
        }
        KeyCode::Char('d') => {
            if let Some((conversation_id, title)) = app.highlighted_conversation() {
                app.confirm = Some(Confirm::Delete {
                    conversation_id,
                    title,
                });
            }
        }
        _ => {}
    }
}

fn handle_chat_scroll(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_down()
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_up()
        }
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(),
        KeyCode::Char('g') | KeyCode::Home => app.scroll_to_top(),
        KeyCode::Char('G') | KeyCode::End => app.scroll_to_bottom(),
        KeyCode::PageDown => app.scroll_half_page_down(),
        KeyCode::PageUp => app.scroll_half_page_up(),
        KeyCode::Char('h') | KeyCode::Left => app.focus = FocusPane::Sidebar,
        _ => {}
    }
}

fn handle_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
            app.focus = FocusPane::Sidebar;
        }
        KeyCode::Enter => {
            if !app.submit_input() {
                debug!("composer submit ignored");
            }
        }
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

fn handle_admin(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.screen = Screen::Chat,
        KeyCode::Char('r') => app.open_admin(),
        KeyCode::Char('x') => app.banner = None,
        KeyCode::Char('j') | KeyCode::Down => {
            let len = app.admin.users().len();
            if len > 0 {
                let i = app.admin.user_state.selected().unwrap_or(0);
                app.admin.user_state.select(Some((i + 1).min(len - 1)));
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            let i = app.admin.user_state.selected().unwrap_or(0);
            app.admin.user_state.select(Some(i.saturating_sub(1)));
        }
        KeyCode::Enter => {
            if let Some(user_id) = app.admin.highlighted_user().map(|u| u.user_id.clone()) {
                app.open_admin_user(user_id);
            }
        }
        _ => {}
    }
}

fn handle_admin_user(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc | KeyCode::Backspace => app.screen = Screen::Admin,
        KeyCode::Char('r') => {
            if let Some(user_id) = app.admin.selected_user.clone() {
                app.open_admin_user(user_id);
            }
        }
        KeyCode::Char('x') => app.banner = None,
        KeyCode::Char('j') | KeyCode::Down => {
            let len = app.admin.user_sessions.len();
            if len > 0 {
                let i = app.admin.session_state.selected().unwrap_or(0);
                app.admin.session_state.select(Some((i + 1).min(len - 1)));
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            let i = app.admin.session_state.selected().unwrap_or(0);
            app.admin.session_state.select(Some(i.saturating_sub(1)));
        }
        _ => {}
    }
}

/// Fold a finished request into the store and view state
pub fn apply_api_event(app: &mut App, event: ApiEvent) {
    match event {
        ApiEvent::Health(health) => app.apply_health(health),

        ApiEvent::ConversationsLoaded(Ok(items)) => {
            app.store
                .dispatch_conversations(ConversationsAction::LoadFulfilled(items));
            app.clamp_sidebar();
        }
        ApiEvent::ConversationsLoaded(Err(error)) => {
            warn!(%error, "conversation list failed to load");
            app.store
                .dispatch_conversations(ConversationsAction::LoadRejected(error.clone()));
            app.clamp_sidebar();
            app.banner = Some(error);
        }

        ApiEvent::ConversationLoaded { epoch, result } => {
            if epoch != app.chat_epoch {
                debug!(epoch, current = app.chat_epoch, "dropping stale conversation load");
                return;
            }
            match result {
                Ok(detail) => app.store.dispatch_chat(ChatAction::LoadFulfilled {
                    conversation_id: detail.conversation_id,
                    messages: detail.messages,
                }),
                Err(error) => app.store.dispatch_chat(ChatAction::LoadRejected(Some(error))),
            }
        }

        ApiEvent::MessageSent { epoch, result } => {
            if epoch != app.chat_epoch {
                debug!(epoch, current = app.chat_epoch, "dropping stale chat reply");
                return;
            }
            match result {
                Ok(completion) => {
                    let started = app.store.chat.conversation_id.is_none()
                        && completion.conversation_id.is_some();
                    let new_id = completion.conversation_id.clone();
                    app.store.dispatch_chat(ChatAction::SendFulfilled {
                        messages: completion.messages,
                        conversation_id: completion.conversation_id,
                    });
                    if started {
                        // The backend created a conversation; show it in the sidebar
                        app.store
                            .dispatch_conversations(ConversationsAction::SetSelected(new_id));
                        app.load_conversations();
                    }
                }
                Err(error) => app.store.dispatch_chat(ChatAction::SendRejected(Some(error))),
            }
        }

        ApiEvent::Deleted {
            conversation_id,
            result,
        } => match result {
            Ok(()) => {
                if app.store.conversations.selected_conversation_id.as_deref()
                    == Some(conversation_id.as_str())
                {
                    app.chat_epoch += 1;
                }
                app.store.conversation_deleted(&conversation_id);
                app.clamp_sidebar();
            }
            Err(error) => {
                app.store
                    .dispatch_conversations(ConversationsAction::DeleteRejected(error.clone()));
                app.banner = Some(error);
            }
        },

        ApiEvent::Cleared(Ok(())) => {
            app.chat_epoch += 1;
            app.store.all_conversations_cleared();
            app.sidebar_state.select(Some(0));
        }
        ApiEvent::Cleared(Err(error)) => {
            app.store
                .dispatch_conversations(ConversationsAction::ClearRejected(error.clone()));
            app.banner = Some(error);
        }

        ApiEvent::AdminDashboard(result) => {
            app.admin.loading = false;
            match result {
                Ok(dashboard) => {
                    let first = if dashboard.users.is_empty() { None } else { Some(0) };
                    app.admin.dashboard = Some(dashboard);
                    app.admin.user_state.select(first);
                }
                Err(error) => {
                    app.admin.error = Some(error.clone());
                    app.banner = Some(error);
                }
            }
        }

        ApiEvent::AdminUserConversations { user_id, result } => {
            if app.admin.selected_user.as_deref() != Some(user_id.as_str()) {
                return;
            }
            app.admin.user_loading = false;
            match result {
                Ok(sessions) => {
                    let first = if sessions.is_empty() { None } else { Some(0) };
                    app.admin.user_sessions = sessions;
                    app.admin.session_state.select(first);
                }
                Err(error) => {
                    app.admin.user_error = Some(error.clone());
                    app.banner = Some(error);
                }
            }
        }
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.screen != Screen::Chat || app.confirm.is_some() {
        return;
    }

    let x = mouse.column;
    let y = mouse.row;

    let in_sidebar = app.sidebar_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_sidebar {
                app.sidebar_down();
            } else if in_chat {
                app.scroll_down();
            }
        }
        MouseEventKind::ScrollUp => {
            if in_sidebar {
                app.sidebar_up();
            } else if in_chat {
                app.scroll_up();
            }
        }
        MouseEventKind::Down(_) => {
            if in_sidebar {
                app.focus = FocusPane::Sidebar;
                app.input_mode = InputMode::Normal;
            } else if in_chat {
                app.focus = FocusPane::Chat;
                app.input_mode = InputMode::Normal;
            }
        }
        _ => {}
    }
}
