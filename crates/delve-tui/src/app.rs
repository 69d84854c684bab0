use delve_core::admin::{total_tokens, AdminDashboard, AdminSessionSummary, AdminUserSummary};
use delve_core::{
    ApiClient, BackendHealth, ChatAction, Config, ConversationsAction, Message, Role, Store,
};
use ratatui::layout::Rect;
use ratatui::widgets::{ListState, TableState};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::tui::{ApiEvent, AppEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Chat,
    Admin,
    AdminUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Sidebar,
    Chat,
    Input,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    Checking,
    Online(Option<String>),
    Offline(String),
}

/// Destructive action waiting for a yes/no answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirm {
    Delete { conversation_id: String, title: String },
    ClearAll,
}

impl Confirm {
    pub fn prompt(&self) -> String {
        match self {
            Confirm::Delete { title, .. } => {
                format!("Are you sure you want to delete \"{}\"?", title)
            }
            Confirm::ClearAll => {
                "Are you sure you want to delete all conversations? This action cannot be undone."
                    .to_string()
            }
        }
    }
}

/// State of the admin dashboard and per-user screens
#[derive(Debug, Default)]
pub struct AdminView {
    pub dashboard: Option<AdminDashboard>,
    pub loading: bool,
    pub error: Option<String>,
    pub user_state: TableState,
    pub selected_user: Option<String>,
    pub user_sessions: Vec<AdminSessionSummary>,
    pub user_loading: bool,
    pub user_error: Option<String>,
    pub session_state: TableState,
}

impl AdminView {
    pub fn users(&self) -> &[AdminUserSummary] {
        self.dashboard
            .as_ref()
            .map(|d| d.users.as_slice())
            .unwrap_or(&[])
    }

    pub fn highlighted_user(&self) -> Option<&AdminUserSummary> {
        self.user_state.selected().and_then(|i| self.users().get(i))
    }

    pub fn user_tokens(&self) -> u64 {
        total_tokens(&self.user_sessions)
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    pub store: Store,
    pub backend: BackendStatus,
    pub banner: Option<String>,
    pub confirm: Option<Confirm>,

    // Sidebar: row 0 is "New conversation", then the history list
    pub sidebar_state: ListState,

    // Composer
    pub input: String,
    pub cursor: usize,

    // Chat scrolling (dimensions updated during render)
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub total_chat_lines: u16,
    pub follow_tail: bool,

    pub admin: AdminView,

    // Animation state
    pub animation_frame: u8,

    // Bumped whenever the chat view changes identity so late replies are dropped
    pub chat_epoch: u64,

    // Panel areas for mouse hit-testing (updated during render)
    pub sidebar_area: Option<Rect>,
    pub chat_area: Option<Rect>,

    pub client: ApiClient,
    pub user_id: String,
    tx: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(config: &Config, tx: UnboundedSender<AppEvent>) -> Self {
        let mut sidebar_state = ListState::default();
        sidebar_state.select(Some(0));

        Self {
            should_quit: false,
            screen: Screen::Chat,
            input_mode: InputMode::Editing,
            focus: FocusPane::Input,

            store: Store::new(),
            backend: BackendStatus::Checking,
            banner: None,
            confirm: None,

            sidebar_state,

            input: String::new(),
            cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            total_chat_lines: 0,
            follow_tail: true,

            admin: AdminView::default(),

            animation_frame: 0,
            chat_epoch: 0,

            sidebar_area: None,
            chat_area: None,

            client: ApiClient::from_config(config),
            user_id: config.user_id.clone(),
            tx,
        }
    }

    /// Initial requests issued once the event loop is running
    pub fn start(&mut self) {
        self.check_backend();
        self.load_conversations();
    }

    pub fn is_online(&self) -> bool {
        matches!(self.backend, BackendStatus::Online(_))
    }

    pub fn composer_enabled(&self) -> bool {
        self.is_online() && self.store.can_send()
    }

    pub fn is_new_conversation_active(&self) -> bool {
        self.store.conversations.selected_conversation_id.is_none()
    }

    // Background requests

    fn send_event(tx: &UnboundedSender<AppEvent>, event: ApiEvent) {
        if tx.send(AppEvent::Api(event)).is_err() {
            debug!("event loop closed before request finished");
        }
    }

    pub fn check_backend(&mut self) {
        self.backend = BackendStatus::Checking;
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let health = client.check_health().await;
            Self::send_event(&tx, ApiEvent::Health(health));
        });
    }

    pub fn load_conversations(&mut self) {
        self.store
            .dispatch_conversations(ConversationsAction::LoadPending);
        let client = self.client.clone();
        let user_id = self.user_id.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client
                .fetch_conversations(&user_id)
                .await
                .map_err(|e| e.to_string());
            Self::send_event(&tx, ApiEvent::ConversationsLoaded(result));
        });
    }

    pub fn open_conversation(&mut self, conversation_id: &str) {
        info!(conversation_id, "opening conversation");
        self.chat_epoch += 1;
        self.store.select_conversation(conversation_id);
        self.follow_tail = true;

        let epoch = self.chat_epoch;
        let client = self.client.clone();
        let user_id = self.user_id.clone();
        let conversation_id = conversation_id.to_string();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client
                .fetch_conversation_detail(&conversation_id, &user_id)
                .await
                .map_err(|e| e.to_string());
            Self::send_event(&tx, ApiEvent::ConversationLoaded { epoch, result });
        });
    }

    pub fn start_new_conversation(&mut self) {
        self.chat_epoch += 1;
        self.store.start_new_conversation();
        self.sidebar_state.select(Some(0));
        self.chat_scroll = 0;
        self.follow_tail = true;
        self.load_conversations();
    }

    /// Send the composer contents. Returns false when sending is not allowed.
    pub fn submit_input(&mut self) -> bool {
        let prompt = self.input.trim().to_string();
        if prompt.is_empty() || !self.composer_enabled() {
            return false;
        }

        self.store
            .dispatch_chat(ChatAction::AddMessage(Message::text(Role::User, prompt.clone())));
        self.store.dispatch_chat(ChatAction::SendPending);
        self.input.clear();
        self.cursor = 0;
        self.follow_tail = true;

        let epoch = self.chat_epoch;
        let client = self.client.clone();
        let user_id = self.user_id.clone();
        let conversation_id = self.store.chat.conversation_id.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client
                .send_message(&prompt, &user_id, conversation_id.as_deref())
                .await
                .map_err(|e| e.to_string());
            Self::send_event(&tx, ApiEvent::MessageSent { epoch, result });
        });
        true
    }

    pub fn delete_conversation(&mut self, conversation_id: String) {
        let client = self.client.clone();
        let user_id = self.user_id.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client
                .delete_session(&conversation_id, &user_id)
                .await
                .map_err(|e| e.to_string());
            Self::send_event(
                &tx,
                ApiEvent::Deleted {
                    conversation_id,
                    result,
                },
            );
        });
    }

    pub fn clear_conversations(&mut self) {
        let client = self.client.clone();
        let user_id = self.user_id.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client
                .clear_sessions(&user_id)
                .await
                .map_err(|e| e.to_string());
            Self::send_event(&tx, ApiEvent::Cleared(result));
        });
    }

    pub fn open_admin(&mut self) {
        self.screen = Screen::Admin;
        self.input_mode = InputMode::Normal;
        self.admin.loading = true;
        self.admin.error = None;
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client
                .fetch_admin_dashboard()
                .await
                .map_err(|e| e.to_string());
            Self::send_event(&tx, ApiEvent::AdminDashboard(result));
        });
    }

    pub fn open_admin_user(&mut self, user_id: String) {
        self.screen = Screen::AdminUser;
        self.admin.selected_user = Some(user_id.clone());
        self.admin.user_sessions.clear();
        self.admin.session_state.select(None);
        self.admin.user_loading = true;
        self.admin.user_error = None;
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client
                .fetch_admin_user_conversations(&user_id)
                .await
                .map_err(|e| e.to_string());
            Self::send_event(&tx, ApiEvent::AdminUserConversations { user_id, result });
        });
    }

    // Sidebar navigation

    fn sidebar_len(&self) -> usize {
        self.store.conversations.items.len() + 1
    }

    pub fn sidebar_down(&mut self) {
        let i = self.sidebar_state.selected().unwrap_or(0);
        self.sidebar_state
            .select(Some((i + 1).min(self.sidebar_len() - 1)));
    }

    pub fn sidebar_up(&mut self) {
        let i = self.sidebar_state.selected().unwrap_or(0);
        self.sidebar_state.select(Some(i.saturating_sub(1)));
    }

    /// Conversation under the sidebar cursor; `None` on the "New conversation" row
    pub fn highlighted_conversation(&self) -> Option<(String, String)> {
        let i = self.sidebar_state.selected()?;
        let item = self.store.conversations.items.get(i.checked_sub(1)?)?;
        Some((item.conversation_id.clone(), item.title.clone()))
    }

    /// Keep the sidebar cursor in range after the list changes
    pub fn clamp_sidebar(&mut self) {
        let last = self.sidebar_len() - 1;
        let i = self.sidebar_state.selected().unwrap_or(0);
        self.sidebar_state.select(Some(i.min(last)));
    }

    // Chat scrolling

    fn max_chat_scroll(&self) -> u16 {
        self.total_chat_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_down(&mut self) {
        self.chat_scroll = (self.chat_scroll + 1).min(self.max_chat_scroll());
        self.follow_tail = self.chat_scroll >= self.max_chat_scroll();
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
        self.follow_tail = false;
    }

    pub fn scroll_half_page_down(&mut self) {
        let half_page = self.chat_height / 2;
        self.chat_scroll = (self.chat_scroll + half_page).min(self.max_chat_scroll());
        self.follow_tail = self.chat_scroll >= self.max_chat_scroll();
    }

    pub fn scroll_half_page_up(&mut self) {
        let half_page = self.chat_height / 2;
        self.chat_scroll = self.chat_scroll.saturating_sub(half_page);
        self.follow_tail = false;
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
        self.follow_tail = false;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.max_chat_scroll();
        self.follow_tail = true;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.store.chat.is_loading() || self.backend == BackendStatus::Checking {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn apply_health(&mut self, health: BackendHealth) {
        self.backend = match health {
            BackendHealth::Online { detail } => BackendStatus::Online(detail),
            BackendHealth::Offline { detail } => BackendStatus::Offline(detail),
        };
        if !self.is_online() && self.input_mode == InputMode::Editing {
            self.input_mode = InputMode::Normal;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_core::ConversationSummary;
    use tokio::sync::mpsc;

    fn summary(id: &str) -> ConversationSummary {
        ConversationSummary {
            conversation_id: id.to_string(),
            title: format!("Title {}", id),
            updated_at: None,
            message_count: None,
        }
    }

    fn test_app() -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = Config {
            backend_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        };
        (App::new(&config, tx), rx)
    }

    #[test]
    fn test_sidebar_navigation_stays_in_range() {
        let (mut app, _rx) = test_app();
        app.store
            .dispatch_conversations(ConversationsAction::LoadFulfilled(vec![
                summary("a"),
                summary("b"),
            ]));

        assert_eq!(app.highlighted_conversation(), None);
        app.sidebar_down();
        app.sidebar_down();
        app.sidebar_down();
        assert_eq!(app.sidebar_state.selected(), Some(2));
        assert_eq!(
            app.highlighted_conversation(),
            Some(("b".to_string(), "Title b".to_string()))
        );

        app.store
            .dispatch_conversations(ConversationsAction::DeleteFulfilled("b".to_string()));
        app.clamp_sidebar();
        assert_eq!(app.sidebar_state.selected(), Some(1));

        app.sidebar_up();
        app.sidebar_up();
        assert_eq!(app.sidebar_state.selected(), Some(0));
    }

    #[test]
    fn test_composer_disabled_until_online() {
        let (mut app, _rx) = test_app();
        app.input = "hello".to_string();
        assert!(!app.composer_enabled());
        assert!(!app.submit_input());
        assert_eq!(app.input, "hello");

        app.apply_health(BackendHealth::Offline {
            detail: "down".to_string(),
        });
        assert_eq!(app.backend, BackendStatus::Offline("down".to_string()));
        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(!app.composer_enabled());
    }

    #[tokio::test]
    async fn test_submit_adds_user_message_and_locks_composer() {
        let (mut app, _rx) = test_app();
        app.apply_health(BackendHealth::Online { detail: None });
        app.input = "  what is rust?  ".to_string();
        app.cursor = 5;

        assert!(app.submit_input());
        assert_eq!(app.store.chat.messages, vec![Message::text(Role::User, "what is rust?")]);
        assert!(app.store.chat.is_loading());
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
        assert!(!app.composer_enabled());

        app.input = "again".to_string();
        assert!(!app.submit_input());
    }

    #[test]
    fn test_blank_input_is_not_sent() {
        let (mut app, _rx) = test_app();
        app.apply_health(BackendHealth::Online { detail: None });
        app.input = "   ".to_string();
        assert!(!app.submit_input());
        assert!(app.store.chat.messages.is_empty());
    }

    #[test]
    fn test_scrolling_clamps_and_tracks_tail() {
        let (mut app, _rx) = test_app();
        app.total_chat_lines = 30;
        app.chat_height = 10;

        app.scroll_to_bottom();
        assert_eq!(app.chat_scroll, 20);
        assert!(app.follow_tail);

        app.scroll_up();
        assert_eq!(app.chat_scroll, 19);
        assert!(!app.follow_tail);

        app.scroll_half_page_down();
        assert_eq!(app.chat_scroll, 20);
        assert!(app.follow_tail);

        app.scroll_to_top();
        app.scroll_half_page_up();
        assert_eq!(app.chat_scroll, 0);
    }

    #[test]
    fn test_confirm_prompts() {
        let delete = Confirm::Delete {
            conversation_id: "a".to_string(),
            title: "Taxes".to_string(),
        };
        assert_eq!(delete.prompt(), "Are you sure you want to delete \"Taxes\"?");
        assert!(Confirm::ClearAll.prompt().contains("cannot be undone"));
    }
}
