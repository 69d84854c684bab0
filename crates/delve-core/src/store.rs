//! UI-agnostic application state
//!
//! Chat and conversation-list state live in one [`Store`] and change only
//! through the reducer functions below, so any front end can drive them from
//! its own event loop.

use crate::conversation::ConversationSummary;
use crate::message::Message;

pub const SEND_FAILED: &str = "Something went wrong while contacting the assistant.";
pub const LOAD_FAILED: &str = "We couldn't load that conversation. Please try again.";

/// Progress of the single outstanding request a slice may have
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    Idle,
    Loading,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    pub messages: Vec<Message>,
    pub status: Status,
    pub error: Option<String>,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatAction {
    AddMessage(Message),
    Reset,
    SendPending,
    SendFulfilled {
        messages: Vec<Message>,
        conversation_id: Option<String>,
    },
    SendRejected(Option<String>),
    LoadPending {
        conversation_id: String,
    },
    LoadFulfilled {
        conversation_id: String,
        messages: Vec<Message>,
    },
    LoadRejected(Option<String>),
}

impl ChatState {
    pub fn reduce(&mut self, action: ChatAction) {
        match action {
            ChatAction::AddMessage(message) => self.messages.push(message),
            ChatAction::Reset => *self = ChatState::default(),
            ChatAction::SendPending => {
                self.status = Status::Loading;
                self.error = None;
            }
            ChatAction::SendFulfilled {
                messages,
                conversation_id,
            } => {
                self.status = Status::Idle;
                if conversation_id.is_some() {
                    self.conversation_id = conversation_id;
                }
                self.messages.extend(messages);
            }
            ChatAction::SendRejected(error) => {
                self.status = Status::Idle;
                let text = error.clone().unwrap_or_else(|| SEND_FAILED.to_string());
                self.error = error;
                self.messages.push(Message::error_alert(text));
            }
            ChatAction::LoadPending { conversation_id } => {
                self.status = Status::Loading;
                self.error = None;
                self.conversation_id = Some(conversation_id);
                self.messages.clear();
            }
            ChatAction::LoadFulfilled {
                conversation_id,
                messages,
            } => {
                self.status = Status::Idle;
                self.conversation_id = Some(conversation_id);
                self.messages = messages;
            }
            ChatAction::LoadRejected(error) => {
                self.status = Status::Idle;
                let text = error.clone().unwrap_or_else(|| LOAD_FAILED.to_string());
                self.error = error;
                self.messages = vec![Message::error_alert(text)];
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == Status::Loading
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationsState {
    pub items: Vec<ConversationSummary>,
    pub status: Status,
    pub error: Option<String>,
    pub selected_conversation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConversationsAction {
    SetSelected(Option<String>),
    LoadPending,
    LoadFulfilled(Vec<ConversationSummary>),
    LoadRejected(String),
    DeleteFulfilled(String),
    DeleteRejected(String),
    ClearFulfilled,
    ClearRejected(String),
}

impl ConversationsState {
    pub fn reduce(&mut self, action: ConversationsAction) {
        match action {
            ConversationsAction::SetSelected(id) => self.selected_conversation_id = id,
            ConversationsAction::LoadPending => {
                self.status = Status::Loading;
                self.error = None;
            }
            ConversationsAction::LoadFulfilled(items) => {
                self.status = Status::Idle;
                self.items = items;
            }
            ConversationsAction::LoadRejected(error) => {
                self.status = Status::Error;
                self.error = Some(error);
                self.items.clear();
            }
            ConversationsAction::DeleteFulfilled(id) => {
                self.items.retain(|item| item.conversation_id != id);
                if self.selected_conversation_id.as_deref() == Some(id.as_str()) {
                    self.selected_conversation_id = None;
                }
            }
            ConversationsAction::ClearFulfilled => {
                self.items.clear();
                self.selected_conversation_id = None;
            }
            ConversationsAction::DeleteRejected(error) | ConversationsAction::ClearRejected(error) => {
                self.error = Some(error);
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == Status::Loading
    }

    pub fn position_of(&self, conversation_id: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.conversation_id == conversation_id)
    }
}

/// Single owner of all chat and conversation state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    pub chat: ChatState,
    pub conversations: ConversationsState,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch_chat(&mut self, action: ChatAction) {
        self.chat.reduce(action);
    }

    pub fn dispatch_conversations(&mut self, action: ConversationsAction) {
        self.conversations.reduce(action);
    }

    /// Apply a successful delete. Only a selected conversation clears the chat.
    pub fn conversation_deleted(&mut self, conversation_id: &str) {
        let was_selected =
            self.conversations.selected_conversation_id.as_deref() == Some(conversation_id);

        self.dispatch_conversations(ConversationsAction::DeleteFulfilled(
            conversation_id.to_string(),
        ));

        if was_selected {
            self.dispatch_chat(ChatAction::Reset);
        }
    }

    pub fn all_conversations_cleared(&mut self) {
        self.dispatch_conversations(ConversationsAction::ClearFulfilled);
        self.dispatch_chat(ChatAction::Reset);
    }

    pub fn start_new_conversation(&mut self) {
        self.dispatch_chat(ChatAction::Reset);
        self.dispatch_conversations(ConversationsAction::SetSelected(None));
    }

    /// Mark a conversation selected and put the chat into its loading state
    pub fn select_conversation(&mut self, conversation_id: &str) {
        self.dispatch_conversations(ConversationsAction::SetSelected(Some(
            conversation_id.to_string(),
        )));
        self.dispatch_chat(ChatAction::LoadPending {
            conversation_id: conversation_id.to_string(),
        });
    }

    pub fn can_send(&self) -> bool {
        !self.chat.is_loading()
    }
}
