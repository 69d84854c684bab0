pub mod admin;
pub mod api;
pub mod config;
pub mod conversation;
pub mod error;
pub mod message;
pub mod normalize;
pub mod render;
pub mod store;

// Re-export main types for convenience
pub use admin::{AdminDashboard, AdminSessionSummary, AdminUserSummary};
pub use api::{ApiClient, BackendHealth, ChatCompletion};
pub use config::Config;
pub use conversation::{ConversationDetail, ConversationSummary};
pub use error::{ApiError, ApiResult};
pub use message::{Message, MessageBody, MessageKind, Role};
pub use render::{render_message, Rendered};
pub use store::{ChatAction, ConversationsAction, Status, Store};
