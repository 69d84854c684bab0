//! Usage statistics served by the backend's admin endpoints.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestAnswer {
    pub session_id: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminSessionSummary {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub tokens_used: u64,
    #[serde(default)]
    pub latest_answer: Option<LatestAnswer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUserSummary {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub session_count: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub last_active: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub sessions: Vec<AdminSessionSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminDashboard {
    #[serde(default)]
    pub total_users: u64,
    #[serde(default)]
    pub active_users: u64,
    #[serde(default)]
    pub total_sessions: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub users: Vec<AdminUserSummary>,
}

/// Sum of tokens across a user's sessions
pub fn total_tokens(sessions: &[AdminSessionSummary]) -> u64 {
    sessions.iter().map(|s| s.tokens_used).sum()
}
