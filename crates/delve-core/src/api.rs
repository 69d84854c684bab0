use reqwest::{Client, Response, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::admin::{AdminDashboard, AdminSessionSummary};
use crate::config::Config;
use crate::conversation::{ConversationDetail, ConversationSummary};
use crate::error::{ApiError, ApiResult};
use crate::message::Message;
use crate::normalize::{
    normalize_admin_session, normalize_conversation, normalize_conversation_detail,
    normalize_llm_payload,
};

const OFFLINE_DETAIL: &str = "LLM backend is not reachable.";
pub const UNEXPECTED_CHAT_RESPONSE: &str = "Received an unexpected response from the LLM backend.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

/// Result of a liveness probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendHealth {
    Online { detail: Option<String> },
    Offline { detail: String },
}

impl BackendHealth {
    pub fn is_online(&self) -> bool {
        matches!(self, BackendHealth::Online { .. })
    }
}

/// Messages produced by one chat turn
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    pub messages: Vec<Message>,
    pub conversation_id: Option<String>,
}

/// Join a base URL and a path with exactly one slash
pub fn build_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// Resolve the health endpoint.
///
/// A configured health URL may be relative to the backend URL; one with no
/// path gets `/health`. Anything unparseable falls back to `<base>/health`.
pub fn resolve_health_url(base: &str, health: Option<&str>) -> String {
    let fallback = build_url(base, "/health");

    let Some(health) = health.map(str::trim).filter(|h| !h.is_empty()) else {
        return fallback;
    };

    let resolved = Url::parse(base)
        .and_then(|base| base.join(health))
        .or_else(|_| Url::parse(health));

    match resolved {
        Ok(mut url) => {
            if url.path().is_empty() || url.path() == "/" {
                url.set_path("/health");
            }
            url.to_string()
        }
        Err(_) => fallback,
    }
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    health_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
            health_url: resolve_health_url(base_url, None),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.backend_url).with_health_url(config.health_url.as_deref())
    }

    pub fn with_health_url(mut self, health: Option<&str>) -> Self {
        self.health_url = resolve_health_url(&self.base_url, health);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn health_url(&self) -> &str {
        &self.health_url
    }

    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Probe the backend. Never fails: every problem is reported as offline.
    pub async fn check_health(&self) -> BackendHealth {
        debug!(url = %self.health_url, "checking backend health");

        let response = match self.client.get(&self.health_url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "backend health check failed");
                return BackendHealth::Offline {
                    detail: OFFLINE_DETAIL.to_string(),
                };
            }
        };

        if !response.status().is_success() {
            return BackendHealth::Offline {
                detail: format!(
                    "Health check failed with status {}",
                    response.status().as_u16()
                ),
            };
        }

        let detail = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|payload| payload.get("status").cloned())
            .map(|status| match status {
                Value::String(s) => s,
                other => other.to_string(),
            });

        BackendHealth::Online { detail }
    }

    /// Send one prompt and normalize the reply
    pub async fn send_message(
        &self,
        prompt: &str,
        user_id: &str,
        conversation_id: Option<&str>,
    ) -> ApiResult<ChatCompletion> {
        let url = self.endpoint(&["chat"])?;
        debug!(%url, conversation = ?conversation_id, "sending chat message");

        let request = ChatRequest {
            message: prompt,
            user_id,
            conversation_id,
            session_id: conversation_id,
        };

        let response = self.client.post(url).json(&request).send().await?;
        let data = expect_success(response, "Chat request failed").await?;

        let messages = normalize_llm_payload(&data);
        if messages.is_empty() {
            warn!("chat response matched no known shape");
            return Err(ApiError::unexpected(UNEXPECTED_CHAT_RESPONSE));
        }

        let conversation_id = ["session_id", "conversation_id"]
            .iter()
            .find_map(|key| data.get(*key).and_then(Value::as_str))
            .map(str::to_string);

        Ok(ChatCompletion {
            messages,
            conversation_id,
        })
    }

    pub async fn fetch_conversations(&self, user_id: &str) -> ApiResult<Vec<ConversationSummary>> {
        let url = self.endpoint(&["sessions"])?;
        let response = self
            .client
            .get(url)
            .query(&[("user_id", user_id)])
            .send()
            .await?;
        let payload = expect_success(response, "Failed to load conversations").await?;

        let items = payload
            .as_array()
            .ok_or_else(|| ApiError::unexpected("Unexpected conversations payload"))?;

        Ok(items.iter().filter_map(normalize_conversation).collect())
    }

    pub async fn fetch_conversation_detail(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> ApiResult<ConversationDetail> {
        let url = self.endpoint(&["sessions", conversation_id])?;
        let response = self
            .client
            .get(url)
            .query(&[("user_id", user_id)])
            .send()
            .await?;
        let payload = expect_success(response, "Failed to load conversation").await?;

        Ok(normalize_conversation_detail(&payload, conversation_id))
    }

    pub async fn delete_session(&self, conversation_id: &str, user_id: &str) -> ApiResult<()> {
        let url = self.endpoint(&["sessions", conversation_id])?;
        debug!(%url, "deleting session");
        let response = self
            .client
            .delete(url)
            .query(&[("user_id", user_id)])
            .send()
            .await?;
        check_status(&response, "Failed to delete session")
    }

    pub async fn clear_sessions(&self, user_id: &str) -> ApiResult<()> {
        let url = self.endpoint(&["sessions"])?;
        debug!(%url, "clearing all sessions");
        let response = self
            .client
            .delete(url)
            .query(&[("user_id", user_id)])
            .send()
            .await?;
        check_status(&response, "Failed to clear sessions")
    }

    pub async fn fetch_admin_dashboard(&self) -> ApiResult<AdminDashboard> {
        let url = self.endpoint(&["admin", "dashboard"])?;
        let response = self.client.get(url).send().await?;
        let payload = expect_success(response, "Failed to load admin dashboard").await?;

        if !payload.is_object() {
            return Err(ApiError::unexpected("Unexpected admin dashboard payload"));
        }

        serde_json::from_value(payload).map_err(|e| {
            warn!(error = %e, "admin dashboard did not decode");
            ApiError::unexpected("Unexpected admin dashboard payload")
        })
    }

    pub async fn fetch_admin_user_conversations(
        &self,
        user_id: &str,
    ) -> ApiResult<Vec<AdminSessionSummary>> {
        let url = self.endpoint(&["admin", "conversations", user_id])?;
        let response = self.client.get(url).send().await?;
        let payload = expect_success(response, "Failed to load user conversations").await?;

        let items = payload
            .as_array()
            .ok_or_else(|| ApiError::unexpected("Unexpected user conversations payload"))?;

        Ok(items.iter().filter_map(normalize_admin_session).collect())
    }
}

fn check_status(response: &Response, context: &'static str) -> ApiResult<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        warn!(status = %response.status(), context, "backend request failed");
        Err(ApiError::status(context, response.status()))
    }
}

async fn expect_success(response: Response, context: &'static str) -> ApiResult<Value> {
    check_status(&response, context)?;
    Ok(response.json::<Value>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageBody, Role};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_build_url_joins_with_single_slash() {
        assert_eq!(build_url("http://host:8000/", "/chat"), "http://host:8000/chat");
        assert_eq!(build_url("http://host:8000", "chat"), "http://host:8000/chat");
    }

    #[test]
    fn test_resolve_health_url() {
        let base = "http://localhost:8000";
        assert_eq!(resolve_health_url(base, None), "http://localhost:8000/health");
        assert_eq!(
            resolve_health_url(base, Some("http://status.local:9000")),
            "http://status.local:9000/health"
        );
        assert_eq!(
            resolve_health_url(base, Some("/ping")),
            "http://localhost:8000/ping"
        );
        assert_eq!(resolve_health_url("not a url", Some("also bad")), "not a url/health");
    }

    #[tokio::test]
    async fn test_send_message_returns_components_and_session() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(body_json(json!({
                "message": "hello",
                "user_id": "jack",
                "conversation_id": "c-1",
                "session_id": "c-1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "session_id": "c-1",
                "data": {"components": [
                    {"type": "text", "payload": "first"},
                    {"type": "markdown", "payload": {"content": "**second**"}}
                ]}
            })))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let completion = client.send_message("hello", "jack", Some("c-1")).await.unwrap();

        assert_eq!(completion.conversation_id.as_deref(), Some("c-1"));
        assert_eq!(
            completion.messages,
            vec![
                Message::text(Role::Ai, "first"),
                Message::markdown(Role::Ai, "**second**"),
            ]
        );
    }

    #[tokio::test]
    async fn test_send_message_omits_ids_for_new_conversation() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(body_json(json!({"message": "hi", "user_id": "jack"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answer": "hello back",
                "conversation_id": "new-1"
            })))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let completion = client.send_message("hi", "jack", None).await.unwrap();

        assert_eq!(completion.conversation_id.as_deref(), Some("new-1"));
        assert_eq!(completion.messages[0].body, MessageBody::Text("hello back".to_string()));
    }

    #[tokio::test]
    async fn test_send_message_unrecognized_envelope_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let err = client.send_message("hi", "jack", None).await.unwrap_err();
        assert_eq!(err.to_string(), UNEXPECTED_CHAT_RESPONSE);
    }

    #[tokio::test]
    async fn test_send_message_http_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let err = client.send_message("hi", "jack", None).await.unwrap_err();
        assert_eq!(err.to_string(), "Chat request failed (502)");
    }

    #[tokio::test]
    async fn test_health_online_with_detail() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        assert_eq!(
            client.check_health().await,
            BackendHealth::Online {
                detail: Some("ok".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_health_non_success_is_offline() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        assert_eq!(
            client.check_health().await,
            BackendHealth::Offline {
                detail: "Health check failed with status 503".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_health_unreachable_is_offline() {
        let client = ApiClient::new("http://127.0.0.1:9");
        let health = client.check_health().await;
        assert_eq!(
            health,
            BackendHealth::Offline {
                detail: OFFLINE_DETAIL.to_string()
            }
        );
        assert!(!health.is_online());
    }

    #[tokio::test]
    async fn test_fetch_conversations_skips_invalid_entries() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/sessions"))
            .and(query_param("user_id", "jack"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"session_id": "s-1", "title": "First"},
                {"title": "no id"},
                "garbage"
            ])))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let items = client.fetch_conversations("jack").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].conversation_id, "s-1");
        assert_eq!(items[0].title, "First");
    }

    #[tokio::test]
    async fn test_fetch_conversations_rejects_non_array() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let err = client.fetch_conversations("jack").await.unwrap_err();
        assert_eq!(err.to_string(), "Unexpected conversations payload");
    }

    #[tokio::test]
    async fn test_fetch_conversation_detail() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/sessions/s-7"))
            .and(query_param("user_id", "jack"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [
                    {"role": "user", "content": "question"},
                    {"role": "assistant", "content": "*answer*", "content_type": "markdown"}
                ]
            })))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let detail = client.fetch_conversation_detail("s-7", "jack").await.unwrap();
        assert_eq!(detail.conversation_id, "s-7");
        assert_eq!(
            detail.messages,
            vec![
                Message::text(Role::User, "question"),
                Message::markdown(Role::Ai, "*answer*"),
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_and_clear_sessions() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/sessions/s-1"))
            .and(query_param("user_id", "jack"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/sessions"))
            .and(query_param("user_id", "jack"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        client.delete_session("s-1", "jack").await.unwrap();

        let err = client.clear_sessions("jack").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to clear sessions (500)");
    }

    #[tokio::test]
    async fn test_admin_dashboard_decodes_leniently() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/admin/dashboard"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_users": 2,
                "total_tokens": 900,
                "users": [{"user_id": "jack", "session_count": 3, "is_active": true}]
            })))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let dashboard = client.fetch_admin_dashboard().await.unwrap();
        assert_eq!(dashboard.total_users, 2);
        assert_eq!(dashboard.active_users, 0);
        assert_eq!(dashboard.users[0].user_id, "jack");
        assert!(dashboard.users[0].is_active);
        assert!(dashboard.users[0].sessions.is_empty());
    }

    #[tokio::test]
    async fn test_admin_dashboard_rejects_non_object() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/admin/dashboard"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2, 3])))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let err = client.fetch_admin_dashboard().await.unwrap_err();
        assert_eq!(err.to_string(), "Unexpected admin dashboard payload");
    }

    #[tokio::test]
    async fn test_admin_user_conversations_encodes_user_id() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/admin/conversations/jane%20doe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"session_id": "s-1", "title": "Taxes", "tokens_used": 40},
                {"title": "missing id"}
            ])))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let sessions = client.fetch_admin_user_conversations("jane doe").await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].tokens_used, 40);
    }
}
