//! Remote assistant client: one long-lived Gemini chat session per process.
//!
//! The session keeps the full `contents` history and replays it on every
//! `generateContent` call, so the model sees all earlier exchanges. Only
//! successful exchanges are recorded. Any failure is absorbed into
//! [`Reply::Degraded`]; callers never see an error from `respond`.
//!
//! History grows by one exchange per answered question. Set
//! `history_limit` to cap it; the seed exchange is always kept.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::{AssistantConfig, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use crate::prompt::{enviromind_prompt, SEED_INSTRUCTION};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Answer stored and returned when the remote call fails.
pub const FALLBACK_ANSWER: &str = "Sorry, I couldn't process your request.";

// ============================================================================
// Assistant trait
// ============================================================================

/// Outcome of one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Answered(String),
    Degraded { reason: String },
}

impl Reply {
    /// Text to store and return. Degraded replies yield [`FALLBACK_ANSWER`].
    pub fn text(&self) -> &str {
        match self {
            Reply::Answered(text) => text,
            Reply::Degraded { .. } => FALLBACK_ANSWER,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Reply::Degraded { .. })
    }

    pub fn into_text(self) -> String {
        match self {
            Reply::Answered(text) => text,
            Reply::Degraded { .. } => FALLBACK_ANSWER.to_string(),
        }
    }
}

/// Abstraction over the remote generative-language service.
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Answer one user message. Never fails; failures come back as `Degraded`.
    async fn respond(&self, user_message: &str) -> Reply;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Response contained no text")]
    EmptyResponse,

    #[error("Missing API key")]
    MissingApiKey,
}

// ============================================================================
// Config
// ============================================================================

/// Gemini chat session configuration
#[derive(Debug, Clone)]
pub struct GeminiSessionConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub history_limit: Option<usize>,
}

impl GeminiSessionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            history_limit: None,
        }
    }
}

impl From<&AssistantConfig> for GeminiSessionConfig {
    fn from(c: &AssistantConfig) -> Self {
        Self {
            api_key: c.api_key.clone(),
            model: c.model.clone(),
            base_url: c.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(c.timeout_seconds),
            history_limit: c.history_limit,
        }
    }
}

// ============================================================================
// Gemini API structs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

impl Content {
    fn user(text: &str) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }

    fn model(text: &str) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: &'a [Content],
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// Session history
// ============================================================================

#[derive(Debug, Default)]
struct History {
    contents: Vec<Content>,
    /// Leading entries that belong to the seed exchange and are never evicted.
    pinned: usize,
}

impl History {
    /// Put the seed exchange in front of whatever has been recorded so far.
    fn pin_seed(&mut self, user: Content, model: Content) {
        self.contents.insert(0, model);
        self.contents.insert(0, user);
        self.pinned += 2;
    }

    fn record_exchange(&mut self, user: Content, model: Content, limit: Option<usize>) {
        self.contents.push(user);
        self.contents.push(model);

        if let Some(limit) = limit {
            let exchanges = (self.contents.len() - self.pinned) / 2;
            if exchanges > limit {
                let excess = (exchanges - limit) * 2;
                self.contents.drain(self.pinned..self.pinned + excess);
            }
        }
    }
}

// ============================================================================
// GeminiChatSession
// ============================================================================

/// A single conversational session against the Gemini `generateContent` API.
pub struct GeminiChatSession {
    client: Client,
    config: GeminiSessionConfig,
    history: Mutex<History>,
}

impl GeminiChatSession {
    pub fn new(config: GeminiSessionConfig) -> Result<Self, AssistantError> {
        if config.api_key.trim().is_empty() {
            return Err(AssistantError::MissingApiKey);
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            config,
            history: Mutex::new(History::default()),
        })
    }

    /// Send the fixed instruction message as the opening exchange.
    pub async fn seed(&self) -> Result<(), AssistantError> {
        let user = Content::user(SEED_INSTRUCTION);
        let reply = self.send(&[], &user).await?;

        self.history
            .lock()
            .await
            .pin_seed(user, Content::model(&reply));
        tracing::info!(model = %self.config.model, "Gemini chat session seeded");
        Ok(())
    }

    /// Number of entries currently held in the session history.
    pub async fn history_len(&self) -> usize {
        self.history.lock().await.contents.len()
    }

    /// Snapshot of the session history.
    pub async fn history(&self) -> Vec<Content> {
        self.history.lock().await.contents.clone()
    }

    /// One raw exchange: send the message through the session and record it.
    ///
    /// The lock is never held across the remote call. Concurrent exchanges each
    /// see the history as of their snapshot and append in completion order.
    pub async fn send_message(&self, message: &str) -> Result<String, AssistantError> {
        let snapshot = self.history.lock().await.contents.clone();
        let user = Content::user(message);
        let reply = self.send(&snapshot, &user).await?;

        let mut history = self.history.lock().await;
        history.record_exchange(user, Content::model(&reply), self.config.history_limit);
        tracing::debug!(history_len = history.contents.len(), "Gemini exchange recorded");
        Ok(reply)
    }

    async fn send(&self, history: &[Content], user: &Content) -> Result<String, AssistantError> {
        // Key goes in a header: reqwest errors print the URL.
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );

        let mut contents = Vec::with_capacity(history.len() + 1);
        contents.extend_from_slice(history);
        contents.push(user.clone());

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&GenerateRequest {
                contents: &contents,
            })
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Gemini API error");

            return Err(AssistantError::Api { code, message });
        }

        let body: GenerateResponse = response.json().await?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AssistantError::EmptyResponse);
        }

        Ok(text)
    }
}

#[async_trait]
impl Assistant for GeminiChatSession {
    async fn respond(&self, user_message: &str) -> Reply {
        match self.send_message(&enviromind_prompt(user_message)).await {
            Ok(text) => Reply::Answered(text),
            Err(e) => {
                tracing::warn!(error = %e, "Gemini request failed, answering with fallback");
                Reply::Degraded {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const MODEL_PATH: &str = "/models/gemini-1.5-flash:generateContent";

    fn test_config(base_url: String) -> GeminiSessionConfig {
        GeminiSessionConfig {
            base_url,
            timeout: Duration::from_secs(5),
            ..GeminiSessionConfig::new("test-api-key")
        }
    }

    fn text_response(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
    }

    fn sent_contents(req: &Request) -> Vec<Content> {
        let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        serde_json::from_value(body["contents"].clone()).unwrap()
    }

    #[test]
    fn test_reply_text_uses_fallback_when_degraded() {
        let degraded = Reply::Degraded {
            reason: "quota".to_string(),
        };
        assert_eq!(degraded.text(), FALLBACK_ANSWER);
        assert!(degraded.is_degraded());

        let answered = Reply::Answered("Composting turns waste into soil.".to_string());
        assert_eq!(answered.text(), "Composting turns waste into soil.");
        assert!(!answered.is_degraded());
    }

    #[test]
    fn test_new_fails_with_missing_api_key() {
        let result = GeminiChatSession::new(GeminiSessionConfig::new(""));
        assert!(matches!(result, Err(AssistantError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_respond_wraps_prompt_and_returns_text() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(header("x-goog-api-key", "test-api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("Composting is...")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let session = GeminiChatSession::new(test_config(mock_server.uri())).unwrap();
        let reply = session.respond("What is composting?").await;

        assert_eq!(reply, Reply::Answered("Composting is...".to_string()));

        let requests = mock_server.received_requests().await.unwrap();
        assert!(requests[0].url.query().is_none());
        let contents = sent_contents(&requests[0]);
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].role, "user");
        assert!(contents[0].parts[0].text.contains("You are EnviroMind"));
        assert!(contents[0].parts[0].text.contains("What is composting?"));
    }

    #[tokio::test]
    async fn test_history_accumulates_across_calls() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("ok")))
            .mount(&mock_server)
            .await;

        let session = GeminiChatSession::new(test_config(mock_server.uri())).unwrap();
        session.seed().await.unwrap();
        session.respond("first").await;
        session.respond("second").await;

        assert_eq!(session.history_len().await, 6);

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);
        let last = sent_contents(&requests[2]);
        assert_eq!(last.len(), 5, "seed + first exchange + new user turn");
        assert_eq!(last[0].parts[0].text, SEED_INSTRUCTION);
        assert_eq!(last[1].role, "model");
        assert!(last[4].parts[0].text.contains("second"));
    }

    #[tokio::test]
    async fn test_failure_degrades_and_leaves_history_untouched() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "code": 429, "message": "Resource has been exhausted" }
            })))
            .mount(&mock_server)
            .await;

        let session = GeminiChatSession::new(test_config(mock_server.uri())).unwrap();
        let reply = session.respond("What is composting?").await;

        match &reply {
            Reply::Degraded { reason } => assert!(reason.contains("429")),
            other => panic!("Expected Degraded, got {:?}", other),
        }
        assert_eq!(reply.text(), FALLBACK_ANSWER);
        assert_eq!(session.history_len().await, 0);
    }

    #[tokio::test]
    async fn test_malformed_response_degrades() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": []
            })))
            .mount(&mock_server)
            .await;

        let session = GeminiChatSession::new(test_config(mock_server.uri())).unwrap();
        assert!(session.respond("hello").await.is_degraded());

        let err = session.send_message("hello").await.unwrap_err();
        assert!(matches!(err, AssistantError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_unreachable_service_degrades() {
        // Nothing listens on the discard port.
        let session =
            GeminiChatSession::new(test_config("http://127.0.0.1:9".to_string())).unwrap();
        let reply = session.respond("hello").await;
        assert!(reply.is_degraded());
        assert_eq!(reply.into_text(), FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn test_degraded_reason_never_contains_api_key() {
        let config = GeminiSessionConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(5),
            ..GeminiSessionConfig::new("SECRET-API-KEY-123")
        };
        let session = GeminiChatSession::new(config).unwrap();

        match session.respond("hi").await {
            Reply::Degraded { reason } => {
                assert!(!reason.contains("SECRET-API-KEY-123"), "leaked: {}", reason)
            }
            other => panic!("Expected Degraded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_requests_do_not_wait_on_each_other() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(text_response("ok"))
                    .set_delay(Duration::from_millis(600)),
            )
            .mount(&mock_server)
            .await;

        let session = GeminiChatSession::new(test_config(mock_server.uri())).unwrap();

        let started = std::time::Instant::now();
        let (a, b, c) = tokio::join!(
            session.respond("solar"),
            session.respond("wind"),
            session.respond("hydro"),
        );
        let elapsed = started.elapsed();

        assert!(!a.is_degraded() && !b.is_degraded() && !c.is_degraded());
        // Three calls in sequence would take 1.8s.
        assert!(elapsed < Duration::from_millis(1500), "took {:?}", elapsed);

        // Each exchange lands as an intact user/model pair.
        let history = session.history().await;
        assert_eq!(history.len(), 6);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, "user");
            assert_eq!(pair[1].role, "model");
        }
    }

    #[test]
    fn test_seed_stays_first_when_an_exchange_finishes_before_it() {
        let mut history = History::default();
        history.record_exchange(Content::user("early"), Content::model("ok"), None);
        history.pin_seed(Content::user(SEED_INSTRUCTION), Content::model("ready"));
        history.record_exchange(Content::user("later"), Content::model("ok"), Some(1));

        assert_eq!(history.contents.len(), 4);
        assert_eq!(history.contents[0].parts[0].text, SEED_INSTRUCTION);
        assert_eq!(history.contents[2].parts[0].text, "later");
    }

    #[tokio::test]
    async fn test_history_limit_evicts_oldest_but_keeps_seed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("ok")))
            .mount(&mock_server)
            .await;

        let config = GeminiSessionConfig {
            history_limit: Some(2),
            ..test_config(mock_server.uri())
        };
        let session = GeminiChatSession::new(config).unwrap();
        session.seed().await.unwrap();
        for q in ["one", "two", "three"] {
            session.respond(q).await;
        }

        let history = session.history().await;
        assert_eq!(history.len(), 2 + 2 * 2);
        assert_eq!(history[0].parts[0].text, SEED_INSTRUCTION);
        assert!(history[2].parts[0].text.contains("two"));
        assert!(history[4].parts[0].text.contains("three"));
    }

    #[test]
    fn test_config_from_assistant_config_trims_base_url() {
        let c = AssistantConfig {
            api_key: "k".to_string(),
            model: "gemini-1.5-pro".to_string(),
            base_url: "http://localhost:1234/v1beta/".to_string(),
            timeout_seconds: 7,
            history_limit: Some(3),
        };
        let session_config = GeminiSessionConfig::from(&c);
        assert_eq!(session_config.base_url, "http://localhost:1234/v1beta");
        assert_eq!(session_config.timeout, Duration::from_secs(7));
        assert_eq!(session_config.history_limit, Some(3));
    }
}
