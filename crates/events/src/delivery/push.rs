//! Mobile push delivery through the Expo push API.
//!
//! [`PushSender`] is the seam the fan-out engine depends on; [`ExpoPushSender`]
//! is the production implementation. One logical multicast is split into
//! requests of at most [`EXPO_MAX_MESSAGES`] messages. A failed chunk counts
//! every token in it as failed and does not stop the remaining chunks.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Default Expo push endpoint.
pub const DEFAULT_EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

/// Maximum number of messages Expo accepts per request.
pub const EXPO_MAX_MESSAGES: usize = 100;

/// Default HTTP timeout for one push request.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Error detail Expo returns for a token that no longer exists.
const DEVICE_NOT_REGISTERED: &str = "DeviceNotRegistered";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for push delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The push service returned a non-2xx status code.
    #[error("Push service returned HTTP {0}")]
    HttpStatus(u16),

    /// The response did not contain one ticket per message.
    #[error("Malformed push response: {0}")]
    MalformedResponse(String),
}

// ---------------------------------------------------------------------------
// Messages and results
// ---------------------------------------------------------------------------

/// Content shared by every recipient of a multicast.
#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// Outcome of one multicast across all chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushBatchResult {
    pub success_count: usize,
    pub failure_count: usize,
    /// Every token whose delivery failed, in input order.
    pub failed_tokens: Vec<String>,
    /// Subset of `failed_tokens` the provider reported as unregistered.
    pub unregistered_tokens: Vec<String>,
}

impl PushBatchResult {
    /// Result in which every token failed.
    pub fn all_failed(tokens: &[String]) -> Self {
        Self {
            success_count: 0,
            failure_count: tokens.len(),
            failed_tokens: tokens.to_vec(),
            unregistered_tokens: Vec::new(),
        }
    }

    fn absorb(&mut self, other: PushBatchResult) {
        self.success_count += other.success_count;
        self.failure_count += other.failure_count;
        self.failed_tokens.extend(other.failed_tokens);
        self.unregistered_tokens.extend(other.unregistered_tokens);
    }
}

/// Sends one message to many device tokens.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send_multicast(
        &self,
        message: &PushMessage,
        tokens: &[String],
    ) -> Result<PushBatchResult, PushError>;
}

// ---------------------------------------------------------------------------
// PushConfig
// ---------------------------------------------------------------------------

/// Configuration for the Expo push sender.
#[derive(Debug, Clone)]
pub struct PushConfig {
    pub endpoint: String,
    /// Optional Expo access token for projects with enhanced security.
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl PushConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable            | Default                                   |
    /// |---------------------|-------------------------------------------|
    /// | `EXPO_PUSH_URL`     | `https://exp.host/--/api/v2/push/send`    |
    /// | `EXPO_ACCESS_TOKEN` | none                                      |
    /// | `PUSH_TIMEOUT_SECS` | `10`                                      |
    pub fn from_env() -> Self {
        Self {
            endpoint: std::env::var("EXPO_PUSH_URL")
                .unwrap_or_else(|_| DEFAULT_EXPO_PUSH_URL.to_string()),
            access_token: std::env::var("EXPO_ACCESS_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            timeout: Duration::from_secs(
                std::env::var("PUSH_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_EXPO_PUSH_URL.to_string(),
            access_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ExpoMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    data: &'a serde_json::Value,
    sound: &'static str,
    priority: &'static str,
}

#[derive(Debug, Deserialize)]
struct ExpoResponse {
    #[serde(default)]
    data: Vec<ExpoTicket>,
}

#[derive(Debug, Deserialize)]
struct ExpoTicket {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<ExpoTicketDetails>,
}

#[derive(Debug, Deserialize)]
struct ExpoTicketDetails {
    #[serde(default)]
    error: Option<String>,
}

// ---------------------------------------------------------------------------
// ExpoPushSender
// ---------------------------------------------------------------------------

/// Delivers push notifications through the Expo push API.
pub struct ExpoPushSender {
    client: reqwest::Client,
    config: PushConfig,
}

impl ExpoPushSender {
    pub fn new(config: PushConfig) -> Result<Self, PushError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Send one chunk and map each ticket back to its token.
    async fn send_chunk(
        &self,
        message: &PushMessage,
        tokens: &[String],
    ) -> Result<PushBatchResult, PushError> {
        let payload: Vec<ExpoMessage<'_>> = tokens
            .iter()
            .map(|to| ExpoMessage {
                to: to.as_str(),
                title: &message.title,
                body: &message.body,
                data: &message.data,
                sound: "default",
                priority: "high",
            })
            .collect();

        let mut request = self.client.post(&self.config.endpoint).json(&payload);
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(PushError::HttpStatus(response.status().as_u16()));
        }

        let parsed: ExpoResponse = response.json().await?;
        if parsed.data.len() != tokens.len() {
            return Err(PushError::MalformedResponse(format!(
                "expected {} tickets, got {}",
                tokens.len(),
                parsed.data.len()
            )));
        }

        let mut result = PushBatchResult::default();
        for (token, ticket) in tokens.iter().zip(parsed.data) {
            if ticket.status == "ok" {
                result.success_count += 1;
                continue;
            }
            let error = ticket.details.and_then(|d| d.error);
            tracing::debug!(
                token = %token,
                error = ?error,
                message = ?ticket.message,
                "Push ticket rejected",
            );
            result.failure_count += 1;
            result.failed_tokens.push(token.clone());
            if error.as_deref() == Some(DEVICE_NOT_REGISTERED) {
                result.unregistered_tokens.push(token.clone());
            }
        }
        Ok(result)
    }
}

#[async_trait]
impl PushSender for ExpoPushSender {
    async fn send_multicast(
        &self,
        message: &PushMessage,
        tokens: &[String],
    ) -> Result<PushBatchResult, PushError> {
        let mut result = PushBatchResult::default();
        for chunk in tokens.chunks(EXPO_MAX_MESSAGES) {
            match self.send_chunk(message, chunk).await {
                Ok(chunk_result) => result.absorb(chunk_result),
                Err(e) => {
                    tracing::warn!(tokens = chunk.len(), error = %e, "Push chunk failed");
                    result.absorb(PushBatchResult::all_failed(chunk));
                }
            }
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    fn message() -> PushMessage {
        PushMessage {
            title: "Rupture de stock".to_string(),
            body: "X est en rupture de stock.".to_string(),
            data: json!({ "type": "MEDICATION_STATUS", "productId": 1 }),
        }
    }

    fn sender(server: &MockServer) -> ExpoPushSender {
        ExpoPushSender::new(PushConfig {
            endpoint: format!("{}/push/send", server.uri()),
            ..PushConfig::default()
        })
        .unwrap()
    }

    fn tokens(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("ExponentPushToken[{i}]")).collect()
    }

    /// Answers every request with one `ok` ticket per message.
    struct OkPerMessage;

    impl Respond for OkPerMessage {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let messages: Vec<serde_json::Value> =
                serde_json::from_slice(&request.body).unwrap_or_default();
            let tickets: Vec<_> = messages
                .iter()
                .map(|_| json!({ "status": "ok", "id": "t" }))
                .collect();
            ResponseTemplate::new(200).set_body_json(json!({ "data": tickets }))
        }
    }

    #[tokio::test]
    async fn tickets_are_mapped_to_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/push/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "status": "ok", "id": "a" },
                    { "status": "error", "message": "gone",
                      "details": { "error": "DeviceNotRegistered" } },
                    { "status": "error", "message": "too big",
                      "details": { "error": "MessageTooBig" } },
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = sender(&server)
            .send_multicast(&message(), &tokens(3))
            .await
            .unwrap();

        assert_eq!(result.success_count, 1);
        assert_eq!(result.failure_count, 2);
        assert_eq!(result.failed_tokens, vec!["ExponentPushToken[1]", "ExponentPushToken[2]"]);
        assert_eq!(result.unregistered_tokens, vec!["ExponentPushToken[1]"]);
    }

    #[tokio::test]
    async fn large_multicast_is_chunked() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/push/send"))
            .respond_with(OkPerMessage)
            .expect(3)
            .mount(&server)
            .await;

        let result = sender(&server)
            .send_multicast(&message(), &tokens(250))
            .await
            .unwrap();

        assert_eq!(result.success_count, 250);
        assert_eq!(result.failure_count, 0);
    }

    #[tokio::test]
    async fn http_error_fails_every_token_in_the_chunk() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = sender(&server)
            .send_multicast(&message(), &tokens(2))
            .await
            .unwrap();

        assert_eq!(result.success_count, 0);
        assert_eq!(result.failure_count, 2);
        assert!(result.unregistered_tokens.is_empty());
    }

    #[tokio::test]
    async fn access_token_is_sent_as_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(OkPerMessage)
            .expect(1)
            .mount(&server)
            .await;

        let sender = ExpoPushSender::new(PushConfig {
            endpoint: format!("{}/push/send", server.uri()),
            access_token: Some("secret".to_string()),
            ..PushConfig::default()
        })
        .unwrap();
        let result = sender.send_multicast(&message(), &tokens(1)).await.unwrap();
        assert_eq!(result.success_count, 1);
    }

    #[test]
    fn push_error_display_http_status() {
        assert_eq!(
            PushError::HttpStatus(502).to_string(),
            "Push service returned HTTP 502"
        );
    }
}
