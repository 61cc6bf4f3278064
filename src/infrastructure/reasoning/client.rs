//! HTTP client for the reasoning service.
//!
//! Speaks the Anthropic messages protocol: the phase instructions travel as
//! the system prompt and the transcript window as the message list. Transient
//! faults (429, 5xx, overload, timeouts, network errors) are retried with
//! exponential backoff; whatever error escapes this client is final and
//! aborts the session.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

use crate::domain::errors::ReasoningError;
use crate::domain::models::{ReasoningConfig, RetryConfig, Role, Turn};
use crate::domain::ports::ReasoningService;
use crate::infrastructure::reasoning::retry::RetryPolicy;
use crate::infrastructure::reasoning::types::{Message, MessageRequest, MessageResponse};

/// Reqwest-backed reasoning service client.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl AnthropicClient {
    /// Build a client from configuration and a resolved API key.
    pub fn from_config(
        reasoning: &ReasoningConfig,
        retry: &RetryConfig,
        api_key: String,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(reasoning.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key,
            base_url: reasoning.base_url.trim_end_matches('/').to_string(),
            model: reasoning.model.clone(),
            max_tokens: reasoning.max_tokens,
            retry: RetryPolicy::from_config(retry),
        })
    }

    async fn send_request(&self, request: &MessageRequest) -> Result<MessageResponse, ReasoningError> {
        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(request)
            .send()
            .await
            .map_err(classify_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(classify_status(status, body));
        }

        response
            .json::<MessageResponse>()
            .await
            .map_err(|err| ReasoningError::MalformedReply(err.to_string()))
    }
}

fn classify_reqwest(err: reqwest::Error) -> ReasoningError {
    if err.is_timeout() {
        ReasoningError::Timeout
    } else {
        ReasoningError::Network(err.to_string())
    }
}

fn classify_status(status: StatusCode, body: String) -> ReasoningError {
    match status.as_u16() {
        400 => ReasoningError::InvalidRequest(body),
        401 | 403 => ReasoningError::AuthenticationFailed(body),
        429 => ReasoningError::RateLimitExceeded,
        529 => ReasoningError::Overloaded,
        code if (500..600).contains(&code) => ReasoningError::ServerError(body),
        code => ReasoningError::InvalidRequest(format!("HTTP {code}: {body}")),
    }
}

fn to_messages(transcript: &[Turn]) -> Vec<Message> {
    transcript
        .iter()
        .map(|turn| Message {
            role: match turn.role {
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: turn.content.clone(),
        })
        .collect()
}

#[async_trait]
impl ReasoningService for AnthropicClient {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn next_turn(
        &self,
        instructions: &str,
        transcript: &[Turn],
    ) -> Result<String, ReasoningError> {
        let request = MessageRequest {
            model: self.model.clone(),
            messages: to_messages(transcript),
            max_tokens: self.max_tokens,
            system: Some(instructions.to_string()),
        };

        debug!(
            model = %self.model,
            turns = request.messages.len(),
            "requesting next turn"
        );

        let response = self.retry.execute(|| self.send_request(&request)).await?;
        let text = response.into_text();
        if text.trim().is_empty() {
            return Err(ReasoningError::MalformedReply(
                "reply contained no text content".to_string(),
            ));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(url: &str, max_retries: u32) -> AnthropicClient {
        let reasoning = ReasoningConfig {
            base_url: url.to_string(),
            ..ReasoningConfig::default()
        };
        let retry = RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        };
        AnthropicClient::from_config(&reasoning, &retry, "test-key".to_string()).unwrap()
    }

    fn transcript() -> Vec<Turn> {
        vec![Turn::user("hello")]
    }

    #[tokio::test]
    async fn test_successful_reply_concatenates_text_blocks() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .with_status(200)
            .with_body(r#"{"content":[{"type":"text","text":"What dataset"},{"type":"text","text":" are you using?"}]}"#)
            .create_async()
            .await;

        let client = client_for(&server.url(), 0);
        let reply = client.next_turn("plan", &transcript()).await.unwrap();
        assert_eq!(reply, "What dataset are you using?");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_until_exhaustion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .with_status(500)
            .with_body("internal")
            .expect(3)
            .create_async()
            .await;

        let client = client_for(&server.url(), 2);
        let err = client.next_turn("plan", &transcript()).await.unwrap_err();
        assert!(matches!(err, ReasoningError::ServerError(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .with_status(401)
            .with_body("invalid key")
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server.url(), 3);
        let err = client.next_turn("plan", &transcript()).await.unwrap_err();
        assert!(matches!(err, ReasoningError::AuthenticationFailed(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_reply_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(r#"{"content":[]}"#)
            .create_async()
            .await;

        let client = client_for(&server.url(), 0);
        let err = client.next_turn("plan", &transcript()).await.unwrap_err();
        assert!(matches!(err, ReasoningError::MalformedReply(_)));
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            ReasoningError::RateLimitExceeded
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, String::new()),
            ReasoningError::ServerError(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, String::new()),
            ReasoningError::InvalidRequest(_)
        ));
    }
}
