use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{ChatParams, LlmProvider, Message};
use crate::retry::{RetryPolicy, with_retry};

const PLACEHOLDER_KEY: &str = "YOUR_API_KEY_HERE";

/// Client for any endpoint speaking the OpenAI chat-completions protocol.
///
/// Each call is a POST to the full `endpoint` URL, bounded by the retry
/// policy's per-attempt timeout and retried with a constant delay on network
/// failures, non-200 statuses and unparsable bodies.
pub struct CompatibleProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    provider_name: String,
    retry: RetryPolicy,
}

impl fmt::Debug for CompatibleProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompatibleProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("provider_name", &self.provider_name)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Clone for CompatibleProvider {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            endpoint: self.endpoint.clone(),
            provider_name: self.provider_name.clone(),
            retry: self.retry,
        }
    }
}

impl CompatibleProvider {
    /// # Errors
    ///
    /// Returns `LlmError::NetworkFailure` if the HTTP client cannot be built.
    pub fn new(
        provider_name: impl Into<String>,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        retry: RetryPolicy,
    ) -> Result<Self, LlmError> {
        let provider_name = provider_name.into();
        let api_key = api_key.into();
        if api_key.trim().is_empty() || api_key == PLACEHOLDER_KEY {
            tracing::warn!("{provider_name} API key is not configured");
        }
        Ok(Self {
            client: crate::http::default_client()?,
            api_key,
            endpoint: endpoint.into(),
            provider_name,
            retry,
        })
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty() && self.api_key != PLACEHOLDER_KEY
    }

    async fn send_once(
        &self,
        body: &ChatRequest<'_>,
        attempt: u32,
    ) -> Result<serde_json::Value, LlmError> {
        tracing::debug!(
            provider = %self.provider_name,
            attempt,
            model = body.model,
            messages = body.messages.len(),
            max_tokens = body.max_tokens,
            "sending chat request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .timeout(self.retry.timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status != reqwest::StatusCode::OK {
            tracing::error!("{} API error {status}: {text}", self.provider_name);
            return Err(LlmError::HttpError(status.as_u16()));
        }

        serde_json::from_str(&text)
            .map_err(|e| LlmError::MalformedResponse(format!("response body is not JSON: {e}")))
    }
}

impl LlmProvider for CompatibleProvider {
    async fn chat(&self, messages: &[Message], params: &ChatParams) -> Result<String, LlmError> {
        if !self.has_key() {
            return Err(LlmError::AuthError(format!(
                "no API key configured for {}",
                self.provider_name
            )));
        }

        let body = ChatRequest {
            model: &params.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.capped_max_tokens(),
            top_p: params.top_p,
            frequency_penalty: params.frequency_penalty,
            presence_penalty: params.presence_penalty,
            stop: None,
            n: 1,
        };

        let value = with_retry(&self.provider_name, &self.retry, |attempt| {
            self.send_once(&body, attempt)
        })
        .await
        .map_err(|e| match e {
            LlmError::HttpError(status @ (401 | 403)) => {
                LlmError::AuthError(format!("endpoint rejected credentials (status {status})"))
            }
            other => other,
        })?;

        extract_content(value)
    }

    fn name(&self) -> &str {
        &self.provider_name
    }
}

/// Pull `choices[0].message.content` out of a successful response.
fn extract_content(value: serde_json::Value) -> Result<String, LlmError> {
    let resp: ChatResponse = serde_json::from_value(value)
        .map_err(|e| LlmError::MalformedResponse(format!("unexpected response shape: {e}")))?;

    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| {
            LlmError::MalformedResponse("missing choices[0].message.content".into())
        })
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
    stop: Option<&'a str>,
    n: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            delay: Duration::ZERO,
            timeout: Duration::from_secs(5),
        }
    }

    fn provider_for(server: &MockServer, max_retries: u32) -> CompatibleProvider {
        CompatibleProvider::new(
            "test",
            "sk-test",
            format!("{}/v1/chat/completions", server.uri()),
            fast_retry(max_retries),
        )
        .unwrap()
    }

    fn messages() -> Vec<Message> {
        vec![Message::system("be brief"), Message::user("hello")]
    }

    fn ok_body(content: &str) -> serde_json::Value {
        json!({
            "id": "cmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
        })
    }

    #[tokio::test]
    async fn chat_returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("hi there")))
            .expect(1)
            .mount(&server)
            .await;

        let answer = provider_for(&server, 3)
            .chat(&messages(), &ChatParams::default())
            .await
            .unwrap();
        assert_eq!(answer, "hi there");
    }

    #[tokio::test]
    async fn request_body_carries_wire_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "model": "m-1",
                "max_tokens": 4096,
                "stop": null,
                "n": 1,
                "messages": [
                    { "role": "system", "content": "be brief" },
                    { "role": "user", "content": "hello" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let params = ChatParams {
            model: "m-1".into(),
            max_tokens: 9000,
            ..ChatParams::default()
        };
        let answer = provider_for(&server, 1).chat(&messages(), &params).await;
        assert_eq!(answer.unwrap(), "ok");
    }

    #[tokio::test]
    async fn persistent_500_is_attempted_exactly_max_retries_times() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .expect(3)
            .mount(&server)
            .await;

        let result = provider_for(&server, 3)
            .chat(&messages(), &ChatParams::default())
            .await;
        assert!(
            matches!(result, Err(LlmError::HttpError(500))),
            "expected HttpError(500), got: {result:?}"
        );
    }

    #[tokio::test]
    async fn recovers_after_one_failed_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("second time")))
            .expect(1)
            .mount(&server)
            .await;

        let answer = provider_for(&server, 3)
            .chat(&messages(), &ChatParams::default())
            .await
            .unwrap();
        assert_eq!(answer, "second time");
    }

    #[tokio::test]
    async fn unparsable_body_is_retried_then_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .expect(2)
            .mount(&server)
            .await;

        let result = provider_for(&server, 2)
            .chat(&messages(), &ChatParams::default())
            .await;
        assert!(matches!(result, Err(LlmError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn missing_content_is_malformed_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let result = provider_for(&server, 3)
            .chat(&messages(), &ChatParams::default())
            .await;
        assert!(matches!(result, Err(LlmError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn unauthorized_surfaces_as_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let result = provider_for(&server, 2)
            .chat(&messages(), &ChatParams::default())
            .await;
        assert!(matches!(result, Err(LlmError::AuthError(_))));
    }

    #[tokio::test]
    async fn missing_key_fails_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("unused")))
            .expect(0)
            .mount(&server)
            .await;

        let provider = CompatibleProvider::new(
            "test",
            "",
            format!("{}/v1/chat/completions", server.uri()),
            fast_retry(3),
        )
        .unwrap();
        let result = provider.chat(&messages(), &ChatParams::default()).await;
        assert!(matches!(result, Err(LlmError::AuthError(_))));
    }

    #[tokio::test]
    async fn slow_response_times_out_as_network_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(ok_body("late"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let provider = CompatibleProvider::new(
            "test",
            "sk-test",
            format!("{}/v1/chat/completions", server.uri()),
            RetryPolicy {
                max_retries: 1,
                delay: Duration::ZERO,
                timeout: Duration::from_millis(50),
            },
        )
        .unwrap();
        let result = provider.chat(&messages(), &ChatParams::default()).await;
        assert!(matches!(result, Err(LlmError::NetworkFailure(_))));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_failure() {
        let provider =
            CompatibleProvider::new("test", "sk-test", "http://127.0.0.1:1/v1", fast_retry(2))
                .unwrap();
        let result = provider.chat(&messages(), &ChatParams::default()).await;
        assert!(matches!(result, Err(LlmError::NetworkFailure(_))));
    }

    #[test]
    fn debug_redacts_api_key() {
        let provider =
            CompatibleProvider::new("groq", "sk-secret", "http://localhost", fast_retry(1))
                .unwrap();
        let debug = format!("{provider:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn clone_preserves_name_and_endpoint() {
        let provider =
            CompatibleProvider::new("groq", "k", "http://localhost/x", fast_retry(1)).unwrap();
        let cloned = provider.clone();
        assert_eq!(cloned.name(), "groq");
        assert_eq!(cloned.endpoint(), "http://localhost/x");
    }

    #[test]
    fn extract_content_rejects_null_content() {
        let value = json!({ "choices": [{ "message": { "content": null } }] });
        assert!(matches!(
            extract_content(value),
            Err(LlmError::MalformedResponse(_))
        ));
    }
}
