//! OpenAI-compatible LLM client implementation
//!
//! Provides an async HTTP client for chat completions with:
//! - Bounded request timeouts
//! - Rate limit handling with exponential backoff
//! - Status-code mapped error reporting

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::types::{ChatRequest, ChatResponse, CompletionParams, LlmResponse, Message};

/// Default API base URL (OpenAI-compatible)
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Maximum number of retry attempts for rate-limited requests
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (in milliseconds)
const BACKOFF_BASE_MS: u64 = 1000;

/// One-shot chat completion capability
///
/// Implemented by [`LlmClient`] for production use; tests substitute
/// scripted implementations.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    /// Send messages to the model and return its response
    async fn complete(&self, messages: Vec<Message>, params: CompletionParams)
    -> Result<LlmResponse>;
}

/// OpenAI-compatible LLM client
///
/// Thread-safe client for making one-shot chat completion requests.
/// Requests are bounded by the configured timeout; 429 responses are
/// retried with exponential backoff.
#[derive(Clone)]
pub struct LlmClient {
    /// HTTP client for making requests
    http_client: HttpClient,
    /// LLM configuration (model, temperature, etc.)
    config: LlmConfig,
    /// API key for authentication
    api_key: String,
    /// Base URL for the API
    base_url: String,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.base_url)
            .field("default_model", &self.config.default_model)
            .finish()
    }
}

/// Builder for creating an LlmClient
pub struct LlmClientBuilder {
    config: Option<LlmConfig>,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl Default for LlmClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: None,
            api_key: None,
            base_url: None,
            timeout_secs: None,
        }
    }

    /// Set the LLM configuration
    pub fn config(mut self, config: LlmConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the API key
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL (defaults to the OpenAI API)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Build the LlmClient
    pub fn build(self) -> Result<LlmClient> {
        let config = self.config.unwrap_or_else(|| crate::config::Config::default().llm);
        let api_key = self
            .api_key
            .ok_or_else(|| Error::LlmError("API key is required".to_string()))?;

        let timeout_secs = self.timeout_secs.unwrap_or(config.timeout_secs);

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        let base_url = self
            .base_url
            .or_else(|| config.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(LlmClient {
            http_client,
            config,
            api_key,
            base_url,
        })
    }
}

impl LlmClient {
    /// Create a new LlmClient with the given configuration and API key
    pub fn new(config: LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        LlmClientBuilder::new()
            .config(config)
            .api_key(api_key)
            .build()
    }

    /// Create a new builder for LlmClient
    pub fn builder() -> LlmClientBuilder {
        LlmClientBuilder::new()
    }

    /// Get the default model from configuration
    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    /// Execute a chat request with retry logic
    async fn execute_request(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.send_request(request).await {
                Ok(response) => return Ok(response),
                Err(Error::RateLimited(wait_secs)) if attempts < MAX_RETRY_ATTEMPTS => {
                    let backoff = calculate_backoff(attempts, wait_secs);
                    warn!(
                        attempt = attempts,
                        wait_ms = backoff,
                        "Rate limited, retrying after backoff"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send a single request to the API
    async fn send_request(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();

        if !status.is_success() {
            return self.handle_error_response(status, response).await;
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::LlmError(format!("Failed to parse response: {}", e)))?;

        LlmResponse::from_chat_response(chat_response)
            .ok_or_else(|| Error::LlmError("Empty response from API".to_string()))
    }

    /// Handle error responses from the API
    async fn handle_error_response<T>(
        &self,
        status: reqwest::StatusCode,
        response: reqwest::Response,
    ) -> Result<T> {
        let body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 => Err(Error::LlmError(
                "Unauthorized: Invalid API key. Set CURIO_API_KEY or OPENAI_API_KEY environment variable.".to_string(),
            )),
            429 => {
                // Try to extract retry-after from the response body
                let wait_secs = extract_retry_after(&body).unwrap_or(60);
                Err(Error::RateLimited(wait_secs))
            }
            400 => Err(Error::LlmError(format!("Bad request: {}", body))),
            402 => Err(Error::LlmError(
                "Payment required: Insufficient credits on the API account".to_string(),
            )),
            403 => Err(Error::LlmError(format!("Forbidden: {}", body))),
            404 => Err(Error::LlmError(format!(
                "Model not found or endpoint unavailable: {}",
                body
            ))),
            500..=599 => Err(Error::LlmError(format!(
                "Server error ({}): {}",
                status, body
            ))),
            _ => Err(Error::LlmError(format!("HTTP error {}: {}", status, body))),
        }
    }
}

#[async_trait]
impl ChatCompleter for LlmClient {
    async fn complete(
        &self,
        messages: Vec<Message>,
        params: CompletionParams,
    ) -> Result<LlmResponse> {
        let request = ChatRequest::new(&self.config.default_model, messages)
            .with_temperature(params.temperature.unwrap_or(self.config.temperature))
            .with_max_tokens(params.max_tokens.unwrap_or(self.config.max_tokens));

        self.execute_request(&request).await
    }
}

/// Calculate backoff delay with jitter
fn calculate_backoff(attempt: u32, suggested_wait: u64) -> u64 {
    let base = BACKOFF_BASE_MS * 2u64.pow(attempt - 1);
    let max_wait = suggested_wait * 1000; // Convert to ms

    // Use the larger of calculated backoff or suggested wait
    let delay = base.max(max_wait);

    // Add some jitter (10% random variation)
    let jitter = delay / 10;
    delay + (rand_jitter() % jitter.max(1))
}

/// Generate a pseudo-random jitter value
fn rand_jitter() -> u64 {
    use std::time::SystemTime;
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64 % 1000)
        .unwrap_or(0)
}

/// Extract retry-after value from error response
fn extract_retry_after(body: &str) -> Option<u64> {
    // Try to parse as JSON and extract retry_after field
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(retry_after) = json.get("retry_after").and_then(|v| v.as_u64()) {
            return Some(retry_after);
        }
        if let Some(error) = json.get("error")
            && let Some(retry_after) = error.get("retry_after").and_then(|v| v.as_u64())
        {
            return Some(retry_after);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> LlmConfig {
        LlmConfig {
            api_key: None,
            base_url: None,
            default_model: "test/model".to_string(),
            temperature: 0.3,
            max_tokens: 1000,
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_client_builder() {
        let client = LlmClient::builder()
            .config(test_config())
            .api_key("test-key")
            .base_url("https://example.com/v1")
            .timeout_secs(60)
            .build()
            .unwrap();

        assert_eq!(client.default_model(), "test/model");
        assert_eq!(client.base_url, "https://example.com/v1");
    }

    #[test]
    fn test_client_builder_requires_api_key() {
        let result = LlmClient::builder().config(test_config()).build();

        assert!(result.is_err());
    }

    #[test]
    fn test_base_url_from_config() {
        let mut config = test_config();
        config.base_url = Some("https://proxy.internal/v1".to_string());

        let client = LlmClient::new(config, "test-key").unwrap();
        assert_eq!(client.base_url, "https://proxy.internal/v1");
    }

    #[test]
    fn test_client_debug() {
        let client = LlmClient::new(test_config(), "test-key").unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("LlmClient"));
        assert!(debug.contains("test/model"));
        assert!(!debug.contains("test-key"));
    }

    #[test]
    fn test_client_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LlmClient>();
    }

    #[test]
    fn test_calculate_backoff() {
        let backoff1 = calculate_backoff(1, 0);
        assert!(backoff1 >= BACKOFF_BASE_MS);

        let backoff2 = calculate_backoff(2, 0);
        assert!(backoff2 >= BACKOFF_BASE_MS * 2);

        // With suggested wait
        let backoff_with_wait = calculate_backoff(1, 5);
        assert!(backoff_with_wait >= 5000); // At least 5 seconds
    }

    #[test]
    fn test_extract_retry_after() {
        let body = r#"{"retry_after": 30}"#;
        assert_eq!(extract_retry_after(body), Some(30));

        let body = r#"{"error": {"retry_after": 60}}"#;
        assert_eq!(extract_retry_after(body), Some(60));

        let body = r#"{"message": "rate limited"}"#;
        assert_eq!(extract_retry_after(body), None);
    }
}
