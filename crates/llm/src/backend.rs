//! LLM Backend implementations
//!
//! Two wire formats are supported:
//! - Ollama native `/api/chat`
//! - OpenAI-compatible `/chat/completions` (OpenAI, Azure, vLLM, LM Studio)
//!
//! Both backends retry transport failures (network errors, 5xx, timeouts)
//! up to `max_retries` times with exponential backoff. Malformed model
//! output is never retried here; callers own that policy.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::prompt::Message;
use crate::LlmError;

/// Output constraint requested from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    /// The completion must be a single JSON object
    JsonObject,
}

/// Ollama backend configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model name/ID
    pub model: String,
    /// API endpoint
    pub endpoint: String,
    /// Completion length cap; `None` leaves the server default
    pub max_tokens: Option<usize>,
    /// Temperature
    pub temperature: f32,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
    /// Initial backoff duration (doubles each retry)
    pub initial_backoff: Duration,
    /// Keep model loaded in memory between calls ("5m", "1h", "-1", "0")
    pub keep_alive: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "qwen2.5:7b-instruct".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            max_tokens: None,
            temperature: 0.0,
            timeout: Duration::from_secs(120),
            max_retries: 0,
            initial_backoff: Duration::from_millis(500),
            keep_alive: "5m".to_string(),
        }
    }
}

/// LLM generation result
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Generated text; `None` when the service returned no content
    pub text: Option<String>,
    /// Tokens generated
    pub tokens: usize,
    /// Total generation time (ms)
    pub total_time_ms: u64,
    /// Finish reason
    pub finish_reason: FinishReason,
}

impl GenerationResult {
    /// Completed result carrying `text`
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            tokens: text.split_whitespace().count(),
            text: Some(text),
            total_time_ms: 0,
            finish_reason: FinishReason::Stop,
        }
    }

    /// Text content, treating whitespace-only completions as empty
    pub fn content(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Finish reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
}

/// LLM Backend trait
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a response under the given output constraint
    async fn generate_with_format(
        &self,
        messages: &[Message],
        format: ResponseFormat,
    ) -> Result<GenerationResult, LlmError>;

    /// Generate a free-text response
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        self.generate_with_format(messages, ResponseFormat::Text).await
    }

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Transport errors worth another attempt
fn is_retryable(error: &LlmError) -> bool {
    matches!(error, LlmError::Network(_) | LlmError::Timeout)
}

/// Record completion stats; truncation by the length cap is a warning
fn log_completion(model: &str, result: &GenerationResult) {
    if result.finish_reason == FinishReason::Length {
        tracing::warn!(model, tokens = result.tokens, "Completion truncated by max_tokens");
    } else {
        tracing::debug!(
            model,
            tokens = result.tokens,
            total_time_ms = result.total_time_ms,
            finish_reason = ?result.finish_reason,
            "Completion received"
        );
    }
}

fn classify_reqwest(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Network(err.to_string())
    }
}

/// Map a non-success HTTP status onto an error; 5xx and 429 are transient
fn status_error(status: reqwest::StatusCode, body: &str, model: &str) -> LlmError {
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        LlmError::Network(format!("HTTP {}: {}", status, body))
    } else if status == reqwest::StatusCode::NOT_FOUND {
        LlmError::ModelNotFound(model.to_string())
    } else {
        LlmError::Api(format!("HTTP {}: {}", status, body))
    }
}

/// Decode a chat response, turning HTTP failures into `LlmError`s
async fn read_response<T: DeserializeOwned>(
    response: reqwest::Response,
    model: &str,
) -> Result<T, LlmError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, &body, model));
    }

    response
        .json()
        .await
        .map_err(|e| LlmError::InvalidResponse(e.to_string()))
}

/// Run `send` until it succeeds, fails permanently, or `max_retries` extra
/// attempts are spent. The backoff doubles after every retry.
async fn send_with_retries<T, F, Fut>(
    max_retries: u32,
    initial_backoff: Duration,
    mut send: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut backoff = initial_backoff;
    let mut attempt = 0;

    loop {
        match send().await {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable(&e) && attempt < max_retries => {
                attempt += 1;
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    "LLM transport failure, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Ollama backend
#[derive(Clone)]
pub struct OllamaBackend {
    client: Client,
    config: LlmConfig,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Build the API URL
    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn build_request(&self, messages: &[Message], format: ResponseFormat) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(|m| m.into()).collect(),
            stream: false,
            format: match format {
                ResponseFormat::Text => None,
                ResponseFormat::JsonObject => Some("json".to_string()),
            },
            options: Some(OllamaOptions {
                temperature: Some(self.config.temperature),
                num_predict: self.config.max_tokens.map(|n| n as i32),
            }),
            keep_alive: Some(self.config.keep_alive.clone()),
            think: Some(false),
        }
    }

    async fn send_chat(&self, request: &OllamaChatRequest) -> Result<OllamaChatResponse, LlmError> {
        let response = self
            .client
            .post(self.api_url("/chat"))
            .json(request)
            .send()
            .await
            .map_err(classify_reqwest)?;
        read_response(response, &self.config.model).await
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn generate_with_format(
        &self,
        messages: &[Message],
        format: ResponseFormat,
    ) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();
        let request = self.build_request(messages, format);

        let response = send_with_retries(self.config.max_retries, self.config.initial_backoff, || {
            self.send_chat(&request)
        })
        .await?;

        let result = GenerationResult {
            text: Some(response.message.content),
            tokens: response.eval_count.unwrap_or(0) as usize,
            total_time_ms: start.elapsed().as_millis() as u64,
            finish_reason: match response.done_reason.as_deref() {
                Some("length") => FinishReason::Length,
                _ => FinishReason::Stop,
            },
        };
        log_completion(&self.config.model, &result);
        Ok(result)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// Ollama API types
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    /// "json" constrains output to a JSON value
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<String>,
    /// Disable extended thinking for models like qwen3/deepseek-r1
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

impl From<&Message> for OllamaMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.to_string(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    eval_count: Option<u64>,
}

// =============================================================================
// OpenAI-compatible Backend
// =============================================================================

/// Configuration for OpenAI-compatible backends
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API endpoint (OpenAI: https://api.openai.com/v1, or a local server)
    pub endpoint: String,
    /// API key
    pub api_key: String,
    /// Model name (gpt-4o, gpt-4o-mini, etc.)
    pub model: String,
    /// Completion length cap; `None` leaves the server default
    pub max_tokens: Option<usize>,
    /// Temperature (0-2)
    pub temperature: f32,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
    /// Initial backoff duration (doubles each retry)
    pub initial_backoff: Duration,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: None,
            temperature: 0.0,
            timeout: Duration::from_secs(120),
            max_retries: 0,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

/// OpenAI-compatible backend
pub struct OpenAIBackend {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIBackend {
    /// Create new OpenAI backend
    pub fn new(config: OpenAIConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() && !is_local(&config.endpoint) {
            return Err(LlmError::Configuration(
                "API key required for remote endpoints".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Get the full API URL for chat completions
    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }

    /// Build request headers
    fn build_headers(&self) -> reqwest::header::HeaderMap {
        use reqwest::header::HeaderValue;

        let mut headers = reqwest::header::HeaderMap::new();

        // Local servers accept requests without a key
        if !self.config.api_key.is_empty() {
            let auth_value = format!("Bearer {}", self.config.api_key);
            if let Ok(val) = HeaderValue::from_str(&auth_value) {
                headers.insert(reqwest::header::AUTHORIZATION, val);
            }
        }

        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        headers
    }

    fn build_request(&self, messages: &[Message], format: ResponseFormat) -> OpenAIChatRequest {
        OpenAIChatRequest {
            model: self.config.model.clone(),
            messages: messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.to_string(),
                    content: Some(m.content.clone()),
                })
                .collect(),
            max_tokens: self.config.max_tokens,
            temperature: Some(self.config.temperature),
            response_format: match format {
                ResponseFormat::Text => None,
                ResponseFormat::JsonObject => Some(OpenAIResponseFormat {
                    kind: "json_object".to_string(),
                }),
            },
        }
    }

    async fn send_chat(&self, request: &OpenAIChatRequest) -> Result<OpenAIChatResponse, LlmError> {
        let response = self
            .client
            .post(self.chat_url())
            .headers(self.build_headers())
            .json(request)
            .send()
            .await
            .map_err(classify_reqwest)?;
        read_response(response, &self.config.model).await
    }
}

fn is_local(endpoint: &str) -> bool {
    endpoint.starts_with("http://localhost") || endpoint.starts_with("http://127.0.0.1")
}

#[async_trait]
impl LlmBackend for OpenAIBackend {
    async fn generate_with_format(
        &self,
        messages: &[Message],
        format: ResponseFormat,
    ) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();
        let request = self.build_request(messages, format);

        let response = send_with_retries(self.config.max_retries, self.config.initial_backoff, || {
            self.send_chat(&request)
        })
        .await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        let result = GenerationResult {
            text: choice.message.content,
            tokens: response.usage.map(|u| u.completion_tokens).unwrap_or(0),
            total_time_ms: start.elapsed().as_millis() as u64,
            finish_reason: match choice.finish_reason.as_deref() {
                Some("length") => FinishReason::Length,
                Some("content_filter") => FinishReason::ContentFilter,
                _ => FinishReason::Stop,
            },
        };
        log_completion(&self.config.model, &result);
        Ok(result)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAIResponseFormat>,
}

#[derive(Debug, Serialize)]
struct OpenAIResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    /// Null for refusals and tool-only replies
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    completion_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::Role;

    fn openai_config(api_key: &str) -> OpenAIConfig {
        OpenAIConfig {
            api_key: api_key.to_string(),
            model: "gpt-4o".to_string(),
            ..OpenAIConfig::default()
        }
    }

    #[test]
    fn test_config_default() {
        let config = LlmConfig::default();
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.keep_alive, "5m");
    }

    #[test]
    fn test_message_conversion() {
        let msg = Message {
            role: Role::User,
            content: "Hello".to_string(),
        };
        let ollama_msg: OllamaMessage = (&msg).into();
        assert_eq!(ollama_msg.role, "user");
        assert_eq!(ollama_msg.content, "Hello");
    }

    #[test]
    fn test_ollama_json_format() {
        let backend = OllamaBackend::new(LlmConfig::default()).unwrap();

        let request = backend.build_request(&[Message::user("hi")], ResponseFormat::JsonObject);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["format"], "json");
        assert_eq!(json["think"], false);

        let request = backend.build_request(&[Message::user("hi")], ResponseFormat::Text);
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("format").is_none());
    }

    #[test]
    fn test_ollama_length_cap_only_when_set() {
        let backend = OllamaBackend::new(LlmConfig::default()).unwrap();
        let json = serde_json::to_value(backend.build_request(&[Message::user("hi")], ResponseFormat::Text)).unwrap();
        assert!(json["options"].get("num_predict").is_none());

        let backend = OllamaBackend::new(LlmConfig {
            max_tokens: Some(256),
            ..LlmConfig::default()
        })
        .unwrap();
        let json = serde_json::to_value(backend.build_request(&[Message::user("hi")], ResponseFormat::Text)).unwrap();
        assert_eq!(json["options"]["num_predict"], 256);
    }

    #[test]
    fn test_openai_backend_creation() {
        // Local endpoint should work without API key
        let config = OpenAIConfig {
            endpoint: "http://localhost:8000/v1".to_string(),
            ..OpenAIConfig::default()
        };
        let backend = OpenAIBackend::new(config).unwrap();
        assert!(backend.build_headers().get(reqwest::header::AUTHORIZATION).is_none());

        // Remote endpoint requires API key
        let config = OpenAIConfig::default();
        assert!(OpenAIBackend::new(config).is_err());

        let config = openai_config("sk-xxx");
        assert!(OpenAIBackend::new(config).is_ok());
    }

    #[test]
    fn test_openai_chat_url() {
        let config = openai_config("sk-xxx");
        let backend = OpenAIBackend::new(config).unwrap();
        assert_eq!(backend.chat_url(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(
            backend.build_headers()[reqwest::header::AUTHORIZATION],
            "Bearer sk-xxx"
        );
    }

    #[test]
    fn test_openai_json_response_format() {
        let backend = OpenAIBackend::new(openai_config("sk-xxx")).unwrap();
        let request = backend.build_request(
            &[Message::system("s"), Message::user("u")],
            ResponseFormat::JsonObject,
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["temperature"], 0.0);
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_openai_null_content_response() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null},"finish_reason":"content_filter"}]}"#;
        let response: OpenAIChatResponse = serde_json::from_str(body).unwrap();
        assert!(response.choices[0].message.content.is_none());
    }

    #[test]
    fn test_generation_result_content() {
        let result = GenerationResult {
            text: Some("   ".to_string()),
            tokens: 0,
            total_time_ms: 0,
            finish_reason: FinishReason::Stop,
        };
        assert!(result.content().is_none());
    }

    #[test]
    fn test_status_errors() {
        use reqwest::StatusCode;

        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "", "m"),
            LlmError::Network(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "", "m"),
            LlmError::Network(_)
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "", "m"),
            LlmError::ModelNotFound(m) if m == "m"
        ));
        assert!(matches!(status_error(StatusCode::BAD_REQUEST, "", "m"), LlmError::Api(_)));
    }

    #[tokio::test]
    async fn test_send_with_retries() {
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result: Result<u32, LlmError> = send_with_retries(2, Duration::ZERO, || {
            let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LlmError::Timeout)
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);

        calls.store(0, std::sync::atomic::Ordering::SeqCst);
        let result: Result<u32, LlmError> = send_with_retries(3, Duration::ZERO, || {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async { Err(LlmError::Api("400".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(LlmError::Api(_))));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(is_retryable(&LlmError::Timeout));
        assert!(is_retryable(&LlmError::Network("reset".to_string())));
        assert!(!is_retryable(&LlmError::Api("400".to_string())));
    }
}
