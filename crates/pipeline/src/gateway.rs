//! Generative-model gateway.
//!
//! [`LlmGateway`] is the seam every stage calls through. [`GeminiGateway`]
//! talks to the Gemini REST API; tests substitute scripted fakes. The
//! gateway is constructed once from [`LlmConfig`] and injected, never read
//! from process-global state.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::orchestrator::truncate_chars;

/// Upstream error bodies are kept to this many characters.
const MAX_ERROR_BODY_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// Trait and errors
// ---------------------------------------------------------------------------

/// Errors from a single generation call.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No API key was supplied.
    #[error("Generative AI model is not configured")]
    Unconfigured,

    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-2xx status code.
    #[error("LLM API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The call succeeded but produced no text.
    #[error("Received an empty or invalid response from the AI model")]
    EmptyResponse,
}

/// Accepts a prompt and returns generated text.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError>;

    /// Whether a real model sits behind this gateway.
    fn is_configured(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// Bounded, fixed-delay retry around a single generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Call `gateway` up to `policy.max_attempts` times, sleeping between
/// attempts. Returns the last error once attempts run out.
///
/// An unconfigured gateway fails immediately; retrying cannot help it.
pub async fn generate_with_retry(
    gateway: &dyn LlmGateway,
    prompt: &str,
    policy: &RetryPolicy,
) -> Result<String, GatewayError> {
    if !gateway.is_configured() {
        return Err(GatewayError::Unconfigured);
    }

    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = match gateway.generate(prompt).await {
            Ok(text) if text.trim().is_empty() => Err(GatewayError::EmptyResponse),
            other => other,
        };
        match result {
            Ok(text) => return Ok(text),
            Err(GatewayError::Unconfigured) => return Err(GatewayError::Unconfigured),
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                tracing::warn!(
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "AI generation attempt failed",
                );
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Default model name.
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro-latest";

/// Default REST base URL.
pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Settings for [`GeminiGateway`], loaded from the environment.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// `None` leaves the gateway unconfigured.
    pub api_key: Option<String>,
    pub model: String,
    pub api_url: String,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(120),
            retry: RetryPolicy::default(),
        }
    }
}

impl LlmConfig {
    /// Load from environment variables.
    ///
    /// | Env var                    | Default                        |
    /// |----------------------------|--------------------------------|
    /// | `GEMINI_API_KEY`           | unset (gateway unconfigured)   |
    /// | `GEMINI_MODEL`             | `gemini-1.5-pro-latest`        |
    /// | `GEMINI_API_URL`           | Google v1beta endpoint         |
    /// | `LLM_REQUEST_TIMEOUT_SECS` | `120`                          |
    /// | `LLM_MAX_ATTEMPTS`         | `3`                            |
    /// | `LLM_RETRY_DELAY_SECS`     | `5`                            |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let env_u64 = |key: &str, default: u64| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        };

        Self {
            api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            model: std::env::var("GEMINI_MODEL").unwrap_or(defaults.model),
            api_url: std::env::var("GEMINI_API_URL").unwrap_or(defaults.api_url),
            request_timeout: Duration::from_secs(env_u64(
                "LLM_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
            retry: RetryPolicy {
                max_attempts: env_u64("LLM_MAX_ATTEMPTS", defaults.retry.max_attempts.into())
                    as u32,
                delay: Duration::from_secs(env_u64(
                    "LLM_RETRY_DELAY_SECS",
                    defaults.retry.delay.as_secs(),
                )),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

/// HTTP client for the Gemini `generateContent` endpoint.
pub struct GeminiGateway {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiGateway {
    pub fn new(config: &LlmConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: &LlmConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_url, self.model)
    }

    /// Concatenate the text parts of the first candidate.
    fn extract_text(response: GenerateResponse) -> Option<String> {
        let content = response.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[async_trait]
impl LlmGateway for GeminiGateway {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        let api_key = self.api_key.as_deref().ok_or(GatewayError::Unconfigured)?;

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body: truncate_chars(&body, MAX_ERROR_BODY_CHARS),
            });
        }

        let parsed = response.json::<GenerateResponse>().await?;
        Self::extract_text(parsed).ok_or(GatewayError::EmptyResponse)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
