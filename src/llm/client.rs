use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default endpoint root (OpenAI-compatible, GLM)
pub const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4/";
/// Default model
pub const DEFAULT_MODEL: &str = "glm-4.5";

/// Words that mark a line of reasoning as carrying the final answer
const ANSWER_MARKERS: [&str; 4] = ["修正", "应该是", "正确的", "改为"];

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]*)""#).expect("valid regex"));

/// Failures at the remote correction boundary
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Transport or connection error
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout
    #[error("request timed out")]
    Timeout,

    /// HTTP 429
    #[error("rate limited by the correction service")]
    RateLimited,

    /// Any other non-success status
    #[error("correction service error: {status} - {body}")]
    Status { status: u16, body: String },

    /// The body was not the expected JSON envelope
    #[error("failed to parse service response: {0}")]
    Parse(String),

    /// Success envelope without usable text
    #[error("correction service returned no content")]
    EmptyResponse,
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else {
            ServiceError::Request(e.to_string())
        }
    }
}

/// The remote correction capability: a prompt and a token budget in,
/// text out.
#[async_trait]
pub trait CorrectionService: Send + Sync {
    async fn call(&self, prompt: &str, max_tokens: u32) -> Result<String, ServiceError>;
}

/// Configuration for the GLM chat-completions client
#[derive(Debug, Clone)]
pub struct GlmConfig {
    /// API key (from GLM_API_KEY env var)
    pub api_key: String,
    /// Endpoint root, `chat/completions` is appended
    pub base_url: String,
    pub model: String,
    /// Temperature (0-1, lower = more deterministic)
    pub temperature: f64,
    pub top_p: f64,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl GlmConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GLM_API_KEY")
            .context("GLM_API_KEY environment variable not set")?;

        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("GLM_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(model) = std::env::var("GLM_MODEL") {
            config.model = model;
        }
        if let Ok(timeout) = std::env::var("GLM_TIMEOUT_SECS") {
            config.timeout_secs = timeout
                .parse()
                .with_context(|| format!("Invalid GLM_TIMEOUT_SECS: {}", timeout))?;
        }

        Ok(config)
    }

    /// Create with default settings
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            top_p: 0.9,
            timeout_secs: 30,
        }
    }

    /// `{base_url}chat/completions`, tolerating a missing trailing slash
    pub fn endpoint(&self) -> String {
        if self.base_url.ends_with('/') {
            format!("{}chat/completions", self.base_url)
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }

    /// Key with the middle elided, for logs
    pub fn masked_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() <= 12 {
            return "***".to_string();
        }
        let head: String = chars[..8].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

/// OpenAI-compatible chat-completions client
pub struct GlmClient {
    client: Client,
    config: GlmConfig,
}

impl GlmClient {
    pub fn new(config: GlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GlmConfig {
        &self.config
    }
}

#[async_trait]
impl CorrectionService for GlmClient {
    async fn call(&self, prompt: &str, max_tokens: u32) -> Result<String, ServiceError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            stream: false,
        };

        let response = self
            .client
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ServiceError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let content = extract_content(&body)?;
        if content.is_empty() {
            return Err(ServiceError::EmptyResponse);
        }
        Ok(content)
    }
}

/// Pull the answer text out of a chat-completions body.
///
/// Falls back to `reasoning_content` when `content` is empty.
pub fn extract_content(body: &str) -> Result<String, ServiceError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| ServiceError::Parse(e.to_string()))?;

    let Some(message) = response.choices.into_iter().next().map(|c| c.message) else {
        return Ok(String::new());
    };

    let content = message.content.unwrap_or_default().trim().to_string();
    if !content.is_empty() {
        return Ok(content);
    }

    let reasoning = message.reasoning_content.unwrap_or_default();
    Ok(extract_answer_from_reasoning(reasoning.trim()))
}

/// Scan reasoning for a line that announces a correction and take the last
/// quoted span, or else the text after the last colon.
pub fn extract_answer_from_reasoning(reasoning: &str) -> String {
    for line in reasoning.lines().map(str::trim) {
        if !ANSWER_MARKERS.iter().any(|m| line.contains(m)) {
            continue;
        }

        if let Some(quoted) = QUOTED.captures_iter(line).last() {
            return quoted[1].to_string();
        }

        for colon in ['：', ':'] {
            if let Some((_, after)) = line.rsplit_once(colon) {
                return after.trim().to_string();
            }
        }
    }

    String::new()
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: ResponseMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}
