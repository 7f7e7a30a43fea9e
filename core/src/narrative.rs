//! External narrative generator.
//!
//! The generator is an unreliable dependency: the pipeline calls it at most
//! once per request, never retries, and only parses the structure of what
//! comes back. Tests inject fakes through the `NarrativeGenerator` trait.

use crate::config::NarrativeConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NarrativeError {
    #[error("narrative generator is not configured")]
    NotConfigured,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited by narrative provider")]
    RateLimited,

    #[error("narrative quota exhausted")]
    QuotaExhausted,

    #[error("unexpected HTTP status {status}")]
    Http { status: u16 },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl NarrativeError {
    /// Whether a caller re-triggering the request may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, NarrativeError::NotConfigured)
    }
}

/// A two-part prompt: fixed instructions plus the evidence payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NarrativePrompt {
    pub system: String,
    pub user: String,
}

/// The contract every narrative backend fulfils.
pub trait NarrativeGenerator: Send {
    /// Returns the raw text content produced for `prompt`.
    fn generate(&self, prompt: &NarrativePrompt) -> Result<String, NarrativeError>;
}

// ── Unconfigured backend ─────────────────────────────────────────────────────

/// Used when no API key is available. Every call fails with `NotConfigured`.
pub struct UnconfiguredNarrative;

impl NarrativeGenerator for UnconfiguredNarrative {
    fn generate(&self, _prompt: &NarrativePrompt) -> Result<String, NarrativeError> {
        Err(NarrativeError::NotConfigured)
    }
}

// ── HTTP backend ─────────────────────────────────────────────────────────────

/// Chat-completions style HTTP client with a bounded timeout.
pub struct HttpNarrative {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl HttpNarrative {
    pub fn new(config: &NarrativeConfig, api_key: String) -> Result<Self, NarrativeError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NarrativeError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Build from config, reading the key from the configured environment
    /// variable. Falls back to `UnconfiguredNarrative` when it is unset.
    pub fn from_env(config: &NarrativeConfig) -> Box<dyn NarrativeGenerator> {
        match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => match HttpNarrative::new(config, key) {
                Ok(http) => Box::new(http),
                Err(e) => {
                    log::warn!("narrative client unavailable: {e}");
                    Box::new(UnconfiguredNarrative)
                }
            },
            _ => {
                log::warn!(
                    "{} not set; advisory text and reports are disabled",
                    config.api_key_env
                );
                Box::new(UnconfiguredNarrative)
            }
        }
    }
}

impl NarrativeGenerator for HttpNarrative {
    fn generate(&self, prompt: &NarrativePrompt) -> Result<String, NarrativeError> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user",   "content": prompt.user },
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    NarrativeError::Timeout
                } else {
                    NarrativeError::Transport(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        match status {
            200..=299 => {}
            402 => return Err(NarrativeError::QuotaExhausted),
            429 => return Err(NarrativeError::RateLimited),
            _ => return Err(NarrativeError::Http { status }),
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| NarrativeError::Malformed(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| NarrativeError::Malformed("response has no content".into()))
    }
}

// ── Response parsing ─────────────────────────────────────────────────────────

/// Slice out the JSON value in `raw`, tolerating code fences and prose
/// around it. `open`/`close` select an array (`[`/`]`) or object (`{`/`}`).
pub fn extract_json(raw: &str, open: char, close: char) -> Option<&str> {
    let start = raw.find(open)?;
    let end = raw.rfind(close)?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Parse `raw` as `T`, extracting the embedded JSON first.
pub fn parse_structured<T: serde::de::DeserializeOwned>(
    raw: &str,
    open: char,
    close: char,
) -> Result<T, NarrativeError> {
    let slice = extract_json(raw, open, close)
        .ok_or_else(|| NarrativeError::Malformed("no JSON found in response".into()))?;
    serde_json::from_str(slice).map_err(|e| NarrativeError::Malformed(e.to_string()))
}
