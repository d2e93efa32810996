//! Gemini `generateContent` backend with a rotating key pool.

use crate::{CompletionRequest, ReplyBackend};
use async_trait::async_trait;
use chorus_error::{GenerationError, GenerationErrorKind};
use chorus_rate_limit::RequestThrottle;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const QUOTA_PATTERN: &str =
    r"(?i)\b429\b|rate limit|quota|Resource has been exhausted|Too Many Requests";

/// Default cooldown for a key that hit its quota.
pub const KEY_COOLDOWN: Duration = Duration::from_secs(70);

/// Round-robin pool of API keys with per-key cooldown.
#[derive(Debug)]
pub struct KeyPool {
    keys: Vec<String>,
    state: parking_lot::Mutex<PoolState>,
}

#[derive(Debug, Default)]
struct PoolState {
    next: usize,
    cooling: HashMap<usize, Instant>,
}

impl KeyPool {
    /// Pool over `keys`, ignoring blanks.
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            keys: keys
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            state: parking_lot::Mutex::new(PoolState::default()),
        }
    }

    /// Pool from a comma-separated list.
    pub fn from_csv(csv: &str) -> Self {
        Self::new(csv.split(',').map(String::from))
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if the pool holds no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Next key not on cooldown, as `(index, key)`.
    pub fn next_key(&self) -> Option<(usize, &str)> {
        self.next_key_at(Instant::now())
    }

    fn next_key_at(&self, now: Instant) -> Option<(usize, &str)> {
        let mut state = self.state.lock();
        state.cooling.retain(|_, until| *until > now);
        for _ in 0..self.keys.len() {
            let index = state.next % self.keys.len();
            state.next = (index + 1) % self.keys.len();
            if !state.cooling.contains_key(&index) {
                return Some((index, self.keys[index].as_str()));
            }
        }
        None
    }

    /// Take key `index` out of rotation for `duration`.
    pub fn cool_down(&self, index: usize, duration: Duration) {
        let until = Instant::now() + duration.max(Duration::from_secs(1));
        self.state.lock().cooling.insert(index, until);
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Google Gemini backend.
///
/// Each call takes the next key from the [`KeyPool`], waits on that key's
/// RPM throttle, and puts the key on cooldown when the API reports quota
/// exhaustion.
#[derive(Debug)]
pub struct GeminiBackend {
    client: Client,
    model: String,
    keys: KeyPool,
    throttle: RequestThrottle,
    quota: Regex,
}

impl GeminiBackend {
    /// Backend for `model` over `keys`, allowing `rpm` requests per minute
    /// per key.
    ///
    /// # Errors
    ///
    /// [`GenerationErrorKind::NoCredentials`] if `keys` is empty.
    pub fn new(keys: KeyPool, model: impl Into<String>, rpm: u32) -> Result<Self, GenerationError> {
        if keys.is_empty() {
            return Err(GenerationError::new(GenerationErrorKind::NoCredentials(
                "no Gemini API keys configured".into(),
            )));
        }
        let quota = Regex::new(QUOTA_PATTERN)
            .map_err(|e| GenerationError::new(GenerationErrorKind::Backend(e.to_string())))?;
        debug!(keys = keys.len(), rpm, "Creating Gemini backend");
        Ok(Self {
            client: Client::new(),
            model: model.into(),
            keys,
            throttle: RequestThrottle::per_minute(rpm),
            quota,
        })
    }

    /// Backend with keys read from the comma-separated environment variable
    /// `var`.
    ///
    /// # Errors
    ///
    /// [`GenerationErrorKind::NoCredentials`] if the variable is unset or
    /// empty.
    pub fn from_env(var: &str, model: impl Into<String>, rpm: u32) -> Result<Self, GenerationError> {
        let csv = std::env::var(var).map_err(|_| {
            GenerationError::new(GenerationErrorKind::NoCredentials(format!(
                "{} is not set",
                var
            )))
        })?;
        Self::new(KeyPool::from_csv(&csv), model, rpm)
    }

    fn classify_failure(&self, index: usize, status: StatusCode, body: &str) -> GenerationError {
        if status == StatusCode::TOO_MANY_REQUESTS || self.quota.is_match(body) {
            warn!(key = index, "Gemini key hit its quota, cooling down");
            self.keys.cool_down(index, KEY_COOLDOWN);
            return GenerationError::new(GenerationErrorKind::Backend(format!(
                "quota exhausted ({})",
                status
            )));
        }
        if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            return GenerationError::new(GenerationErrorKind::Backend(format!(
                "{}: {}",
                status, body
            )));
        }
        GenerationError::new(GenerationErrorKind::Rejected(format!("{}: {}", status, body)))
    }
}

#[async_trait]
impl ReplyBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self, request), fields(model = %self.model, prompt_chars = request.prompt().len()))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let (index, key) = self.keys.next_key().ok_or_else(|| {
            GenerationError::new(GenerationErrorKind::Backend(
                "every Gemini key is cooling down".into(),
            ))
        })?;
        self.throttle.until_ready(key).await;

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart {
                    text: request.prompt(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: *request.temperature(),
                max_output_tokens: (*request.max_chars() as u32 / 2).max(128),
            },
        };

        let response = self
            .client
            .post(format!("{}/{}:generateContent", API_BASE, self.model))
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Failed to reach Gemini");
                GenerationError::new(GenerationErrorKind::Backend(format!(
                    "request failed: {}",
                    e
                )))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.classify_failure(index, status, &text));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            GenerationError::new(GenerationErrorKind::Backend(format!(
                "unreadable response: {}",
                e
            )))
        })?;

        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(GenerationError::new(GenerationErrorKind::Rejected(format!(
                "prompt blocked: {}",
                reason
            ))));
        }
        let Some(candidate) = parsed.candidates.into_iter().next() else {
            return Err(GenerationError::new(GenerationErrorKind::Rejected(
                "no candidates returned".into(),
            )));
        };
        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(GenerationError::new(GenerationErrorKind::Rejected(
                "candidate blocked for safety".into(),
            )));
        }
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        debug!(chars = text.len(), "Gemini returned candidate");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_rotates_keys() {
        let pool = KeyPool::from_csv("a, b ,,c");
        assert_eq!(pool.len(), 3);
        let picked: Vec<usize> = (0..4).filter_map(|_| pool.next_key().map(|(i, _)| i)).collect();
        assert_eq!(picked, vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_pool_skips_cooling_keys() {
        let pool = KeyPool::from_csv("a,b");
        pool.cool_down(0, Duration::from_secs(60));
        assert_eq!(pool.next_key().map(|(_, k)| k), Some("b"));
        assert_eq!(pool.next_key().map(|(_, k)| k), Some("b"));
        pool.cool_down(1, Duration::from_secs(60));
        assert!(pool.next_key().is_none());
    }

    #[test]
    fn test_cooldown_expires() {
        let pool = KeyPool::from_csv("a");
        pool.cool_down(0, Duration::from_secs(1));
        assert!(pool.next_key_at(Instant::now() + Duration::from_secs(2)).is_some());
    }

    #[test]
    fn test_quota_errors_are_transient_and_cool_the_key() {
        use chorus_error::Classify;

        let backend = GeminiBackend::new(KeyPool::from_csv("a,b"), "gemini-2.5-flash-lite", 60).unwrap();
        let err = backend.classify_failure(
            0,
            StatusCode::FORBIDDEN,
            "Resource has been exhausted (e.g. check quota).",
        );
        assert!(err.is_retryable());
        assert_eq!(backend.keys.next_key().map(|(i, _)| i), Some(1));

        let err = backend.classify_failure(1, StatusCode::BAD_REQUEST, "invalid argument");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_empty_pool_is_rejected() {
        let err = GeminiBackend::new(KeyPool::from_csv(""), "m", 60).unwrap_err();
        assert!(matches!(err.kind, GenerationErrorKind::NoCredentials(_)));
    }
}
