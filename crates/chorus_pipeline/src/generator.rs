//! Reply generation.

use async_trait::async_trait;
use chorus_core::{AccountId, Draft, Item, ModeKind, StyleFingerprint};
use chorus_error::{GenerationError, GenerationErrorKind};
use chorus_rate_limit::RetryPolicy;
use chrono::Utc;
use derive_getters::Getters;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

const EXAMPLE_CHARS: usize = 280;

/// A single completion request to the AI backend.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct CompletionRequest {
    /// Full prompt text
    prompt: String,
    /// Longest acceptable answer in characters
    max_chars: usize,
    /// Sampling temperature
    temperature: f32,
}

impl CompletionRequest {
    /// Creates a request.
    pub fn new(prompt: impl Into<String>, max_chars: usize, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            max_chars,
            temperature,
        }
    }
}

/// AI text backend.
///
/// Content-policy refusals are reported as
/// [`GenerationErrorKind::Rejected`]; transport and quota problems as
/// [`GenerationErrorKind::Backend`].
#[async_trait]
pub trait ReplyBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Complete `request`.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError>;
}

/// Generation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSettings {
    /// Per-call timeout
    pub timeout: Duration,
    /// Sampling temperature
    pub temperature: f32,
    /// Item text beyond this many characters is cut from the prompt
    pub max_item_chars: usize,
    /// Account-specific instructions placed at the top of the prompt
    pub custom_prompt: Option<String>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            temperature: 0.9,
            max_item_chars: 1000,
            custom_prompt: None,
        }
    }
}

/// Turns an item plus a style fingerprint into a draft reply.
///
/// Holds no per-item state; every call builds its own bounded prompt.
#[derive(Clone)]
pub struct Generator {
    backend: Arc<dyn ReplyBackend>,
    settings: GeneratorSettings,
    retry: RetryPolicy,
}

impl Generator {
    /// Generator calling `backend`.
    pub fn new(backend: Arc<dyn ReplyBackend>, settings: GeneratorSettings, retry: RetryPolicy) -> Self {
        Self {
            backend,
            settings,
            retry,
        }
    }

    /// Generate a draft reply to `item` on behalf of `account`.
    ///
    /// Timeouts and backend failures are retried with backoff.
    ///
    /// # Errors
    ///
    /// - [`GenerationErrorKind::Timeout`] / [`GenerationErrorKind::Backend`]
    ///   once retries are exhausted
    /// - [`GenerationErrorKind::Rejected`] if the backend refuses or returns
    ///   nothing usable
    #[instrument(skip(self, item, fingerprint), fields(account = %account, item = %item.id(), backend = self.backend.name()))]
    pub async fn generate(
        &self,
        account: &AccountId,
        item: &Item,
        fingerprint: &StyleFingerprint,
        mode: ModeKind,
    ) -> Result<Draft, GenerationError> {
        let max_chars = item.platform().max_text_chars();
        let request = CompletionRequest::new(
            self.prompt(item, fingerprint, max_chars),
            max_chars,
            self.settings.temperature,
        );
        let timeout = self.settings.timeout;
        let backend = self.backend.as_ref();
        let request = &request;

        let raw = self
            .retry
            .run(|| async move {
                match tokio::time::timeout(timeout, backend.complete(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(GenerationError::new(GenerationErrorKind::Timeout(
                        timeout.as_secs(),
                    ))),
                }
            })
            .await?;

        let text = clean_reply(&raw, max_chars);
        if text.is_empty() {
            return Err(GenerationError::new(GenerationErrorKind::Rejected(
                "backend returned no usable text".into(),
            )));
        }
        debug!(chars = text.chars().count(), "Generated reply");

        let style_version = (!fingerprint.is_empty()).then(|| *fingerprint.computed_at());
        Ok(Draft::new(
            account.clone(),
            item.clone(),
            text,
            style_version,
            mode,
            Utc::now(),
        ))
    }

    /// Build the prompt for `item`.
    pub fn prompt(&self, item: &Item, fingerprint: &StyleFingerprint, max_chars: usize) -> String {
        let mut prompt = String::new();
        match &self.settings.custom_prompt {
            Some(custom) => prompt.push_str(custom.trim()),
            None => prompt.push_str(&format!(
                "You are replying on {} as the account owner. Be genuine, specific and brief.",
                item.platform()
            )),
        }
        prompt.push_str("\n\n");

        let cues = fingerprint.prompt_cues();
        if !cues.is_empty() {
            prompt.push_str("Match the owner's writing style:\n");
            for cue in cues {
                prompt.push_str(&format!("- {}\n", cue));
            }
            prompt.push('\n');
        }
        if !fingerprint.examples().is_empty() {
            prompt.push_str("Examples of the owner's own writing:\n");
            for example in fingerprint.examples() {
                prompt.push_str(&format!("- \"{}\"\n", truncate_chars(example, EXAMPLE_CHARS)));
            }
            prompt.push('\n');
        }

        let engagement = item.engagement();
        prompt.push_str(&format!(
            "Post by @{} ({} likes, {} reposts, {} replies):\n\"\"\"\n{}\n\"\"\"\n\n",
            item.author(),
            engagement.likes(),
            engagement.reposts(),
            engagement.replies(),
            truncate_chars(item.text().trim(), self.settings.max_item_chars),
        ));
        prompt.push_str(&format!(
            "Generate exactly ONE reply of at most {} characters. \
             Output only the reply text, with no quotes or explanations.\n\n\
             Reply:",
            max_chars
        ));
        prompt
    }
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("backend", &self.backend.name())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Normalize backend output into a publishable reply.
///
/// Trims whitespace, strips wrapping quotes and a leading `Reply:` label,
/// drops characters outside the Basic Multilingual Plane (automation drivers
/// cannot type them) and bounds the result to `max_chars`.
pub fn clean_reply(raw: &str, max_chars: usize) -> String {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("Reply:") {
        text = rest.trim();
    }
    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”'), ('‘', '’')] {
        if text.len() > 1 && text.starts_with(open) && text.ends_with(close) {
            text = text[open.len_utf8()..text.len() - close.len_utf8()].trim();
        }
    }
    let filtered: String = text.chars().filter(|c| (*c as u32) <= 0xFFFF).collect();
    let filtered = filtered.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&filtered, max_chars).trim_end().to_string()
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_reply_strips_quotes_and_label() {
        assert_eq!(clean_reply("  \"great point\"  ", 280), "great point");
        assert_eq!(clean_reply("Reply: “so true”", 280), "so true");
    }

    #[test]
    fn test_clean_reply_drops_astral_characters() {
        assert_eq!(clean_reply("nice 🚀 work", 280), "nice work");
        assert_eq!(clean_reply("café ✓", 280), "café ✓");
    }

    #[test]
    fn test_clean_reply_bounds_length() {
        let long = "word ".repeat(100);
        let cleaned = clean_reply(&long, 280);
        assert!(cleaned.chars().count() <= 280);
        assert!(!cleaned.ends_with(' '));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
