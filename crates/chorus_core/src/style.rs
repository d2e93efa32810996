//! Writing-style fingerprints.

use crate::AccountId;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const VOCABULARY_SIZE: usize = 12;
const EXAMPLE_COUNT: usize = 5;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "that", "this", "with", "you", "your", "are", "was", "but", "not",
    "have", "has", "just", "its", "it's", "from", "they", "them", "what", "when", "will",
    "would", "there", "their", "about", "been", "were", "can", "all", "our", "out", "who",
    "how", "than", "then", "too", "very", "into", "more", "some", "also", "because",
];

/// Tone markers detected in an account's writing.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum ToneCue {
    /// Mostly lowercase openings
    #[display("writes casually, often starting in lowercase")]
    Casual,
    /// Frequent exclamation marks
    #[display("is enthusiastic and uses exclamation marks")]
    Enthusiastic,
    /// Frequently asks questions
    #[display("often asks questions back")]
    Inquisitive,
    /// Uses emoji
    #[display("uses emoji")]
    Emoji,
    /// Uses hashtags
    #[display("uses hashtags")]
    Hashtags,
    /// Short messages
    #[display("keeps replies short")]
    Terse,
    /// Long messages
    #[display("writes long, detailed replies")]
    Expansive,
}

/// Cached summary of how an account writes.
///
/// # Examples
///
/// ```
/// use chorus_core::{AccountId, StyleFingerprint, ToneCue};
/// use chrono::Utc;
///
/// let samples = vec![
///     "love this! compilers are fun".to_string(),
///     "great thread! compilers never get old".to_string(),
/// ];
/// let fp = StyleFingerprint::derive(AccountId::new("main"), &samples, Utc::now(), 0);
/// assert!(fp.tone().contains(&ToneCue::Enthusiastic));
/// assert!(fp.vocabulary().contains(&"compilers".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct StyleFingerprint {
    /// Account the fingerprint describes
    account: AccountId,
    /// Mean length in characters
    avg_length: usize,
    /// Longest sample in characters
    max_length: usize,
    /// Characteristic words, most frequent first
    vocabulary: Vec<String>,
    /// Tone markers
    tone: Vec<ToneCue>,
    /// A few of the account's own texts
    examples: Vec<String>,
    /// Number of samples the fingerprint was built from
    sample_count: usize,
    /// When the fingerprint was computed
    computed_at: DateTime<Utc>,
    /// Published counter at computation time
    published_mark: u64,
}

impl StyleFingerprint {
    /// Build a fingerprint from an account's own texts.
    pub fn derive(
        account: AccountId,
        samples: &[String],
        now: DateTime<Utc>,
        published_mark: u64,
    ) -> Self {
        let samples: Vec<&str> = samples
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        let lengths: Vec<usize> = samples.iter().map(|s| s.chars().count()).collect();
        let avg_length = if lengths.is_empty() {
            0
        } else {
            lengths.iter().sum::<usize>() / lengths.len()
        };
        let max_length = lengths.iter().copied().max().unwrap_or(0);

        Self {
            account,
            avg_length,
            max_length,
            vocabulary: vocabulary(&samples),
            tone: tone(&samples, avg_length),
            examples: samples
                .iter()
                .rev()
                .take(EXAMPLE_COUNT)
                .map(|s| s.to_string())
                .collect(),
            sample_count: samples.len(),
            computed_at: now,
            published_mark,
        }
    }

    /// Returns true if the fingerprint carries no information.
    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    /// Prompt lines describing the style.
    pub fn prompt_cues(&self) -> Vec<String> {
        if self.is_empty() {
            return Vec::new();
        }
        let mut cues = vec![format!(
            "Typical length is about {} characters.",
            self.avg_length
        )];
        for cue in &self.tone {
            cues.push(format!("The author {}.", cue));
        }
        if !self.vocabulary.is_empty() {
            cues.push(format!(
                "Words the author favours: {}.",
                self.vocabulary.join(", ")
            ));
        }
        cues
    }
}

fn vocabulary(samples: &[&str]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for sample in samples {
        for word in sample.split_whitespace() {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_lowercase();
            if word.chars().count() < 3 || STOPWORDS.contains(&word.as_str()) {
                continue;
            }
            if word.starts_with("http") || word.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            *counts.entry(word).or_default() += 1;
        }
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(VOCABULARY_SIZE)
        .map(|(word, _)| word)
        .collect()
}

fn tone(samples: &[&str], avg_length: usize) -> Vec<ToneCue> {
    if samples.is_empty() {
        return Vec::new();
    }
    let mut cues = Vec::new();
    if share(samples, |s| s.chars().next().is_some_and(|c| c.is_lowercase())) >= 0.5 {
        cues.push(ToneCue::Casual);
    }
    if share(samples, |s| s.contains('!')) >= 0.3 {
        cues.push(ToneCue::Enthusiastic);
    }
    if share(samples, |s| s.contains('?')) >= 0.3 {
        cues.push(ToneCue::Inquisitive);
    }
    if share(samples, |s| s.chars().any(is_emoji)) >= 0.2 {
        cues.push(ToneCue::Emoji);
    }
    if share(samples, |s| s.split_whitespace().any(|w| w.starts_with('#') && w.len() > 1)) >= 0.2 {
        cues.push(ToneCue::Hashtags);
    }
    if avg_length < 60 {
        cues.push(ToneCue::Terse);
    } else if avg_length > 200 {
        cues.push(ToneCue::Expansive);
    }
    cues
}

fn share(samples: &[&str], pred: impl Fn(&str) -> bool) -> f64 {
    samples.iter().filter(|s| pred(s)).count() as f64 / samples.len() as f64
}

fn is_emoji(c: char) -> bool {
    matches!(c as u32, 0x1F300..=0x1FAFF | 0x2600..=0x27BF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_samples_yield_empty_fingerprint() {
        let fp = StyleFingerprint::derive(AccountId::new("a"), &[], Utc::now(), 0);
        assert!(fp.is_empty());
        assert!(fp.prompt_cues().is_empty());
    }

    #[test]
    fn test_vocabulary_skips_stopwords_and_links() {
        let samples = vec![
            "the borrow checker and the borrow checker https://example.com".to_string(),
            "borrow all the things".to_string(),
        ];
        let fp = StyleFingerprint::derive(AccountId::new("a"), &samples, Utc::now(), 0);
        assert_eq!(fp.vocabulary()[0], "borrow");
        assert!(!fp.vocabulary().contains(&"the".to_string()));
        assert!(!fp.vocabulary().iter().any(|w| w.starts_with("http")));
    }

    #[test]
    fn test_examples_keep_most_recent() {
        let samples: Vec<String> = (0..8).map(|i| format!("sample number {}", i)).collect();
        let fp = StyleFingerprint::derive(AccountId::new("a"), &samples, Utc::now(), 3);
        assert_eq!(fp.examples().len(), EXAMPLE_COUNT);
        assert_eq!(fp.examples()[0], "sample number 7");
        assert_eq!(*fp.published_mark(), 3);
    }

    #[test]
    fn test_terse_and_casual_cues() {
        let samples = vec!["lol yes".to_string(), "same here".to_string()];
        let fp = StyleFingerprint::derive(AccountId::new("a"), &samples, Utc::now(), 0);
        assert!(fp.tone().contains(&ToneCue::Casual));
        assert!(fp.tone().contains(&ToneCue::Terse));
    }
}
