//! Supported platforms.

use serde::{Deserialize, Serialize};

/// Platforms the pipeline can engage on.
///
/// # Examples
///
/// ```
/// use chorus_core::Platform;
/// use std::str::FromStr;
///
/// assert_eq!(Platform::from_str("x").unwrap(), Platform::X);
/// assert_eq!(Platform::X.max_text_chars(), 280);
/// ```
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
    strum::EnumIter,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Platform {
    /// X (formerly Twitter)
    #[display("x")]
    X,
    /// YouTube comments
    #[display("youtube")]
    #[serde(rename = "youtube")]
    #[strum(serialize = "youtube")]
    YouTube,
    /// Reddit
    #[display("reddit")]
    Reddit,
}

impl Platform {
    /// Longest text the platform accepts for a reply or post.
    pub fn max_text_chars(&self) -> usize {
        match self {
            Platform::X => 280,
            Platform::YouTube => 10_000,
            Platform::Reddit => 10_000,
        }
    }
}
