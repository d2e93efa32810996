//! Collected items.

use crate::{ItemId, Platform, Scope};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Engagement counters observed at collection time.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Getters,
    Serialize,
    Deserialize,
    derive_builder::Builder,
)]
#[builder(default)]
pub struct Engagement {
    /// Likes / upvotes
    #[serde(default)]
    likes: u64,
    /// Reposts / shares
    #[serde(default)]
    reposts: u64,
    /// Replies / comments
    #[serde(default)]
    replies: u64,
}

impl Engagement {
    /// Creates a counter set.
    pub fn new(likes: u64, reposts: u64, replies: u64) -> Self {
        Self {
            likes,
            reposts,
            replies,
        }
    }

    /// Sum of all counters.
    pub fn total(&self) -> u64 {
        self.likes + self.reposts + self.replies
    }
}

/// A post or comment read from a platform. Immutable once collected.
///
/// # Examples
///
/// ```
/// use chorus_core::{ItemBuilder, Platform, Scope};
/// use chrono::Utc;
///
/// let item = ItemBuilder::default()
///     .id("1789")
///     .platform(Platform::X)
///     .source(Scope::Feed)
///     .author("rustlang")
///     .text("Rust 2024 is out")
///     .posted_at(Utc::now())
///     .build()
///     .unwrap();
/// assert_eq!(item.id().as_str(), "1789");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize, derive_builder::Builder)]
#[builder(setter(into))]
pub struct Item {
    /// Platform id
    id: ItemId,
    /// Platform the item was read from
    platform: Platform,
    /// Scope the item was collected from
    source: Scope,
    /// Author handle
    author: String,
    /// Body text
    text: String,
    /// When the item was posted
    posted_at: DateTime<Utc>,
    /// Engagement counters
    #[builder(default)]
    #[serde(default)]
    engagement: Engagement,
    /// Link to the item, when the platform exposes one
    #[builder(default)]
    #[serde(default)]
    url: Option<String>,
}

impl Item {
    /// Age of the item relative to `now`.
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.posted_at
    }
}
