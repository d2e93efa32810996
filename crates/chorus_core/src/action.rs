//! Platform actions and schedule entries.

use crate::{AccountId, DraftId, ItemId, Platform};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action types that consume a rate budget.
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
#[strum(serialize_all = "snake_case")]
pub enum ActionKind {
    /// Reply to an item
    #[display("reply")]
    Reply,
    /// Like an item
    #[display("like")]
    Like,
    /// Repost an item
    #[display("repost")]
    Repost,
    /// Follow an account
    #[display("follow")]
    Follow,
    /// Standalone post
    #[display("post")]
    Post,
    /// Read a scope (collection pass)
    #[display("scrape")]
    Scrape,
}

/// What the publisher should do.
///
/// # Examples
///
/// ```
/// use chorus_core::{ActionDescriptor, ActionKind, ItemId};
///
/// let like = ActionDescriptor::like(ItemId::new("99"));
/// assert_eq!(*like.kind(), ActionKind::Like);
/// assert!(like.text().is_none());
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Getters, Serialize, Deserialize, derive_builder::Builder,
)]
#[builder(setter(into))]
pub struct ActionDescriptor {
    /// Action type
    kind: ActionKind,
    /// Item acted upon (replies, likes, reposts)
    #[builder(default)]
    #[serde(default)]
    target: Option<ItemId>,
    /// Account acted upon (follows)
    #[builder(default)]
    #[serde(default)]
    handle: Option<String>,
    /// Text payload (replies, posts)
    #[builder(default)]
    #[serde(default)]
    text: Option<String>,
    /// Draft the action publishes
    #[builder(default)]
    #[serde(default)]
    draft: Option<DraftId>,
}

impl ActionDescriptor {
    /// Reply to `target` with `text`, publishing `draft`.
    pub fn reply(target: ItemId, text: impl Into<String>, draft: DraftId) -> Self {
        Self {
            kind: ActionKind::Reply,
            target: Some(target),
            handle: None,
            text: Some(text.into()),
            draft: Some(draft),
        }
    }

    /// Like `target`.
    pub fn like(target: ItemId) -> Self {
        Self {
            kind: ActionKind::Like,
            target: Some(target),
            handle: None,
            text: None,
            draft: None,
        }
    }

    /// Follow `handle`.
    pub fn follow(handle: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Follow,
            target: None,
            handle: Some(handle.into()),
            text: None,
            draft: None,
        }
    }
}

/// A timed action waiting to fire.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Unique entry id
    id: Uuid,
    /// Account that performs the action
    account: AccountId,
    /// Platform of the account
    platform: Platform,
    /// Earliest time the action may fire
    target_time: DateTime<Utc>,
    /// The action
    action: ActionDescriptor,
    /// Posting time of the item the action responds to
    #[serde(default)]
    source_posted_at: Option<DateTime<Utc>>,
    /// Failed or deferred attempts so far
    #[serde(default)]
    attempts: u32,
    /// Set while a publisher call is executing
    #[serde(default)]
    in_flight: bool,
    /// When the entry was created
    created_at: DateTime<Utc>,
}

impl ScheduleEntry {
    /// Creates an entry.
    pub fn new(
        account: AccountId,
        platform: Platform,
        target_time: DateTime<Utc>,
        action: ActionDescriptor,
        source_posted_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account,
            platform,
            target_time,
            action,
            source_posted_at,
            attempts: 0,
            in_flight: false,
            created_at: now,
        }
    }

    /// Draft published by this entry, if any.
    pub fn draft(&self) -> Option<&DraftId> {
        self.action.draft.as_ref()
    }

    /// Returns true once `now` has reached the target time.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.target_time <= now
    }

    /// Flag the entry as executing.
    pub fn set_in_flight(&mut self, in_flight: bool) {
        self.in_flight = in_flight;
    }

    /// Move the entry to a new target time without counting an attempt.
    pub fn defer(&mut self, target_time: DateTime<Utc>) {
        self.target_time = target_time;
        self.in_flight = false;
    }

    /// Move the entry to a new target time, counting the attempt.
    pub fn push_back(&mut self, target_time: DateTime<Utc>) {
        self.target_time = target_time;
        self.attempts += 1;
        self.in_flight = false;
    }
}
