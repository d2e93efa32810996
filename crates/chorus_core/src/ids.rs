//! Identifier newtypes.

use crate::{ModeKind, Platform};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Configured account name (one automation session per account).
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Creates an account id.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the raw name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Platform-assigned id of a collected item.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Creates an item id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Draft identifier.
///
/// Derived from the platform, item and mode so that generating a draft for
/// the same item twice in one mode yields the same id.
///
/// # Examples
///
/// ```
/// use chorus_core::{DraftId, ItemId, ModeKind, Platform};
///
/// let a = DraftId::derive(Platform::X, &ItemId::new("1"), ModeKind::Turbine);
/// let b = DraftId::derive(Platform::X, &ItemId::new("1"), ModeKind::Turbine);
/// let c = DraftId::derive(Platform::X, &ItemId::new("1"), ModeKind::Action);
/// assert_eq!(a, b);
/// assert_ne!(a, c);
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(transparent)]
pub struct DraftId(String);

impl DraftId {
    /// Derive the id for an item in a mode.
    pub fn derive(platform: Platform, item: &ItemId, mode: ModeKind) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(platform.to_string().as_bytes());
        hasher.update(b":");
        hasher.update(item.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(mode.to_string().as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Self(digest[..16].to_string())
    }

    /// Wrap an id read back from the review surface.
    pub fn parse(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
