//! Collection scopes.

use serde::{Deserialize, Serialize};

/// Surface a collector reads from.
///
/// # Examples
///
/// ```
/// use chorus_core::Scope;
///
/// let scope = Scope::account("nasa");
/// assert_eq!(scope.to_string(), "account:@nasa");
/// assert_eq!(Scope::Feed.to_string(), "feed");
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scope {
    /// Posts by one account
    #[display("account:@{}", handle)]
    Account {
        /// Handle without the leading `@`
        handle: String,
    },
    /// Posts inside a named community (subreddit, X community, channel)
    #[display("community:{}", name)]
    Community {
        /// Community name
        name: String,
    },
    /// The logged-in account's home feed
    #[display("feed")]
    Feed,
    /// Mentions of and comments on the logged-in account
    #[display("mentions")]
    Mentions,
}

impl Scope {
    /// Account scope from a handle, tolerating a leading `@`.
    pub fn account(handle: impl AsRef<str>) -> Self {
        Scope::Account {
            handle: handle.as_ref().trim_start_matches('@').to_string(),
        }
    }

    /// Community scope.
    pub fn community(name: impl Into<String>) -> Self {
        Scope::Community { name: name.into() }
    }

    /// File-system friendly key for this scope.
    pub fn slug(&self) -> String {
        match self {
            Scope::Account { handle } => format!("account_{}", handle),
            Scope::Community { name } => format!("community_{}", name),
            Scope::Feed => "feed".to_string(),
            Scope::Mentions => "mentions".to_string(),
        }
    }
}
