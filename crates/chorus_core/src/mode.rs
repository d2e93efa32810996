//! Operating modes.

use crate::Scope;
use serde::{Deserialize, Serialize};

/// Operating mode of an account loop.
///
/// The mode decides whether drafts need an operator decision before they
/// may be published.
///
/// # Examples
///
/// ```
/// use chorus_core::Mode;
///
/// assert!(!Mode::Action.requires_approval());
/// assert!(Mode::Turbine.requires_approval());
///
/// let eternity = Mode::Eternity { targets: vec!["@nasa".into()] };
/// assert!(eternity.requires_approval());
/// assert_eq!(eternity.scopes(&[]).len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mode {
    /// Collect, generate and publish without a human gate
    Action,
    /// Collect over a general feed and queue every draft for review
    Turbine,
    /// Like Turbine, restricted to a fixed list of monitored accounts
    Eternity {
        /// Monitored account handles
        #[serde(default)]
        targets: Vec<String>,
    },
}

impl Mode {
    /// Returns true when drafts must wait for an operator decision.
    pub fn requires_approval(&self) -> bool {
        match self {
            Mode::Action => false,
            Mode::Turbine | Mode::Eternity { .. } => true,
        }
    }

    /// Mode discriminant.
    pub fn kind(&self) -> ModeKind {
        match self {
            Mode::Action => ModeKind::Action,
            Mode::Turbine => ModeKind::Turbine,
            Mode::Eternity { .. } => ModeKind::Eternity,
        }
    }

    /// Scopes a collection pass reads.
    ///
    /// Eternity always reads its monitored accounts. The other modes read
    /// the configured scopes, falling back to the home feed.
    pub fn scopes(&self, configured: &[Scope]) -> Vec<Scope> {
        match self {
            Mode::Eternity { targets } => targets.iter().map(Scope::account).collect(),
            Mode::Action | Mode::Turbine if configured.is_empty() => vec![Scope::Feed],
            Mode::Action | Mode::Turbine => configured.to_vec(),
        }
    }
}

/// Mode discriminant without payload.
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
pub enum ModeKind {
    /// Action mode
    #[display("action")]
    Action,
    /// Turbine mode
    #[display("turbine")]
    Turbine,
    /// Eternity mode
    #[display("eternity")]
    Eternity,
}
