//! Collector error types.

use crate::{Classify, FailureClass};

/// Ways a collection pass can fail.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum CollectErrorKind {
    /// The automation resource could not reach the scope
    #[display("Source unavailable ({}): {}", scope, reason)]
    SourceUnavailable {
        /// Scope that was being read
        scope: String,
        /// Driver-reported reason
        reason: String,
    },
    /// The scope had no new content
    #[display("No new content in {}", _0)]
    EmptyResult(String),
    /// The session expired while reading
    #[display("Session expired while reading {}", _0)]
    AuthExpired(String),
}

/// Collector error with location tracking.
///
/// # Examples
///
/// ```
/// use chorus_error::{Classify, CollectError, CollectErrorKind};
///
/// let err = CollectError::new(CollectErrorKind::EmptyResult("feed".into()));
/// assert!(err.is_empty_result());
/// assert!(!err.is_retryable());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Collect Error: {} at line {} in {}", kind, line, file)]
pub struct CollectError {
    /// The kind of error that occurred
    pub kind: CollectErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl CollectError {
    /// Create a new collector error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: CollectErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Returns true when the scope simply had nothing new.
    pub fn is_empty_result(&self) -> bool {
        matches!(self.kind, CollectErrorKind::EmptyResult(_))
    }
}

impl Classify for CollectError {
    fn class(&self) -> FailureClass {
        match self.kind {
            CollectErrorKind::SourceUnavailable { .. } => FailureClass::Transient,
            // Nothing to retry; the next pass picks up new content.
            CollectErrorKind::EmptyResult(_) => FailureClass::Policy,
            CollectErrorKind::AuthExpired(_) => FailureClass::FatalForAccount,
        }
    }
}
