//! Publisher error types.

use crate::{Classify, FailureClass};

/// Publish failure conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum PublishErrorKind {
    /// The platform refused the action
    #[display("Platform rejected action: {}", _0)]
    PlatformRejected(String),
    /// A timing or network failure in the automation layer
    #[display("Transient automation error: {}", _0)]
    TransientAutomation(String),
    /// The account session expired
    #[display("Authentication expired: {}", _0)]
    AuthExpired(String),
    /// The payload violates a platform constraint
    #[display("Invalid payload: {}", _0)]
    InvalidPayload(String),
}

/// Publisher error with location tracking.
///
/// # Examples
///
/// ```
/// use chorus_error::{Classify, FailureClass, PublishError, PublishErrorKind};
///
/// let err = PublishError::new(PublishErrorKind::AuthExpired("login wall".into()));
/// assert_eq!(err.class(), FailureClass::FatalForAccount);
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Publish Error: {} at line {} in {}", kind, line, file)]
pub struct PublishError {
    /// The kind of error that occurred
    pub kind: PublishErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl PublishError {
    /// Create a new publish error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: PublishErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl Classify for PublishError {
    fn class(&self) -> FailureClass {
        match self.kind {
            PublishErrorKind::TransientAutomation(_) => FailureClass::Transient,
            PublishErrorKind::PlatformRejected(_) | PublishErrorKind::InvalidPayload(_) => {
                FailureClass::Policy
            }
            PublishErrorKind::AuthExpired(_) => FailureClass::FatalForAccount,
        }
    }
}
