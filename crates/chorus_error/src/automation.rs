//! Failures reported by the browser/session automation driver.

use crate::{Classify, FailureClass};

/// Failure modes of the automation resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum AutomationErrorKind {
    /// Timing or network problem; the same call may succeed later
    #[display("Transient automation failure: {}", _0)]
    Transient(String),
    /// The platform refused the action
    #[display("Platform refused action: {}", _0)]
    Rejected(String),
    /// The logged-in session is no longer valid
    #[display("Session authentication expired: {}", _0)]
    AuthExpired(String),
    /// The requested surface could not be reached at all
    #[display("Target unreachable: {}", _0)]
    Unreachable(String),
}

/// Automation driver error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Automation Error: {} at line {} in {}", kind, line, file)]
pub struct AutomationError {
    /// The kind of error that occurred
    pub kind: AutomationErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl AutomationError {
    /// Create a new automation error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: AutomationErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl Classify for AutomationError {
    fn class(&self) -> FailureClass {
        match self.kind {
            AutomationErrorKind::Transient(_) | AutomationErrorKind::Unreachable(_) => {
                FailureClass::Transient
            }
            AutomationErrorKind::Rejected(_) => FailureClass::Policy,
            AutomationErrorKind::AuthExpired(_) => FailureClass::FatalForAccount,
        }
    }
}
