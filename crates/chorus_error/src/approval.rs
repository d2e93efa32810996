//! Approval queue error types.

/// Approval failure conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ApprovalErrorKind {
    /// No record exists for the draft id
    #[display("No approval record for draft {}", _0)]
    NotFound(String),
    /// A short id matches more than one record
    #[display("Draft id prefix {} matches several records", _0)]
    AmbiguousId(String),
    /// The record was already approved or rejected
    #[display("Draft {} was already decided", _0)]
    AlreadyDecided(String),
    /// A draft state change that the lifecycle does not allow
    #[display("Invalid draft transition from {} to {}", from, to)]
    InvalidTransition {
        /// Current state
        from: String,
        /// Requested state
        to: String,
    },
}

/// Approval error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Approval Error: {} at line {} in {}", kind, line, file)]
pub struct ApprovalError {
    /// The kind of error that occurred
    pub kind: ApprovalErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ApprovalError {
    /// Create a new approval error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ApprovalErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
