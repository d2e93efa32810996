//! Reply generation error types.

use crate::{Classify, FailureClass};

/// Generation failure conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum GenerationErrorKind {
    /// The backend did not answer within the timeout (seconds)
    #[display("Generation timed out after {}s", _0)]
    Timeout(u64),
    /// The backend refused the prompt or produced nothing usable
    #[display("Generation rejected: {}", _0)]
    Rejected(String),
    /// Transport or quota failure at the backend
    #[display("Backend failure: {}", _0)]
    Backend(String),
    /// No credentials were configured for the backend
    #[display("No backend credentials: {}", _0)]
    NoCredentials(String),
}

/// Generation error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Generation Error: {} at line {} in {}", kind, line, file)]
pub struct GenerationError {
    /// The kind of error that occurred
    pub kind: GenerationErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl GenerationError {
    /// Create a new generation error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: GenerationErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl Classify for GenerationError {
    fn class(&self) -> FailureClass {
        match self.kind {
            GenerationErrorKind::Timeout(_) | GenerationErrorKind::Backend(_) => {
                FailureClass::Transient
            }
            GenerationErrorKind::Rejected(_) => FailureClass::Policy,
            GenerationErrorKind::NoCredentials(_) => FailureClass::Internal,
        }
    }
}
