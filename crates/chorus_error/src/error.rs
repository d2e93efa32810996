//! Top-level error wrapper types.

use crate::{
    ApprovalError, AutomationError, Classify, CollectError, ConfigError, FailureClass,
    GenerationError, JsonError, PublishError, ScheduleError, StorageError,
};

/// Every error the pipeline can surface.
///
/// # Examples
///
/// ```
/// use chorus_error::{ChorusError, ConfigError};
///
/// let err: ChorusError = ConfigError::new("no accounts configured").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum ChorusErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
    /// Persistent state error
    #[from(StorageError)]
    Storage(StorageError),
    /// Automation driver error
    #[from(AutomationError)]
    Automation(AutomationError),
    /// Collection error
    #[from(CollectError)]
    Collect(CollectError),
    /// Reply generation error
    #[from(GenerationError)]
    Generation(GenerationError),
    /// Approval queue error
    #[from(ApprovalError)]
    Approval(ApprovalError),
    /// Scheduler error
    #[from(ScheduleError)]
    Schedule(ScheduleError),
    /// Publish error
    #[from(PublishError)]
    Publish(PublishError),
}

impl Classify for ChorusErrorKind {
    fn class(&self) -> FailureClass {
        match self {
            ChorusErrorKind::Automation(e) => e.class(),
            ChorusErrorKind::Collect(e) => e.class(),
            ChorusErrorKind::Generation(e) => e.class(),
            ChorusErrorKind::Publish(e) => e.class(),
            ChorusErrorKind::Schedule(_) => FailureClass::Policy,
            ChorusErrorKind::Config(_)
            | ChorusErrorKind::Json(_)
            | ChorusErrorKind::Storage(_)
            | ChorusErrorKind::Approval(_) => FailureClass::Internal,
        }
    }
}

/// Chorus error with kind discrimination.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Chorus Error: {}", _0)]
pub struct ChorusError(Box<ChorusErrorKind>);

impl ChorusError {
    /// Create a new error from a kind.
    pub fn new(kind: ChorusErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ChorusErrorKind {
        &self.0
    }
}

impl Classify for ChorusError {
    fn class(&self) -> FailureClass {
        self.0.class()
    }
}

impl<T> From<T> for ChorusError
where
    T: Into<ChorusErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Chorus operations.
pub type ChorusResult<T> = std::result::Result<T, ChorusError>;
