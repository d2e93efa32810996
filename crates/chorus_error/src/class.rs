//! Failure classification shared by every pipeline stage.

/// How the pipeline reacts to a failure.
///
/// Every domain error maps onto exactly one class. Callers branch on the
/// class instead of matching individual error kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display,
)]
pub enum FailureClass {
    /// Network hiccups, UI timing, backend timeouts, budget exhaustion.
    /// Retried with backoff up to a ceiling, then reported.
    #[display("transient")]
    Transient,
    /// Content or policy rejection. Never retried; the item is discarded
    /// for the current pass.
    #[display("policy")]
    Policy,
    /// Auth expiry or suspension. The owning account pauses.
    #[display("fatal-for-account")]
    FatalForAccount,
    /// Local faults such as unreadable state. Reported and skipped.
    #[display("internal")]
    Internal,
}

/// Errors that know their [`FailureClass`].
///
/// # Examples
///
/// ```
/// use chorus_error::{Classify, FailureClass, GenerationError, GenerationErrorKind};
///
/// let err = GenerationError::new(GenerationErrorKind::Timeout(30));
/// assert_eq!(err.class(), FailureClass::Transient);
/// assert!(err.is_retryable());
/// ```
pub trait Classify {
    /// The class of this failure.
    fn class(&self) -> FailureClass;

    /// Returns true if the failed operation may be attempted again.
    fn is_retryable(&self) -> bool {
        self.class() == FailureClass::Transient
    }

    /// Returns true if the owning account must stop issuing actions.
    fn is_fatal_for_account(&self) -> bool {
        self.class() == FailureClass::FatalForAccount
    }
}
