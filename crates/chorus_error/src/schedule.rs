//! Scheduler error types.

/// Scheduler failure conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ScheduleErrorKind {
    /// The entry's source item is older than the staleness horizon
    #[display("Stale schedule entry {}: source is {} minutes old", entry, age_minutes)]
    StaleSchedule {
        /// Entry identifier
        entry: String,
        /// Age of the source item in minutes
        age_minutes: i64,
    },
    /// No entry with the given id
    #[display("Schedule entry not found: {}", _0)]
    NotFound(String),
    /// Invalid cadence expression
    #[display("Invalid cadence: {}", _0)]
    InvalidCadence(String),
}

/// Scheduler error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Schedule Error: {} at line {} in {}", kind, line, file)]
pub struct ScheduleError {
    /// The kind of error that occurred
    pub kind: ScheduleErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ScheduleError {
    /// Create a new schedule error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ScheduleErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
