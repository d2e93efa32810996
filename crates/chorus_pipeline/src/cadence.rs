//! When an account runs its collection passes.
//!
//! A [`Cadence`] answers two questions for the account loop: should a pass
//! run now, and when should it look again.

use chorus_error::{ScheduleError, ScheduleErrorKind};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Result of checking a cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadenceCheck {
    /// Whether a pass should run now
    pub should_run: bool,
    /// When the next pass is due, if ever
    pub next_run: Option<DateTime<Utc>>,
}

impl CadenceCheck {
    fn new(should_run: bool, next_run: Option<DateTime<Utc>>) -> Self {
        Self {
            should_run,
            next_run,
        }
    }

    fn run_once() -> Self {
        Self::new(true, None)
    }

    fn wait_until(next_run: DateTime<Utc>) -> Self {
        Self::new(false, Some(next_run))
    }

    fn run_and_schedule(next_run: DateTime<Utc>) -> Self {
        Self::new(true, Some(next_run))
    }
}

/// Collection cadence of an account.
///
/// ```toml
/// cadence = { type = "Interval", seconds = 900 }
/// cadence = { type = "Cron", expression = "0 */30 8-22 * * * *" }
/// ```
///
/// # Examples
///
/// ```
/// use chorus_pipeline::Cadence;
/// use chrono::{Duration, Utc};
///
/// let cadence = Cadence::Interval { seconds: 600 };
/// let now = Utc::now();
/// assert!(cadence.check(None, now).should_run);
/// assert!(!cadence.check(Some(now - Duration::seconds(60)), now).should_run);
/// assert!(cadence.check(Some(now - Duration::seconds(600)), now).should_run);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Cadence {
    /// Cron expression (7 fields: sec min hour day month weekday year)
    Cron {
        /// Cron expression string
        expression: String,
    },

    /// Fixed interval in seconds
    Interval {
        /// Interval duration in seconds
        seconds: u64,
    },

    /// A single pass at a specific time
    Once {
        /// Execution timestamp
        at: DateTime<Utc>,
    },

    /// A single pass on startup
    Immediate,
}

impl Default for Cadence {
    fn default() -> Self {
        Cadence::Interval { seconds: 900 }
    }
}

impl Cadence {
    /// Check whether a pass should run at `now`, given the last pass.
    pub fn check(&self, last_run: Option<DateTime<Utc>>, now: DateTime<Utc>) -> CadenceCheck {
        match self {
            Cadence::Immediate => match last_run {
                None => CadenceCheck::run_once(),
                Some(_) => CadenceCheck::new(false, None),
            },
            Cadence::Once { at } => match last_run {
                None if now >= *at => CadenceCheck::run_once(),
                None => CadenceCheck::wait_until(*at),
                Some(_) => CadenceCheck::new(false, None),
            },
            Cadence::Interval { seconds } => {
                let interval = Duration::seconds(*seconds as i64);
                match last_run {
                    None => CadenceCheck::run_and_schedule(now + interval),
                    Some(last) => {
                        let next = last + interval;
                        if now >= next {
                            CadenceCheck::run_and_schedule(now + interval)
                        } else {
                            CadenceCheck::wait_until(next)
                        }
                    }
                }
            }
            Cadence::Cron { expression } => match cron::Schedule::from_str(expression) {
                Ok(schedule) => {
                    let Some(next) = schedule.after(&last_run.unwrap_or(now)).next() else {
                        return CadenceCheck::new(false, None);
                    };
                    match last_run {
                        // First pass runs right away, then follows the expression.
                        None => CadenceCheck::run_and_schedule(next),
                        Some(_) if now >= next => {
                            CadenceCheck::new(true, schedule.after(&now).next())
                        }
                        Some(_) => CadenceCheck::wait_until(next),
                    }
                }
                Err(_) => CadenceCheck::new(false, None),
            },
        }
    }

    /// Next pass strictly after `after`, if the cadence has one.
    pub fn next_execution(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Cadence::Immediate => None,
            Cadence::Once { at } => (after < *at).then_some(*at),
            Cadence::Interval { seconds } => Some(after + Duration::seconds(*seconds as i64)),
            Cadence::Cron { expression } => cron::Schedule::from_str(expression)
                .ok()
                .and_then(|schedule| schedule.after(&after).next()),
        }
    }

    /// Reject malformed cadences.
    ///
    /// # Errors
    ///
    /// [`ScheduleErrorKind::InvalidCadence`] for an unparsable cron
    /// expression or a zero interval.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        match self {
            Cadence::Cron { expression } => cron::Schedule::from_str(expression)
                .map(|_| ())
                .map_err(|e| {
                    ScheduleError::new(ScheduleErrorKind::InvalidCadence(format!(
                        "{}: {}",
                        expression, e
                    )))
                }),
            Cadence::Interval { seconds: 0 } => Err(ScheduleError::new(
                ScheduleErrorKind::InvalidCadence("interval of 0 seconds".into()),
            )),
            _ => Ok(()),
        }
    }
}
