//! Error types for the Chorus engagement pipeline.
//!
//! Every failure follows the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum names the specific condition
//! - `*Error` struct wraps the kind with source location tracking
//! - constructors use `#[track_caller]` for automatic location capture
//!
//! Domain errors also implement [`Classify`], which maps them onto the
//! retry / discard / pause-account taxonomy the pipeline acts on.
//!
//! # Examples
//!
//! ```
//! use chorus_error::{ChorusResult, Classify, FailureClass, PublishError, PublishErrorKind};
//!
//! fn publish() -> ChorusResult<()> {
//!     Err(PublishError::new(PublishErrorKind::TransientAutomation("timeout".into())))?
//! }
//!
//! let err = publish().unwrap_err();
//! assert_eq!(err.class(), FailureClass::Transient);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod approval;
mod automation;
mod class;
mod collect;
mod config;
mod error;
mod generation;
mod json;
mod publish;
mod schedule;
mod storage;

pub use approval::{ApprovalError, ApprovalErrorKind};
pub use automation::{AutomationError, AutomationErrorKind};
pub use class::{Classify, FailureClass};
pub use collect::{CollectError, CollectErrorKind};
pub use config::ConfigError;
pub use error::{ChorusError, ChorusErrorKind, ChorusResult};
pub use generation::{GenerationError, GenerationErrorKind};
pub use json::JsonError;
pub use publish::{PublishError, PublishErrorKind};
pub use schedule::{ScheduleError, ScheduleErrorKind};
pub use storage::{StorageError, StorageErrorKind};
