//! Core data model for the Chorus engagement pipeline.
//!
//! Items flow from collection through generation into drafts. Drafts move
//! through a small lifecycle ([`DraftState`]) guarded by the approval gate,
//! and approved drafts become [`ScheduleEntry`] values that the scheduler
//! fires through the publisher.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod action;
mod approval;
mod draft;
mod ids;
mod item;
mod mode;
mod platform;
mod scope;
mod style;

pub use action::{ActionDescriptor, ActionDescriptorBuilder, ActionKind, ScheduleEntry};
pub use approval::{ApprovalDecision, ApprovalRecord};
pub use draft::{Draft, DraftState};
pub use ids::{AccountId, DraftId, ItemId};
pub use item::{Engagement, EngagementBuilder, Item, ItemBuilder};
pub use mode::{Mode, ModeKind};
pub use platform::Platform;
pub use scope::Scope;
pub use style::{StyleFingerprint, ToneCue};
