//! Restart-safe state stores for the Chorus pipeline.
//!
//! All state lives under one directory ([`StateLayout`]) as plain JSON and
//! JSON-lines files:
//!
//! - [`SeenStore`]: append-only `(platform, item)` log backing deduplication
//! - [`ApprovalStore`]: approval queue shared with reviewers
//! - [`DraftArchive`]: finished drafts
//! - [`ScheduleStore`]: time-ordered schedule entries
//! - [`StyleCache`]: cached style fingerprints
//!
//! Whole-file documents are replaced atomically (temp file + rename) and
//! log appends are synced before the call returns.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod approvals;
mod archive;
mod document;
mod jsonl;
mod layout;
mod schedule;
mod seen;
mod style_cache;

pub use approvals::{ApprovalStore, Submission};
pub use archive::{ArchivedDraft, DraftArchive};
pub use document::JsonDocument;
pub use jsonl::{append_line, read_lines};
pub use layout::StateLayout;
pub use schedule::ScheduleStore;
pub use seen::{SeenRecord, SeenStore};
pub use style_cache::{StyleCache, StyleCacheEntry};

use chorus_error::ChorusResult;

/// Every store, opened from one state directory.
#[derive(Debug)]
pub struct StateStores {
    /// Seen-item log
    pub seen: SeenStore,
    /// Approval queue
    pub approvals: ApprovalStore,
    /// Finished drafts
    pub archive: DraftArchive,
    /// Schedule
    pub schedule: ScheduleStore,
    /// Style cache
    pub styles: StyleCache,
}

impl StateStores {
    /// Prepare `layout` and open every store in it.
    #[tracing::instrument(skip_all, fields(root = %layout.root().display()))]
    pub async fn open(layout: &StateLayout) -> ChorusResult<Self> {
        layout.prepare().await?;
        let archive = DraftArchive::new(layout.archive());
        Ok(Self {
            seen: SeenStore::open(layout.seen()).await?,
            approvals: ApprovalStore::new(JsonDocument::new(layout.approvals()), archive.clone()),
            archive,
            schedule: ScheduleStore::open(JsonDocument::new(layout.schedule())).await?,
            styles: StyleCache::open(JsonDocument::new(layout.styles())).await?,
        })
    }
}
