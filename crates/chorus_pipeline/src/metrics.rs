//! Per-account pipeline counters.

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters for one account loop. Cheap to clone; clones share counters.
#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    inner: Arc<PipelineMetricsInner>,
}

#[derive(Debug, Default)]
struct PipelineMetricsInner {
    collected: AtomicU64,
    admitted: AtomicU64,
    generated: AtomicU64,
    queued: AtomicU64,
    scheduled: AtomicU64,
    published: AtomicU64,
    deferred: AtomicU64,
    failed: AtomicU64,
    stale: AtomicU64,
    drifted: AtomicU64,
    expired: AtomicU64,
    last_publish: parking_lot::Mutex<Option<Instant>>,
}

macro_rules! counter {
    ($record:ident, $get:ident, $field:ident, $doc:literal) => {
        #[doc = concat!("Adds to the ", $doc, " count.")]
        pub fn $record(&self, n: u64) {
            self.inner.$field.fetch_add(n, Ordering::Relaxed);
        }

        #[doc = concat!("Gets the ", $doc, " count.")]
        pub fn $get(&self) -> u64 {
            self.inner.$field.load(Ordering::Relaxed)
        }
    };
}

impl PipelineMetrics {
    /// Creates a zeroed collector.
    pub fn new() -> Self {
        Self::default()
    }

    counter!(record_collected, collected, collected, "collected item");
    counter!(record_admitted, admitted, admitted, "admitted item");
    counter!(record_generated, generated, generated, "generated draft");
    counter!(record_queued, queued, queued, "queued-for-approval");
    counter!(record_scheduled, scheduled, scheduled, "scheduled entry");
    counter!(record_deferred, deferred, deferred, "deferred action");
    counter!(record_failed, failed, failed, "failure");
    counter!(record_stale, stale, stale, "stale entry");
    counter!(record_drifted, drifted, drifted, "drifted entry");
    counter!(record_expired, expired, expired, "expired approval");

    /// Records a successful publication.
    pub fn record_published(&self) {
        self.inner.published.fetch_add(1, Ordering::Relaxed);
        *self.inner.last_publish.lock() = Some(Instant::now());
    }

    /// Gets the published count.
    pub fn published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// Time since the last publication.
    pub fn time_since_publish(&self) -> Option<std::time::Duration> {
        self.inner
            .last_publish
            .lock()
            .map(|instant| instant.elapsed())
    }

    /// Creates a serializable snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            collected: self.collected(),
            admitted: self.admitted(),
            generated: self.generated(),
            queued: self.queued(),
            scheduled: self.scheduled(),
            published: self.published(),
            deferred: self.deferred(),
            failed: self.failed(),
            stale: self.stale(),
            drifted: self.drifted(),
            expired: self.expired(),
            seconds_since_publish: self.time_since_publish().map(|d| d.as_secs()),
        }
    }
}

/// Serializable snapshot of [`PipelineMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Items read from platforms
    pub collected: u64,
    /// Items that passed deduplication
    pub admitted: u64,
    /// Drafts generated
    pub generated: u64,
    /// Drafts queued for review
    pub queued: u64,
    /// Schedule entries created
    pub scheduled: u64,
    /// Actions published
    pub published: u64,
    /// Actions or passes postponed by budget or backoff
    pub deferred: u64,
    /// Failures reported and skipped
    pub failed: u64,
    /// Entries dropped as stale
    pub stale: u64,
    /// Entries that ran later than the drift tolerance
    pub drifted: u64,
    /// Approval records expired unanswered
    pub expired: u64,
    /// Seconds since the last publication
    pub seconds_since_publish: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let metrics = PipelineMetrics::new();
        let clone = metrics.clone();
        clone.record_collected(5);
        clone.record_published();
        clone.record_drifted(2);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.collected, 5);
        assert_eq!(snapshot.published, 1);
        assert_eq!(snapshot.drifted, 2);
        assert!(snapshot.seconds_since_publish.is_some());
    }
}
