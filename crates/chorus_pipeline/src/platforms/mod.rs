//! Concrete automation drivers.

mod snapshot;

pub use snapshot::{OutboxRecord, SESSION_EXPIRED_MARKER, SnapshotDriver, SnapshotItem};
