//! Collection passes over a scope.

use crate::SessionLease;
use chorus_core::{Item, Scope};
use chorus_error::{AutomationError, AutomationErrorKind, CollectError, CollectErrorKind};
use chorus_rate_limit::RetryPolicy;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Reads items from a scope through a leased session.
///
/// The collector does not know which items were seen before; it only
/// returns a clean batch: newest first, unique ids, inside the collection
/// window and no longer than the requested limit.
#[derive(Debug, Clone)]
pub struct Collector {
    max_age: Option<Duration>,
    retry: RetryPolicy,
}

impl Collector {
    /// Collector dropping items older than `max_age`.
    pub fn new(max_age: Option<Duration>, retry: RetryPolicy) -> Self {
        Self { max_age, retry }
    }

    /// Collect up to `limit` items from `scope`.
    ///
    /// Transient driver failures are retried with backoff before
    /// `SourceUnavailable` is reported.
    ///
    /// # Errors
    ///
    /// - [`CollectErrorKind::SourceUnavailable`] if the scope cannot be read
    /// - [`CollectErrorKind::EmptyResult`] if nothing new is in the window
    /// - [`CollectErrorKind::AuthExpired`] if the session is logged out
    #[instrument(skip(self, lease), fields(account = %lease.account(), scope = %scope))]
    pub async fn collect(
        &self,
        lease: &SessionLease,
        scope: &Scope,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Item>, CollectError> {
        let driver = lease.driver();
        let raw = self
            .retry
            .run(|| async move {
                driver.navigate(scope).await?;
                driver.read_items(scope, limit).await
            })
            .await
            .map_err(|e| into_collect_error(scope, e))?;

        let platform = driver.platform();
        let read = raw.len();
        let mut ids = HashSet::new();
        let mut items: Vec<Item> = raw
            .into_iter()
            .filter(|item| *item.platform() == platform)
            .filter(|item| self.max_age.is_none_or(|max| item.age_at(now) <= max))
            .filter(|item| ids.insert(item.id().clone()))
            .collect();
        items.sort_by(|a, b| b.posted_at().cmp(a.posted_at()));
        items.truncate(limit);

        debug!(read, kept = items.len(), "Collected items");
        if items.is_empty() {
            return Err(CollectError::new(CollectErrorKind::EmptyResult(
                scope.to_string(),
            )));
        }
        Ok(items)
    }
}

fn into_collect_error(scope: &Scope, error: AutomationError) -> CollectError {
    match error.kind {
        AutomationErrorKind::AuthExpired(_) => {
            CollectError::new(CollectErrorKind::AuthExpired(scope.to_string()))
        }
        AutomationErrorKind::Transient(reason)
        | AutomationErrorKind::Unreachable(reason)
        | AutomationErrorKind::Rejected(reason) => {
            CollectError::new(CollectErrorKind::SourceUnavailable {
                scope: scope.to_string(),
                reason,
            })
        }
    }
}
