//! Automation driver interface.

use async_trait::async_trait;
use chorus_core::{AccountId, ActionDescriptor, Item, Platform, Scope};
use chorus_error::AutomationError;

/// A logged-in automation resource for one account (typically a browser
/// session).
///
/// Implementations report failures as [`AutomationError`]; the collector and
/// publisher translate them into their own error types. Callers never use a
/// driver directly: access goes through a
/// [`SessionLease`](crate::SessionLease), which serializes calls and resets
/// the driver after an unclean release.
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    /// Platform this driver operates on.
    fn platform(&self) -> Platform;

    /// Bring the session to `scope`.
    async fn navigate(&self, scope: &Scope) -> Result<(), AutomationError>;

    /// Read up to `limit` items from the current scope.
    async fn read_items(&self, scope: &Scope, limit: usize) -> Result<Vec<Item>, AutomationError>;

    /// Perform a platform action as `account`.
    ///
    /// Returns a platform reference for anything created (for example the id
    /// of a posted reply), when the platform exposes one.
    async fn perform_action(
        &self,
        account: &AccountId,
        action: &ActionDescriptor,
    ) -> Result<Option<String>, AutomationError>;

    /// Return the session to a known state after an interrupted operation.
    async fn reset(&self) -> Result<(), AutomationError>;
}
