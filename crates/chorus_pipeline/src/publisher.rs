//! Final platform actions.

use crate::SessionLease;
use chorus_core::{AccountId, ActionDescriptor, ActionKind, DraftId};
use chorus_error::{AutomationError, AutomationErrorKind, PublishError, PublishErrorKind};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Proof that an action was performed.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Acting account
    account: AccountId,
    /// Action performed
    kind: ActionKind,
    /// Draft published, for replies
    draft: Option<DraftId>,
    /// Platform reference of the created content, if any
    reference: Option<String>,
    /// When the action completed
    published_at: DateTime<Utc>,
}

/// Executes actions through the leased automation session.
///
/// Payloads are validated before the session is touched; an invalid
/// payload never reaches the platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct Publisher;

impl Publisher {
    /// Creates a publisher.
    pub fn new() -> Self {
        Self
    }

    /// Perform `action` as the lease's account.
    ///
    /// # Errors
    ///
    /// - [`PublishErrorKind::InvalidPayload`] for malformed actions
    /// - [`PublishErrorKind::PlatformRejected`] when the platform refuses
    /// - [`PublishErrorKind::TransientAutomation`] for retryable failures
    /// - [`PublishErrorKind::AuthExpired`] when the session is logged out
    #[instrument(skip(self, lease, action), fields(account = %lease.account(), action = %action.kind()))]
    pub async fn publish(
        &self,
        lease: &SessionLease,
        action: &ActionDescriptor,
    ) -> Result<PublishReceipt, PublishError> {
        let platform = lease.driver().platform();
        validate(action, platform.max_text_chars())?;

        let reference = lease
            .driver()
            .perform_action(lease.account(), action)
            .await
            .map_err(into_publish_error)?;

        info!(reference = ?reference, "Action performed");
        Ok(PublishReceipt {
            account: lease.account().clone(),
            kind: *action.kind(),
            draft: action.draft().clone(),
            reference,
            published_at: Utc::now(),
        })
    }
}

fn validate(action: &ActionDescriptor, max_chars: usize) -> Result<(), PublishError> {
    let invalid = |reason: String| Err(PublishError::new(PublishErrorKind::InvalidPayload(reason)));
    let needs_target = matches!(
        action.kind(),
        ActionKind::Reply | ActionKind::Like | ActionKind::Repost
    );
    let needs_text = matches!(action.kind(), ActionKind::Reply | ActionKind::Post);

    if *action.kind() == ActionKind::Scrape {
        return invalid("scrape is not a publishable action".into());
    }
    if needs_target && action.target().is_none() {
        return invalid(format!("{} requires a target item", action.kind()));
    }
    if *action.kind() == ActionKind::Follow && action.handle().as_deref().is_none_or(str::is_empty) {
        return invalid("follow requires a handle".into());
    }
    if needs_text {
        let text = action.text().as_deref().unwrap_or_default().trim();
        if text.is_empty() {
            return invalid(format!("{} requires text", action.kind()));
        }
        let chars = text.chars().count();
        if chars > max_chars {
            return invalid(format!("text is {} characters, limit is {}", chars, max_chars));
        }
    }
    Ok(())
}

fn into_publish_error(error: AutomationError) -> PublishError {
    let kind = match error.kind {
        AutomationErrorKind::Transient(reason) | AutomationErrorKind::Unreachable(reason) => {
            PublishErrorKind::TransientAutomation(reason)
        }
        AutomationErrorKind::Rejected(reason) => PublishErrorKind::PlatformRejected(reason),
        AutomationErrorKind::AuthExpired(reason) => PublishErrorKind::AuthExpired(reason),
    };
    PublishError::new(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::{ActionDescriptorBuilder, ItemId};

    #[test]
    fn test_reply_within_limit_is_valid() {
        let action = ActionDescriptor::reply(ItemId::new("1"), "short", DraftId::parse("d"));
        assert!(validate(&action, 280).is_ok());
    }

    #[test]
    fn test_overlong_reply_is_invalid() {
        let action = ActionDescriptor::reply(ItemId::new("1"), "x".repeat(281), DraftId::parse("d"));
        let err = validate(&action, 280).unwrap_err();
        assert!(matches!(err.kind, PublishErrorKind::InvalidPayload(_)));
    }

    #[test]
    fn test_like_without_target_is_invalid() {
        let action = ActionDescriptorBuilder::default()
            .kind(ActionKind::Like)
            .build()
            .unwrap();
        assert!(validate(&action, 280).is_err());
        assert!(validate(&ActionDescriptor::follow("@rustlang"), 280).is_ok());
    }

    #[test]
    fn test_automation_errors_map_by_class() {
        use chorus_error::{Classify, FailureClass};

        let auth = into_publish_error(AutomationError::new(AutomationErrorKind::AuthExpired(
            "logged out".into(),
        )));
        assert_eq!(auth.class(), FailureClass::FatalForAccount);
        let flaky = into_publish_error(AutomationError::new(AutomationErrorKind::Unreachable(
            "timeout".into(),
        )));
        assert_eq!(flaky.class(), FailureClass::Transient);
    }
}
