use std::sync::Arc;

use shared::domain::NotificationPermission;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    capabilities::{HostDocument, NotificationCenter},
    identity::IdentityResolver,
};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("failed to query notification permission: {0}")]
    Permission(anyhow::Error),
    #[error("failed to show notification: {0}")]
    Show(anyhow::Error),
}

/// Everything that decides whether a message raises a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityInputs {
    pub sender_is_self: bool,
    pub capability_present: bool,
    pub permission_granted: bool,
    pub has_focus: bool,
    pub notify_flag: bool,
}

pub fn is_eligible(inputs: &EligibilityInputs) -> bool {
    !inputs.sender_is_self
        && inputs.capability_present
        && inputs.permission_granted
        && !inputs.has_focus
        && inputs.notify_flag
}

pub fn notification_title(sender: &str) -> String {
    format!("Message from {sender}")
}

pub struct NotificationDispatcher {
    identity: IdentityResolver,
    center: Arc<dyn NotificationCenter>,
    document: Arc<dyn HostDocument>,
}

impl NotificationDispatcher {
    pub fn new(
        identity: IdentityResolver,
        center: Arc<dyn NotificationCenter>,
        document: Arc<dyn HostDocument>,
    ) -> Self {
        Self {
            identity,
            center,
            document,
        }
    }

    /// Raises a desktop notification for `sender` if the message qualifies.
    ///
    /// Failures are logged here and never reach the caller.
    pub fn maybe_notify(&self, sender: &str, preview: &str, notify: bool) {
        if let Err(err) = self.try_notify(sender, preview, notify) {
            warn!(sender, "notification dropped: {err}");
        }
    }

    fn try_notify(&self, sender: &str, preview: &str, notify: bool) -> Result<(), NotificationError> {
        let sender_is_self = self.identity.sender_name().as_deref() == Some(sender);
        if sender_is_self || !notify {
            return Ok(());
        }
        let capability_present = self.center.is_supported();
        let permission_granted = capability_present
            && self
                .center
                .permission()
                .map_err(NotificationError::Permission)?
                == NotificationPermission::Granted;
        let inputs = EligibilityInputs {
            sender_is_self,
            capability_present,
            permission_granted,
            has_focus: self.document.has_focus(),
            notify_flag: notify,
        };
        if !is_eligible(&inputs) {
            debug!(sender, ?inputs, "notification suppressed");
            return Ok(());
        }
        self.center
            .show(&notification_title(sender), preview)
            .map_err(NotificationError::Show)
    }
}

#[cfg(test)]
#[path = "tests/notify_tests.rs"]
mod tests;
