//! Vendor notifications.
//!
//! Delivery happens after an assignment has committed and never feeds back
//! into lead or vendor state, except for clearing a push token the channel
//! reported as permanently invalid.

mod dispatcher;
mod webhook;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::VendorId;

pub use dispatcher::{DispatcherSettings, NotificationDispatcher, QueuedNotification};
pub use webhook::WebhookNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    /// Worth retrying: timeouts, 5xx, connection resets.
    #[error("transient delivery failure: {0}")]
    Transient(String),

    #[error("notifier misconfigured: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, NotifyError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    LeadsAssigned { vendor_id: VendorId, count: u32 },
    QuotaAdjusted { vendor_id: VendorId, quota: u32, used: u32 },
}

impl NotificationEvent {
    pub fn vendor_id(&self) -> &VendorId {
        match self {
            NotificationEvent::LeadsAssigned { vendor_id, .. }
            | NotificationEvent::QuotaAdjusted { vendor_id, .. } => vendor_id,
        }
    }

    pub fn title(&self) -> String {
        match self {
            NotificationEvent::LeadsAssigned { count: 1, .. } => "You have 1 new lead".to_string(),
            NotificationEvent::LeadsAssigned { count, .. } => format!("You have {count} new leads"),
            NotificationEvent::QuotaAdjusted { quota, used, .. } => {
                format!("Lead quota updated: {used} of {quota} used")
            }
        }
    }
}

/// Delivery address resolved from the vendor's user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub vendor_id: VendorId,
    pub push_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    /// The vendor has no push token; nothing was attempted.
    NoToken,
    /// The channel rejected the token permanently; it should be cleared.
    TokenInvalid,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: &Recipient, event: &NotificationEvent) -> Result<NotifyOutcome>;
}

/// Writes notifications to the log instead of delivering them
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipient: &Recipient, event: &NotificationEvent) -> Result<NotifyOutcome> {
        if recipient.push_token.is_none() {
            return Ok(NotifyOutcome::NoToken);
        }
        tracing::info!(vendor_id = %recipient.vendor_id, title = %event.title(), "Notification (log only)");
        Ok(NotifyOutcome::Sent)
    }
}
