use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::VendorId;
use crate::observability::Metrics;
use crate::store::VendorStore;

use super::{NotificationEvent, Notifier, NotifyOutcome, Recipient};

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub channel_size: usize,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            channel_size: 256,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

/// What happened when an event was handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedNotification {
    pub vendor_id: VendorId,
    pub queued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Post-commit notification queue.
///
/// `dispatch` never waits: a full channel drops the event with a warning so
/// a slow push gateway cannot hold up distribution. A single background task
/// drains the channel and exits once every dispatcher clone is dropped.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: Option<mpsc::Sender<NotificationEvent>>,
}

impl NotificationDispatcher {
    pub fn spawn(
        notifier: Arc<dyn Notifier>,
        vendors: Arc<dyn VendorStore>,
        metrics: Arc<Metrics>,
        settings: DispatcherSettings,
    ) -> (Self, JoinHandle<()>) {
        info!(
            channel_size = settings.channel_size,
            max_attempts = settings.max_attempts,
            "Starting notification dispatcher"
        );

        let (tx, rx) = mpsc::channel(settings.channel_size.max(1));
        let worker = DeliveryWorker {
            notifier,
            vendors,
            metrics,
            settings,
        };
        let handle = tokio::spawn(worker.run(rx));

        (Self { sender: Some(tx) }, handle)
    }

    /// A dispatcher that accepts nothing, for deployments with notifications off.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn dispatch(&self, event: NotificationEvent) -> QueuedNotification {
        let vendor_id = event.vendor_id().clone();
        let Some(sender) = &self.sender else {
            return QueuedNotification {
                vendor_id,
                queued: false,
                reason: Some("notifications disabled".to_string()),
            };
        };

        match sender.try_send(event) {
            Ok(()) => {
                debug!(vendor_id = %vendor_id, "Queued notification");
                QueuedNotification {
                    vendor_id,
                    queued: true,
                    reason: None,
                }
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(vendor_id = %vendor_id, "Notification channel full, dropping event");
                QueuedNotification {
                    vendor_id,
                    queued: false,
                    reason: Some("notification queue full".to_string()),
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(vendor_id = %vendor_id, "Notification worker stopped, dropping event");
                QueuedNotification {
                    vendor_id,
                    queued: false,
                    reason: Some("notification worker stopped".to_string()),
                }
            }
        }
    }
}

struct DeliveryWorker {
    notifier: Arc<dyn Notifier>,
    vendors: Arc<dyn VendorStore>,
    metrics: Arc<Metrics>,
    settings: DispatcherSettings,
}

impl DeliveryWorker {
    async fn run(self, mut rx: mpsc::Receiver<NotificationEvent>) {
        while let Some(event) = rx.recv().await {
            self.deliver(&event).await;
        }
        info!("Notification dispatcher stopped");
    }

    async fn deliver(&self, event: &NotificationEvent) {
        let vendor_id = event.vendor_id();
        let recipient = match self.vendors.get_vendor(vendor_id) {
            Ok(Some(vendor)) => Recipient {
                vendor_id: vendor.id,
                push_token: vendor.user.push_token,
            },
            Ok(None) => {
                warn!(vendor_id = %vendor_id, "Notification for unknown vendor");
                self.metrics.notification_failed();
                return;
            }
            Err(e) => {
                warn!(vendor_id = %vendor_id, error = %e, "Could not load vendor for notification");
                self.metrics.notification_failed();
                return;
            }
        };

        let max_attempts = self.settings.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match self.notifier.notify(&recipient, event).await {
                Ok(NotifyOutcome::Sent) => {
                    self.metrics.notification_sent();
                    debug!(vendor_id = %vendor_id, attempt, "Notification sent");
                    return;
                }
                Ok(NotifyOutcome::NoToken) => {
                    debug!(vendor_id = %vendor_id, "Vendor has no push token, skipping");
                    return;
                }
                Ok(NotifyOutcome::TokenInvalid) => {
                    self.metrics.notification_failed();
                    warn!(vendor_id = %vendor_id, "Push token rejected, clearing it");
                    if let Err(e) = self.vendors.clear_push_token(vendor_id) {
                        warn!(vendor_id = %vendor_id, error = %e, "Failed to clear push token");
                    }
                    return;
                }
                Err(e) if attempt < max_attempts => {
                    warn!(vendor_id = %vendor_id, attempt, error = %e, "Notification failed, retrying");
                    tokio::time::sleep(self.settings.retry_backoff * attempt).await;
                }
                Err(e) => {
                    self.metrics.notification_failed();
                    warn!(vendor_id = %vendor_id, attempt, error = %e, "Notification failed after retries");
                }
            }
        }
    }
}
