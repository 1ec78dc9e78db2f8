//! Push delivery through an HTTP webhook

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::{NotificationEvent, Notifier, NotifyError, NotifyOutcome, Recipient, Result};

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    token: &'a str,
    title: String,
    event: &'a NotificationEvent,
}

/// Posts `{token, title, event}` to a push gateway.
///
/// `404` and `410` mean the gateway no longer knows the token; any other
/// non-success status is treated as transient.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("leadflow/0.1.0")
            .build()
            .map_err(|e| NotifyError::Config(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

pub(crate) fn classify(status: StatusCode) -> Result<NotifyOutcome> {
    if status.is_success() {
        Ok(NotifyOutcome::Sent)
    } else if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        Ok(NotifyOutcome::TokenInvalid)
    } else {
        Err(NotifyError::Transient(format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        )))
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, recipient: &Recipient, event: &NotificationEvent) -> Result<NotifyOutcome> {
        let Some(token) = recipient.push_token.as_deref() else {
            return Ok(NotifyOutcome::NoToken);
        };

        let response = self
            .client
            .post(&self.url)
            .json(&PushRequest {
                token,
                title: event.title(),
                event,
            })
            .send()
            .await
            .map_err(|e| NotifyError::Transient(e.to_string()))?;

        debug!(vendor_id = %recipient.vendor_id, status = %response.status(), "Push gateway responded");
        classify(response.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VendorId;

    #[test]
    fn test_status_classification() {
        assert_eq!(classify(StatusCode::OK).unwrap(), NotifyOutcome::Sent);
        assert_eq!(classify(StatusCode::GONE).unwrap(), NotifyOutcome::TokenInvalid);
        assert_eq!(classify(StatusCode::NOT_FOUND).unwrap(), NotifyOutcome::TokenInvalid);
        assert!(matches!(
            classify(StatusCode::BAD_GATEWAY),
            Err(NotifyError::Transient(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_token_skips_request() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/push", Duration::from_millis(50)).unwrap();
        let outcome = notifier
            .notify(
                &Recipient {
                    vendor_id: VendorId::from("v1"),
                    push_token: None,
                },
                &NotificationEvent::LeadsAssigned {
                    vendor_id: VendorId::from("v1"),
                    count: 1,
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, NotifyOutcome::NoToken);
    }
}
