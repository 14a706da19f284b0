//! Referrer notification
//!
//! After a referral code is redeemed, its owner is told about it so a backend
//! can credit them. Delivery is best-effort and never affects the redemption.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

const TIMEOUT_SECS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Referral notification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Referral endpoint returned HTTP {0}")]
    Status(u16),
}

/// Delivers "your code was used" notifications
#[async_trait]
pub trait ReferrerNotifier: Send + Sync {
    async fn notify(&self, referrer_code: &str) -> Result<(), NotifyError>;
}

/// Logs the notification and does nothing else
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl ReferrerNotifier for TracingNotifier {
    async fn notify(&self, referrer_code: &str) -> Result<(), NotifyError> {
        info!(referrer_code, "Referral code redeemed, no notification endpoint configured");
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotifyRequest<'a> {
    referrer_code: &'a str,
}

/// POSTs `{"referrerCode": ...}` to a backend endpoint
pub struct HttpNotifier {
    client: Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReferrerNotifier for HttpNotifier {
    async fn notify(&self, referrer_code: &str) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&NotifyRequest { referrer_code })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(NotifyError::Status(resp.status().as_u16()));
        }

        info!(referrer_code, endpoint = %self.endpoint, "Notified referrer");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_string(&NotifyRequest {
            referrer_code: "DRABC123",
        })
        .unwrap();
        assert_eq!(body, r#"{"referrerCode":"DRABC123"}"#);
    }

    #[tokio::test]
    async fn test_tracing_notifier_succeeds() {
        assert!(TracingNotifier.notify("DRABC123").await.is_ok());
    }

    #[test]
    fn test_http_notifier_keeps_endpoint() {
        let notifier = HttpNotifier::new("https://api.drmojahedai.com/referrals").unwrap();
        assert_eq!(notifier.endpoint(), "https://api.drmojahedai.com/referrals");
    }
}
