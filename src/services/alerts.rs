//! Alerting collaborator.
//!
//! Escalations for unroutable items and failed processing runs are delivered
//! to an external webhook. Delivery is best-effort from the job's
//! perspective: a failed alert is logged and never fails the job itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::services::supplier_routing::RoutableItem;

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("Alert delivery failed: {0}")]
    Delivery(#[from] reqwest::Error),
    #[error("Alerting is not configured")]
    NotConfigured,
}

/// The two escalations the orchestration core emits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    UnroutableItems {
        order_id: Uuid,
        order_number: String,
        items: Vec<RoutableItem>,
    },
    ProcessingFailed {
        order_id: Uuid,
        error: String,
    },
}

#[async_trait]
pub trait AlertService: Send + Sync {
    async fn send_alert(&self, alert: Alert) -> Result<(), AlertError>;
}

/// Posts alerts as JSON to a configured webhook URL.
#[derive(Clone)]
pub struct WebhookAlertService {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl WebhookAlertService {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            webhook_url,
        }
    }
}

#[async_trait]
impl AlertService for WebhookAlertService {
    #[instrument(skip(self, alert))]
    async fn send_alert(&self, alert: Alert) -> Result<(), AlertError> {
        let Some(url) = &self.webhook_url else {
            return Err(AlertError::NotConfigured);
        };

        self.client
            .post(url)
            .json(&alert)
            .send()
            .await?
            .error_for_status()?;

        info!("Alert delivered");
        Ok(())
    }
}

/// Best-effort delivery: swallow-and-log, per the alert contract.
pub async fn send_best_effort(service: &dyn AlertService, alert: Alert) {
    if let Err(e) = service.send_alert(alert).await {
        warn!(error = %e, "Alert delivery failed, continuing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_webhook_reports_not_configured() {
        let service = WebhookAlertService::new(None);
        let result = service
            .send_alert(Alert::ProcessingFailed {
                order_id: Uuid::new_v4(),
                error: "boom".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AlertError::NotConfigured)));
    }

    #[tokio::test]
    async fn best_effort_swallows_delivery_failure() {
        let service = WebhookAlertService::new(None);
        // must not panic or propagate
        send_best_effort(
            &service,
            Alert::ProcessingFailed {
                order_id: Uuid::new_v4(),
                error: "boom".to_string(),
            },
        )
        .await;
    }

    #[test]
    fn alert_serializes_with_kind_tag() {
        let alert = Alert::ProcessingFailed {
            order_id: Uuid::new_v4(),
            error: "adapter timeout".to_string(),
        };
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["kind"], "processing_failed");
    }
}
