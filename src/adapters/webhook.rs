//! Webhook treasury alerts
//!
//! Sends operational alerts to a configured webhook endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::ports::NotificationSink;

/// Webhook notification client
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
}

#[derive(Serialize)]
struct AlertMessage<'a> {
    source: &'static str,
    category: &'a str,
    details: &'a str,
}

impl WebhookNotifier {
    /// Create a new notifier from environment variable
    pub fn from_env() -> Option<Arc<Self>> {
        std::env::var("TREASURER_WEBHOOK_URL").ok().map(|url| {
            info!("Webhook notifications enabled");
            Arc::new(Self {
                client: Client::new(),
                webhook_url: url,
            })
        })
    }

    /// Create a new notifier with explicit URL
    pub fn new(webhook_url: String) -> Arc<Self> {
        Arc::new(Self {
            client: Client::new(),
            webhook_url,
        })
    }

    async fn send(&self, category: &str, details: &str) -> Result<(), String> {
        let message = AlertMessage {
            source: "treasurer",
            category,
            details,
        };

        match self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await
        {
            Ok(resp) => {
                if resp.status().is_success() {
                    debug!("Webhook alert sent successfully");
                    Ok(())
                } else {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    error!("Webhook alert failed: {} - {}", status, body);
                    Err(format!("HTTP {}: {}", status, body))
                }
            }
            Err(e) => {
                error!("Webhook request failed: {}", e);
                Err(e.to_string())
            }
        }
    }
}

/// Fallback sink used when no webhook is configured: alerts land in the log
/// stream and count as delivered.
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn alert(&self, category: &str, details: &str) -> bool {
        tracing::warn!(category, details, "treasury alert");
        true
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn alert(&self, category: &str, details: &str) -> bool {
        match self.send(category, details).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to deliver {} alert: {}", category, e);
                false
            }
        }
    }
}
