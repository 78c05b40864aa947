//! Post-commit order confirmations.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use mockall::automock;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderConfirmation {
    pub order_id: i32,
    pub recipient: String,
    pub total: Decimal,
    pub currency: String,
}

#[automock]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn order_confirmed(&self, confirmation: &OrderConfirmation) -> anyhow::Result<()>;
}

/// Writes confirmations to the log. Used when no webhook is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn order_confirmed(&self, confirmation: &OrderConfirmation) -> anyhow::Result<()> {
        tracing::info!(
            order_id = confirmation.order_id,
            recipient = %confirmation.recipient,
            total = %confirmation.total,
            currency = %confirmation.currency,
            "order confirmation"
        );
        Ok(())
    }
}

/// POSTs each confirmation as JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    http: Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build webhook http client")?;

        Ok(Self {
            url: url.into(),
            http,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn order_confirmed(&self, confirmation: &OrderConfirmation) -> anyhow::Result<()> {
        self.http
            .post(&self.url)
            .json(confirmation)
            .send()
            .await
            .context("webhook request failed")?
            .error_for_status()
            .context("webhook rejected the confirmation")?;
        Ok(())
    }
}

/// Fire the confirmation on a background task.
///
/// Must only be called after the order transaction has committed. Failures
/// are logged and dropped.
pub fn dispatch_after_commit(notifier: Arc<dyn Notifier>, confirmation: OrderConfirmation) {
    tokio::spawn(async move {
        if let Err(err) = notifier.order_confirmed(&confirmation).await {
            tracing::warn!(
                order_id = confirmation.order_id,
                error = ?err,
                "failed to send order confirmation"
            );
        }
    });
}
