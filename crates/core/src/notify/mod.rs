use serde::{Deserialize, Serialize};

pub mod console;
pub mod webhook;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

/// What the channel told us about a delivery. Not inspected beyond logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryReceipt {
    pub channel: &'static str,
    pub status: Option<u16>,
    pub message_id: Option<String>,
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> &'static str;

    async fn publish(&self, notification: &Notification) -> anyhow::Result<DeliveryReceipt>;
}
