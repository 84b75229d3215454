use crate::notify::{DeliveryReceipt, Notification, Notifier};

/// Writes the report to stdout instead of delivering it. Used for dry runs.
#[derive(Debug, Clone, Default)]
pub struct ConsoleNotifier;

#[async_trait::async_trait]
impl Notifier for ConsoleNotifier {
    fn channel(&self) -> &'static str {
        "console"
    }

    async fn publish(&self, notification: &Notification) -> anyhow::Result<DeliveryReceipt> {
        tracing::info!(subject = %notification.subject, "report not delivered (console channel)");
        println!("Subject: {}\n{}", notification.subject, notification.body);

        Ok(DeliveryReceipt {
            channel: self.channel(),
            status: None,
            message_id: None,
        })
    }
}
