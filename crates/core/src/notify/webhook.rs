use crate::config::Settings;
use crate::notify::{DeliveryReceipt, Notification, Notifier};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Posts `{"subject", "message"}` as JSON to a pre-configured endpoint (a chat
/// webhook, or an HTTP gateway in front of a pub/sub topic).
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    message: &'a str,
}

impl WebhookNotifier {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let url = settings.require_notify_webhook_url()?.to_string();
        let token = settings
            .notify_webhook_token
            .clone()
            .filter(|s| !s.trim().is_empty());

        let timeout = Duration::from_secs(
            settings
                .notify_webhook_timeout_secs
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        );

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build webhook http client")?;

        Ok(Self {
            http,
            url,
            token,
            timeout,
        })
    }

    fn headers(&self) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))?,
            );
        }
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    fn channel(&self) -> &'static str {
        "webhook"
    }

    async fn publish(&self, notification: &Notification) -> anyhow::Result<DeliveryReceipt> {
        let payload = WebhookPayload {
            subject: &notification.subject,
            message: &notification.body,
        };

        let res = self
            .http
            .post(&self.url)
            .headers(self.headers()?)
            .json(&payload)
            .send()
            .await
            .with_context(|| {
                format!(
                    "notification webhook request failed (timeout {}s)",
                    self.timeout.as_secs()
                )
            })?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read notification webhook response")?;
        if !status.is_success() {
            anyhow::bail!("notification webhook HTTP {status}: {text}");
        }

        Ok(DeliveryReceipt {
            channel: self.channel(),
            status: Some(status.as_u16()),
            message_id: message_id_from_body(&text),
        })
    }
}

/// Best-effort: gateways answer with `message_id`, `MessageId` or nothing at all.
fn message_id_from_body(text: &str) -> Option<String> {
    let v = serde_json::from_str::<Value>(text).ok()?;
    ["message_id", "MessageId", "id"]
        .iter()
        .find_map(|k| v.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_message_id_variants() {
        assert_eq!(
            message_id_from_body(r#"{"MessageId":"abc-123"}"#),
            Some("abc-123".to_string())
        );
        assert_eq!(
            message_id_from_body(r#"{"message_id":"m1","id":"other"}"#),
            Some("m1".to_string())
        );
        assert_eq!(message_id_from_body("ok"), None);
        assert_eq!(message_id_from_body(r#"{"id":7}"#), None);
    }

    #[test]
    fn requires_webhook_url() {
        assert!(WebhookNotifier::from_settings(&Settings::default()).is_err());

        let settings = Settings {
            notify_webhook_url: Some("https://hooks.example.com/rsi".to_string()),
            notify_webhook_token: Some("secret".to_string()),
            ..Settings::default()
        };
        let notifier = WebhookNotifier::from_settings(&settings).unwrap();
        let headers = notifier.headers().unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer secret");
        assert_eq!(notifier.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn timeout_comes_from_settings() {
        let settings = Settings {
            notify_webhook_url: Some("https://hooks.example.com/rsi".to_string()),
            notify_webhook_timeout_secs: Some(5),
            ..Settings::default()
        };
        let notifier = WebhookNotifier::from_settings(&settings).unwrap();
        assert_eq!(notifier.timeout, Duration::from_secs(5));
    }
}
