//! Webhook status alerts.
//!
//! Posts short status messages to per-channel webhooks (Slack-compatible
//! `{"text": ...}` payloads). Channels are a closed set so a typo'd channel
//! is a compile error at the call site and a configuration error when
//! loaded from file.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::config::AlertSettings;

/// Supported alert channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertChannel {
    Standard,
    Subscription,
    I18nSubscription,
    I18nNotification,
    PushNotification,
}

impl AlertChannel {
    pub const ALL: [AlertChannel; 5] = [
        AlertChannel::Standard,
        AlertChannel::Subscription,
        AlertChannel::I18nSubscription,
        AlertChannel::I18nNotification,
        AlertChannel::PushNotification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertChannel::Standard => "standard",
            AlertChannel::Subscription => "subscription",
            AlertChannel::I18nSubscription => "i18nSubscription",
            AlertChannel::I18nNotification => "i18nNotification",
            AlertChannel::PushNotification => "pushNotification",
        }
    }
}

impl fmt::Display for AlertChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertChannel {
    type Err = AlertError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|channel| channel.as_str() == value)
            .ok_or_else(|| AlertError::UnknownChannel {
                name: value.to_string(),
            })
    }
}

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("unknown alert channel `{name}`")]
    UnknownChannel { name: String },
    #[error("no webhook configured for channel `{channel}`")]
    MissingWebhook { channel: AlertChannel },
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Sends status messages to configured channel webhooks.
pub struct StatusAlert {
    client: reqwest::Client,
    service: String,
    webhooks: HashMap<AlertChannel, String>,
}

impl StatusAlert {
    /// `service` prefixes every message so receivers can tell senders apart.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            service: service.into(),
            webhooks: HashMap::new(),
        }
    }

    pub fn from_settings(settings: &AlertSettings) -> Self {
        let service = settings
            .service
            .clone()
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
        let mut alert = Self::new(service);
        for (channel, url) in &settings.webhooks {
            alert.set_webhook(*channel, url.clone());
        }
        alert
    }

    /// Associate a channel with a webhook endpoint, replacing any previous
    /// association.
    pub fn set_webhook(&mut self, channel: AlertChannel, url: impl Into<String>) {
        self.webhooks.insert(channel, url.into());
    }

    pub fn webhook(&self, channel: AlertChannel) -> Option<&str> {
        self.webhooks.get(&channel).map(String::as_str)
    }

    /// Post `message` to the channel's webhook as `<service> - <message>`.
    pub async fn send(&self, channel: AlertChannel, message: &str) -> Result<(), AlertError> {
        let endpoint = self
            .webhook(channel)
            .ok_or(AlertError::MissingWebhook { channel })?;

        let payload = json!({
            "text": format!("{} - {}", self.service, message),
        });

        self.client
            .post(endpoint)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        info!(channel = %channel, "status alert delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names_round_trip() {
        for channel in AlertChannel::ALL {
            assert_eq!(
                AlertChannel::from_str(channel.as_str()).expect("known channel"),
                channel
            );
        }
    }

    #[test]
    fn unknown_channel_name_is_rejected() {
        assert!(matches!(
            AlertChannel::from_str("broadcast"),
            Err(AlertError::UnknownChannel { .. })
        ));
    }

    #[test]
    fn set_webhook_replaces_previous_url() {
        let mut alert = StatusAlert::new("billing");
        alert.set_webhook(AlertChannel::Standard, "https://hooks.test/a");
        alert.set_webhook(AlertChannel::Standard, "https://hooks.test/b");
        assert_eq!(
            alert.webhook(AlertChannel::Standard),
            Some("https://hooks.test/b")
        );
    }

    #[tokio::test]
    async fn send_without_webhook_is_an_error() {
        let alert = StatusAlert::new("billing");
        let result = alert.send(AlertChannel::Standard, "db down").await;
        assert!(matches!(result, Err(AlertError::MissingWebhook { .. })));
    }
}
