mod discord;
mod telegram;
mod templates;

pub use discord::DiscordWebhookNotifier;
pub use telegram::TelegramNotifier;
pub use templates::MessageTemplate;

use analysis_core::ScoredCompany;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Alert types that trigger notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlertType {
    /// Companies that published results in this batch
    FilingsReleased { names: Vec<String> },
    /// Full analysis for one company
    CompanyResult(Box<ScoredCompany>),
    RerateCandidate { name: String, eps_jump: Option<f64> },
    PositionClosed { name: String, pnl_percent: Option<f64> },
}

impl AlertType {
    fn title(&self) -> String {
        match self {
            AlertType::FilingsReleased { names } => format!("Results released ({})", names.len()),
            AlertType::CompanyResult(scored) => format!(
                "{}: {}",
                scored.company.display_name(),
                scored.recommendation.decision
            ),
            AlertType::RerateCandidate { name, .. } => format!("Rerating candidate: {}", name),
            AlertType::PositionClosed { name, .. } => format!("Position closed: {}", name),
        }
    }
}

/// A notification alert to be dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub title: String,
    pub message: String,
}

impl Alert {
    /// Build an alert whose title and text are rendered from its type.
    pub fn new(alert_type: AlertType) -> Self {
        Self {
            title: alert_type.title(),
            message: MessageTemplate::render(&alert_type),
            alert_type,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError>;
    fn name(&self) -> &str;
}

/// Errors from the notification system.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Telegram error: {0}")]
    Telegram(String),
    #[error("Discord webhook error: {0}")]
    Discord(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Configuration for the notification service.
#[derive(Debug, Clone, Default)]
pub struct NotificationConfig {
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub discord_webhook_url: Option<String>,
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

impl NotificationConfig {
    /// Load from environment variables. `CHAT_ID` is accepted when
    /// `TELEGRAM_CHAT_ID` is unset.
    pub fn from_env() -> Self {
        Self {
            telegram_bot_token: non_empty_env("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: non_empty_env("TELEGRAM_CHAT_ID").or_else(|| non_empty_env("CHAT_ID")),
            discord_webhook_url: non_empty_env("DISCORD_WEBHOOK_URL"),
        }
    }
}

/// Dispatches alerts to all configured channels.
pub struct NotificationService {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl NotificationService {
    pub fn new(config: &NotificationConfig) -> Self {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

        if let (Some(token), Some(chat_id)) = (&config.telegram_bot_token, &config.telegram_chat_id) {
            channels.push(Box::new(TelegramNotifier::new(token.clone(), chat_id.clone())));
            tracing::info!("Telegram notifications enabled");
        }

        if let Some(ref webhook_url) = config.discord_webhook_url {
            channels.push(Box::new(DiscordWebhookNotifier::new(webhook_url.clone())));
            tracing::info!("Discord webhook notifications enabled");
        }

        if channels.is_empty() {
            tracing::info!(
                "No notification channels configured (set TELEGRAM_BOT_TOKEN/TELEGRAM_CHAT_ID or DISCORD_WEBHOOK_URL)"
            );
        }

        Self::with_channels(channels)
    }

    pub fn with_channels(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    /// A service that drops every alert
    pub fn disabled() -> Self {
        Self::with_channels(Vec::new())
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Send alert to all channels, awaiting completion. Channel failures are logged, not returned.
    pub async fn send_alert_async(&self, alert: &Alert) {
        dispatch(&self.channels, alert).await;
    }
}

async fn dispatch(channels: &[Box<dyn NotificationChannel>], alert: &Alert) {
    for channel in channels {
        match channel.send(alert).await {
            Ok(()) => tracing::debug!("Sent notification via {}", channel.name()),
            Err(e) => {
                tracing::warn!("Failed to send notification via {}: {}", channel.name(), e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingChannel {
        sent: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationChannel for CountingChannel {
        async fn send(&self, _alert: &Alert) -> Result<(), NotificationError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(NotificationError::Telegram("boom".into()))
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_failing_channel_does_not_stop_dispatch() {
        let sent = Arc::new(AtomicUsize::new(0));
        let service = NotificationService::with_channels(vec![
            Box::new(CountingChannel { sent: sent.clone(), fail: true }),
            Box::new(CountingChannel { sent: sent.clone(), fail: false }),
        ]);

        let alert = Alert::new(AlertType::FilingsReleased { names: vec!["TCS".into()] });
        service.send_alert_async(&alert).await;
        assert_eq!(sent.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_service_without_config_has_no_channels() {
        let service = NotificationService::new(&NotificationConfig::default());
        assert_eq!(service.channel_count(), 0);

        let config = NotificationConfig {
            telegram_bot_token: Some("token".into()),
            telegram_chat_id: None,
            discord_webhook_url: Some("http://localhost/hook".into()),
        };
        assert_eq!(NotificationService::new(&config).channel_count(), 1);
    }

    #[test]
    fn test_alert_title() {
        let alert = Alert::new(AlertType::PositionClosed { name: "MEIL".into(), pnl_percent: Some(12.5) });
        assert_eq!(alert.title, "Position closed: MEIL");
        assert!(alert.message.contains("12.50%"));
    }
}
