use async_trait::async_trait;

use crate::{Alert, NotificationChannel, NotificationError};

const API_BASE: &str = "https://api.telegram.org";

/// Sends alert text to one chat through the Bot API `sendMessage` method.
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            bot_token,
            chat_id,
            api_base: API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl NotificationChannel for TelegramNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": alert.message,
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::Telegram(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotificationError::Telegram(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "telegram"
    }
}
