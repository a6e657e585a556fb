use analysis_core::Decision;
use async_trait::async_trait;

use crate::{Alert, AlertType, NotificationChannel, NotificationError};

/// Discord webhook notifier.
pub struct DiscordWebhookNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl DiscordWebhookNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }
}

fn embed_color(alert_type: &AlertType) -> u32 {
    match alert_type {
        AlertType::FilingsReleased { .. } => 0x0099ff,
        AlertType::CompanyResult(scored) => match scored.recommendation.decision {
            Decision::Buy => 0x00ff00,
            Decision::Sell => 0xff0000,
            Decision::Hold => 0x999999,
        },
        AlertType::RerateCandidate { .. } => 0xff6600,
        AlertType::PositionClosed { pnl_percent, .. } => {
            if pnl_percent.unwrap_or(0.0) >= 0.0 {
                0x00ff00
            } else {
                0xff0000
            }
        }
    }
}

#[async_trait]
impl NotificationChannel for DiscordWebhookNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        let payload = serde_json::json!({
            "embeds": [{
                "title": alert.title,
                "description": alert.message,
                "color": embed_color(&alert.alert_type),
                "timestamp": alert.timestamp.to_rfc3339(),
            }]
        });

        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| NotificationError::Discord(e.to_string()))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "discord-webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_send_posts_embed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = DiscordWebhookNotifier::new(format!("{}/hook", server.uri()));
        let alert = Alert::new(AlertType::PositionClosed { name: "MEIL".into(), pnl_percent: Some(-3.0) });
        notifier.send(&alert).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["embeds"][0]["title"], "Position closed: MEIL");
        assert_eq!(body["embeds"][0]["color"], 0xff0000);
    }

    #[tokio::test]
    async fn test_send_fails_on_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let notifier = DiscordWebhookNotifier::new(format!("{}/hook", server.uri()));
        let alert = Alert::new(AlertType::FilingsReleased { names: vec![] });
        assert!(matches!(notifier.send(&alert).await, Err(NotificationError::Discord(_))));
    }
}
