//! Optional JSON webhook notified of every delivered submission.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{DeliveryError, expect_success};
use crate::models::Submission;

#[async_trait]
pub trait WebhookNotifier: Send + Sync {
    async fn notify(&self, submission: &Submission) -> Result<(), DeliveryError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload<'a> {
    #[serde(flatten)]
    submission: &'a Submission,
    submitted_at: String,
}

pub struct HttpWebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpWebhookNotifier {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl WebhookNotifier for HttpWebhookNotifier {
    async fn notify(&self, submission: &Submission) -> Result<(), DeliveryError> {
        let payload = WebhookPayload {
            submission,
            submitted_at: chrono::Utc::now().to_rfc3339(),
        };
        let res = self.client.post(&self.url).json(&payload).send().await?;
        expect_success(res).await?;
        Ok(())
    }
}
