//! Email delivery provider client.

use async_trait::async_trait;

use crate::error::{DeliveryError, expect_success};
use crate::models::EmailMessage;

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError>;
}

/// Sends JSON messages to a REST email API authenticated with a bearer key.
pub struct HttpEmailSender {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl HttpEmailSender {
    pub fn new(client: reqwest::Client, api_url: String, api_key: String) -> Self {
        Self {
            client,
            api_url,
            api_key,
        }
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        let res = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(message)
            .send()
            .await?;
        expect_success(res).await?;
        tracing::debug!(subject = %message.subject, "email accepted by provider");
        Ok(())
    }
}
