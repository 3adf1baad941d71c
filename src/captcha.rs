//! CAPTCHA token verification (siteverify-style providers).

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{DeliveryError, expect_success};
use crate::rate_limit::UNKNOWN_CLIENT;

#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Returns whether the provider accepted `token` for the client at `remote_ip`.
    async fn verify(&self, token: &str, remote_ip: &str) -> Result<bool, DeliveryError>;
}

#[derive(Deserialize)]
struct VerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

pub struct HttpCaptchaVerifier {
    client: reqwest::Client,
    verify_url: String,
    secret: String,
}

impl HttpCaptchaVerifier {
    pub fn new(client: reqwest::Client, verify_url: String, secret: String) -> Self {
        Self {
            client,
            verify_url,
            secret,
        }
    }
}

#[async_trait]
impl CaptchaVerifier for HttpCaptchaVerifier {
    async fn verify(&self, token: &str, remote_ip: &str) -> Result<bool, DeliveryError> {
        let mut form = vec![("secret", self.secret.as_str()), ("response", token)];
        if remote_ip != UNKNOWN_CLIENT {
            form.push(("remoteip", remote_ip));
        }

        let res = self.client.post(&self.verify_url).form(&form).send().await?;
        let body: VerifyResponse = expect_success(res)
            .await?
            .json()
            .await
            .map_err(|e| DeliveryError::Decode(e.to_string()))?;

        if !body.success {
            tracing::info!(codes = ?body.error_codes, "captcha token rejected");
        }
        Ok(body.success)
    }
}
