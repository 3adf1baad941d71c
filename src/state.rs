use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::cache::SubmissionCache;
use crate::captcha::CaptchaVerifier;
use crate::config::Policies;
use crate::models::DeliveryJob;
use crate::rate_limit::RateLimiter;
// app's shared state

pub struct AppState {
    pub rate_limiter: RateLimiter,                    // one store for every form endpoint
    pub policies: Policies,                           // per-endpoint limit + window
    pub captcha: Option<Arc<dyn CaptchaVerifier>>,    // None = verification disabled
    pub dedup: SubmissionCache,                       // recently delivered fingerprints
    pub delivery_tx: mpsc::Sender<DeliveryJob>,
}

impl AppState {
    pub fn new(
        rate_limiter: RateLimiter,
        policies: Policies,
        captcha: Option<Arc<dyn CaptchaVerifier>>,
        dedup_ttl: Duration,
        delivery_tx: mpsc::Sender<DeliveryJob>,
    ) -> Self {
        Self {
            rate_limiter,
            policies,
            captcha,
            dedup: SubmissionCache::new(dedup_ttl),
            delivery_tx,
        }
    }
}
