//! Form intake API for the studio marketing site.
//!
//! Every form endpoint shares one in-memory [`rate_limit::RateLimiter`],
//! validates and sanitizes its payload, drops honeypot hits, optionally
//! verifies a CAPTCHA token and hands accepted submissions to a background
//! delivery worker (email provider and/or webhook).

pub mod cache;
pub mod captcha;
pub mod config;
pub mod email;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod state;
pub mod templates;
pub mod validation;
pub mod webhook;
pub mod worker;

use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;

pub use error::{ApiError, DeliveryError};
pub use rate_limit::{RateLimitResult, RateLimiter, client_identifier};
pub use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api/contact", post(handlers::contact_handler))
        .route("/api/newsletter", post(handlers::newsletter_handler))
        .route("/api/inquiry", post(handlers::inquiry_handler))
        .with_state(state)
}
