//! Shared intake pipeline behind every form endpoint.
//!
//! rate limit -> parse -> honeypot -> validate -> captcha -> dedup -> deliver

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use std::time::Instant;
use tokio::sync::oneshot;

use crate::cache::fingerprint;
use crate::error::{ApiError, FieldError};
use crate::metrics::{
    DELIVERY_LATENCY, DUPLICATES_TOTAL, RATE_LIMIT_KEYS, RATE_LIMITED_TOTAL, SPAM_BLOCKED_TOTAL,
    SUBMISSIONS_TOTAL,
};
use crate::models::{DeliveryJob, SpamFields, Submission, SubmissionAccepted};
use crate::rate_limit::{RatePolicy, client_identifier};
use crate::state::AppState;
use crate::validation::honeypot_triggered;

pub(crate) struct Form<T> {
    pub name: &'static str,
    pub policy: RatePolicy,
    pub validate: fn(&T) -> Result<Submission, Vec<FieldError>>,
    pub success: &'static str,
}

fn rate_limit_headers(limit: u32, remaining: u32) -> [(HeaderName, HeaderValue); 2] {
    [
        (
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderValue::from(limit),
        ),
        (
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderValue::from(remaining),
        ),
    ]
}

pub(crate) async fn handle<T: SpamFields + Send + Sync>(
    state: &AppState,
    headers: &HeaderMap,
    form: Form<T>,
    payload: Result<Json<T>, JsonRejection>,
) -> Response {
    SUBMISSIONS_TOTAL.with_label_values(&[form.name]).inc();

    let client = client_identifier(headers);
    let decision = state
        .rate_limiter
        .check_policy(form.name, &client, form.policy);
    RATE_LIMIT_KEYS.set(state.rate_limiter.len() as f64);
    let rate_headers = rate_limit_headers(form.policy.limit, decision.remaining);

    if !decision.allowed {
        RATE_LIMITED_TOTAL.with_label_values(&[form.name]).inc();
        tracing::warn!(
            form = form.name,
            %client,
            retry_after = decision.retry_after_seconds,
            "rate limit exceeded"
        );
        return (
            rate_headers,
            ApiError::RateLimited {
                retry_after: decision.retry_after_seconds,
            },
        )
            .into_response();
    }

    match accept(state, &client, &form, payload).await {
        Ok(body) => (rate_headers, Json(body)).into_response(),
        Err(e) => (rate_headers, e).into_response(),
    }
}

async fn accept<T: SpamFields + Send + Sync>(
    state: &AppState,
    client: &str,
    form: &Form<T>,
    payload: Result<Json<T>, JsonRejection>,
) -> Result<SubmissionAccepted, ApiError> {
    let Json(payload) = payload.map_err(|rejection| ApiError::MalformedJson(rejection.body_text()))?;

    // bots get a success they cannot tell apart from a real one
    if honeypot_triggered(payload.honeypot()) {
        SPAM_BLOCKED_TOTAL
            .with_label_values(&[form.name, "honeypot"])
            .inc();
        tracing::warn!(form = form.name, %client, "honeypot triggered, dropping submission");
        return Ok(SubmissionAccepted::new(form.success));
    }

    let submission = (form.validate)(&payload).map_err(ApiError::Validation)?;

    if let Some(verifier) = &state.captcha {
        let token = payload
            .captcha_token()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::CaptchaFailed)?;
        let human = verifier
            .verify(token, client)
            .await
            .map_err(ApiError::CaptchaUnavailable)?;
        if !human {
            SPAM_BLOCKED_TOTAL
                .with_label_values(&[form.name, "captcha"])
                .inc();
            return Err(ApiError::CaptchaFailed);
        }
    }

    // claimed before queuing so concurrent resubmits cannot both be delivered
    let key = fingerprint(&submission);
    if !state.dedup.claim(&key) {
        DUPLICATES_TOTAL.with_label_values(&[form.name]).inc();
        tracing::info!(form = form.name, %client, "duplicate submission acknowledged");
        return Ok(SubmissionAccepted::new(form.success));
    }

    match deliver(state, submission).await {
        Ok(()) => {
            state.dedup.complete(&key);
            Ok(SubmissionAccepted::new(form.success))
        }
        Err(e) => {
            state.dedup.release(&key);
            Err(e)
        }
    }
}

async fn deliver(state: &AppState, submission: Submission) -> Result<(), ApiError> {
    let start_time = Instant::now();
    let (response_tx, response_rx) = oneshot::channel();
    state
        .delivery_tx
        .send(DeliveryJob {
            submission,
            response_tx,
        })
        .await
        .map_err(|_| ApiError::Unavailable)?;

    let result = response_rx.await.map_err(|_| ApiError::Unavailable)?;
    DELIVERY_LATENCY.observe(start_time.elapsed().as_secs_f64());
    Ok(result?)
}
