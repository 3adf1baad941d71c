//! Error types for the form API and its upstream providers.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// A single rejected field, reported back to the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Failure talking to the email provider, CAPTCHA provider or webhook.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("unexpected provider response: {0}")]
    Decode(String),
}

/// Passes 2xx responses through; anything else becomes [`DeliveryError::Rejected`].
pub(crate) async fn expect_success(
    res: reqwest::Response,
) -> Result<reqwest::Response, DeliveryError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(DeliveryError::Rejected {
        status: status.as_u16(),
        body,
    })
}

/// Errors surfaced by the form endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("too many requests, retry in {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("invalid submission")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    MalformedJson(String),

    #[error("captcha verification failed")]
    CaptchaFailed,

    #[error("captcha provider error: {0}")]
    CaptchaUnavailable(DeliveryError),

    #[error("upstream provider error: {0}")]
    Upstream(#[from] DeliveryError),

    #[error("service unavailable")]
    Unavailable,

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut retry_after = None;
        let (status, error, detail, fields) = match self {
            ApiError::RateLimited { retry_after: secs } => {
                retry_after = Some(secs);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "too_many_requests",
                    Some(format!("Too many submissions. Please try again in {secs} seconds.")),
                    Vec::new(),
                )
            }
            ApiError::Validation(fields) => {
                (StatusCode::BAD_REQUEST, "invalid_submission", None, fields)
            }
            ApiError::MalformedJson(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg), Vec::new())
            }
            ApiError::CaptchaFailed => (
                StatusCode::BAD_REQUEST,
                "captcha_failed",
                Some("Captcha verification failed. Please try again.".to_string()),
                Vec::new(),
            ),
            ApiError::CaptchaUnavailable(e) => {
                tracing::error!(error = %e, "captcha provider failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "captcha_unavailable",
                    Some("We could not verify the captcha right now. Please try again later.".to_string()),
                    Vec::new(),
                )
            }
            ApiError::Upstream(e) => {
                tracing::error!(error = %e, "upstream provider failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "delivery_failed",
                    Some("We could not deliver your message. Please try again later.".to_string()),
                    Vec::new(),
                )
            }
            ApiError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                None,
                Vec::new(),
            ),
            ApiError::Internal(msg) => {
                tracing::error!(%msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    None,
                    Vec::new(),
                )
            }
        };

        let body = ErrorBody {
            error,
            detail,
            fields,
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
