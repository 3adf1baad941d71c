use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::response::Response;
use std::sync::Arc;

use super::intake::{Form, handle};
use crate::models::{ContactSubmission, NewsletterSubscription, ProjectInquiry, Submission};
use crate::state::AppState;
use crate::validation::{validate_contact, validate_inquiry, validate_newsletter};

pub async fn contact_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ContactSubmission>, JsonRejection>,
) -> Response {
    let form = Form {
        name: "contact",
        policy: state.policies.contact,
        validate: |c: &ContactSubmission| validate_contact(c).map(Submission::Contact),
        success: "Thanks for reaching out. We'll get back to you shortly.",
    };
    handle(&state, &headers, form, payload).await
}

pub async fn newsletter_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<NewsletterSubscription>, JsonRejection>,
) -> Response {
    let form = Form {
        name: "newsletter",
        policy: state.policies.newsletter,
        validate: |s: &NewsletterSubscription| validate_newsletter(s).map(Submission::Newsletter),
        success: "You're subscribed.",
    };
    handle(&state, &headers, form, payload).await
}

pub async fn inquiry_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ProjectInquiry>, JsonRejection>,
) -> Response {
    let form = Form {
        name: "inquiry",
        policy: state.policies.inquiry,
        validate: |i: &ProjectInquiry| validate_inquiry(i).map(Submission::Inquiry),
        success: "Thanks! We'll review your project and reply within two business days.",
    };
    handle(&state, &headers, form, payload).await
}
