use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::DeliveryError;

// Contact form payload as posted by the site
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub topic: Option<String>,
    // honeypot, hidden from humans
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub captcha_token: Option<String>,
}

// Newsletter sign-up payload
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewsletterSubscription {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub captcha_token: Option<String>,
}

// "Start a project" payload
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInquiry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub project_type: String,
    #[serde(default)]
    pub budget: String,
    #[serde(default)]
    pub timeline: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub captcha_token: Option<String>,
}

/// Access to the anti-spam fields every form carries.
pub trait SpamFields {
    fn honeypot(&self) -> Option<&str>;
    fn captcha_token(&self) -> Option<&str>;
}

macro_rules! impl_spam_fields {
    ($($ty:ty),*) => {
        $(impl SpamFields for $ty {
            fn honeypot(&self) -> Option<&str> {
                self.website.as_deref()
            }

            fn captcha_token(&self) -> Option<&str> {
                self.captcha_token.as_deref()
            }
        })*
    };
}

impl_spam_fields!(ContactSubmission, NewsletterSubscription, ProjectInquiry);

// Validated, sanitized contact form
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub subject: Option<String>,
    pub message: String,
    pub topic: String,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    pub email: String,
    pub name: Option<String>,
    pub source: Option<String>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Inquiry {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub project_type: String,
    pub budget: String,
    pub timeline: String,
    pub description: String,
}

/// A submission that passed validation and is ready for delivery.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "form", content = "data", rename_all = "lowercase")]
pub enum Submission {
    Contact(Contact),
    Newsletter(Subscription),
    Inquiry(Inquiry),
}

impl Submission {
    pub fn form_name(&self) -> &'static str {
        match self {
            Submission::Contact(_) => "contact",
            Submission::Newsletter(_) => "newsletter",
            Submission::Inquiry(_) => "inquiry",
        }
    }

    pub fn submitter_email(&self) -> &str {
        match self {
            Submission::Contact(c) => &c.email,
            Submission::Newsletter(s) => &s.email,
            Submission::Inquiry(i) => &i.email,
        }
    }
}

// Outbound message for the email provider
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct SubmissionAccepted {
    pub success: bool,
    pub message: String,
}

impl SubmissionAccepted {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

// Queued delivery - holds submission + response channel
pub struct DeliveryJob {
    pub submission: Submission,
    pub response_tx: oneshot::Sender<Result<(), DeliveryError>>, // one-time channel back to the handler
}
