//! Payload validation and sanitization for the public forms.

use crate::error::FieldError;
use crate::models::{
    Contact, ContactSubmission, Inquiry, NewsletterSubscription, ProjectInquiry, Subscription,
};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_COMPANY_LEN: usize = 100;
pub const MAX_SUBJECT_LEN: usize = 150;
pub const MAX_BODY_LEN: usize = 5000;
pub const MIN_MESSAGE_LEN: usize = 10;
pub const MIN_DESCRIPTION_LEN: usize = 20;

pub const CONTACT_TOPICS: &[&str] = &["general", "project", "partnership", "careers", "press"];
pub const NEWSLETTER_SOURCES: &[&str] = &["footer", "blog", "product", "popup"];
pub const PROJECT_TYPES: &[&str] = &["web", "mobile", "product-design", "ai", "consulting", "other"];
pub const BUDGETS: &[&str] = &[
    "under-10k",
    "10k-25k",
    "25k-50k",
    "50k-100k",
    "100k-plus",
    "undecided",
];
pub const TIMELINES: &[&str] = &["asap", "1-3-months", "3-6-months", "flexible"];

/// True when the hidden honeypot field was filled in.
pub fn honeypot_triggered(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// Single-line field: control characters removed, surrounding whitespace trimmed.
pub fn sanitize_line(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Multi-line field: CRLF normalised, control characters other than newline and tab removed.
pub fn sanitize_multiline(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .chars()
        .filter(|c| *c == '\n' || *c == '\t' || !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Loose structural check: `local@domain.tld`, no whitespace, sane lengths.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > 64 || local.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty() || l.starts_with('-') || l.ends_with('-')) {
        return false;
    }
    labels
        .last()
        .is_some_and(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
}

// Collects every field problem instead of stopping at the first one
#[derive(Default)]
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn required(&mut self, field: &'static str, raw: &str, min: usize, max: usize, multiline: bool) -> String {
        let value = if multiline {
            sanitize_multiline(raw)
        } else {
            sanitize_line(raw)
        };
        let len = value.chars().count();
        if len == 0 {
            self.errors.push(FieldError::new(field, "is required"));
        } else if len < min {
            self.errors
                .push(FieldError::new(field, format!("must be at least {min} characters")));
        } else if len > max {
            self.errors
                .push(FieldError::new(field, format!("must be at most {max} characters")));
        }
        value
    }

    fn optional(&mut self, field: &'static str, raw: Option<&str>, max: usize) -> Option<String> {
        let value = sanitize_line(raw?);
        if value.is_empty() {
            return None;
        }
        if value.chars().count() > max {
            self.errors
                .push(FieldError::new(field, format!("must be at most {max} characters")));
        }
        Some(value)
    }

    fn email(&mut self, field: &'static str, raw: &str) -> String {
        let value = sanitize_line(raw).to_lowercase();
        if value.is_empty() {
            self.errors.push(FieldError::new(field, "is required"));
        } else if !is_valid_email(&value) {
            self.errors
                .push(FieldError::new(field, "must be a valid email address"));
        }
        value
    }

    fn one_of(&mut self, field: &'static str, raw: &str, allowed: &[&str]) -> String {
        let value = sanitize_line(raw).to_lowercase();
        if value.is_empty() {
            self.errors.push(FieldError::new(field, "is required"));
        } else if !allowed.contains(&value.as_str()) {
            self.errors.push(FieldError::new(
                field,
                format!("must be one of: {}", allowed.join(", ")),
            ));
        }
        value
    }

    fn finish<T>(self, value: T) -> Result<T, Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self.errors)
        }
    }
}

pub fn validate_contact(input: &ContactSubmission) -> Result<Contact, Vec<FieldError>> {
    let mut check = Checker::default();
    let name = check.required("name", &input.name, 1, MAX_NAME_LEN, false);
    let email = check.email("email", &input.email);
    let company = check.optional("company", input.company.as_deref(), MAX_COMPANY_LEN);
    let subject = check.optional("subject", input.subject.as_deref(), MAX_SUBJECT_LEN);
    let message = check.required("message", &input.message, MIN_MESSAGE_LEN, MAX_BODY_LEN, true);
    let topic = match input.topic.as_deref().map(str::trim) {
        None | Some("") => "general".to_string(),
        Some(t) => check.one_of("topic", t, CONTACT_TOPICS),
    };

    check.finish(Contact {
        name,
        email,
        company,
        subject,
        message,
        topic,
    })
}

pub fn validate_newsletter(input: &NewsletterSubscription) -> Result<Subscription, Vec<FieldError>> {
    let mut check = Checker::default();
    let email = check.email("email", &input.email);
    let name = check.optional("name", input.name.as_deref(), MAX_NAME_LEN);
    let source = match input.source.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) => Some(check.one_of("source", s, NEWSLETTER_SOURCES)),
    };

    check.finish(Subscription {
        email,
        name,
        source,
    })
}

pub fn validate_inquiry(input: &ProjectInquiry) -> Result<Inquiry, Vec<FieldError>> {
    let mut check = Checker::default();
    let name = check.required("name", &input.name, 1, MAX_NAME_LEN, false);
    let email = check.email("email", &input.email);
    let company = check.optional("company", input.company.as_deref(), MAX_COMPANY_LEN);
    let project_type = check.one_of("projectType", &input.project_type, PROJECT_TYPES);
    let budget = check.one_of("budget", &input.budget, BUDGETS);
    let timeline = check.one_of("timeline", &input.timeline, TIMELINES);
    let description = check.required(
        "description",
        &input.description,
        MIN_DESCRIPTION_LEN,
        MAX_BODY_LEN,
        true,
    );

    check.finish(Inquiry {
        name,
        email,
        company,
        project_type,
        budget,
        timeline,
        description,
    })
}
