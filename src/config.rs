use clap::{Parser, ValueEnum};
use std::time::Duration;

use crate::rate_limit::RatePolicy;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "forms-gateway")]
#[command(about = "Rate-limited form intake API for the studio website")]
pub struct Args {
    // Bind address
    #[arg(long, default_value = "0.0.0.0", env = "FORMS_HOST")]
    pub host: String,

    // Port to run the server on
    #[arg(short, long, default_value_t = 8080, env = "FORMS_PORT")]
    pub port: u16,

    // Contact form: max submissions per window
    #[arg(long, default_value_t = 5, env = "FORMS_CONTACT_LIMIT")]
    pub contact_limit: u32,

    // Contact form window in seconds
    #[arg(long, default_value_t = 600, env = "FORMS_CONTACT_WINDOW")]
    pub contact_window: u64,

    #[arg(long, default_value_t = 3, env = "FORMS_NEWSLETTER_LIMIT")]
    pub newsletter_limit: u32,

    #[arg(long, default_value_t = 3600, env = "FORMS_NEWSLETTER_WINDOW")]
    pub newsletter_window: u64,

    #[arg(long, default_value_t = 3, env = "FORMS_INQUIRY_LIMIT")]
    pub inquiry_limit: u32,

    #[arg(long, default_value_t = 600, env = "FORMS_INQUIRY_WINDOW")]
    pub inquiry_window: u64,

    // Email provider endpoint
    #[arg(long, default_value = "https://api.resend.com/emails", env = "FORMS_EMAIL_API_URL")]
    pub email_api_url: String,

    // Email provider API key; email delivery is disabled without it
    #[arg(long, env = "FORMS_EMAIL_API_KEY")]
    pub email_api_key: Option<String>,

    #[arg(long, default_value = "Website <forms@studio.example>", env = "FORMS_EMAIL_FROM")]
    pub email_from: String,

    // Where submissions are sent
    #[arg(long, default_value = "hello@studio.example", env = "FORMS_INBOX")]
    pub inbox: String,

    #[arg(
        long,
        default_value = "https://challenges.cloudflare.com/turnstile/v0/siteverify",
        env = "FORMS_CAPTCHA_VERIFY_URL"
    )]
    pub captcha_verify_url: String,

    // Captcha secret; verification is skipped without it
    #[arg(long, env = "FORMS_CAPTCHA_SECRET")]
    pub captcha_secret: Option<String>,

    #[arg(long, env = "FORMS_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    // Duplicate suppression TTL in seconds
    #[arg(long, default_value_t = 300, env = "FORMS_DEDUP_TTL")]
    pub dedup_ttl: u64,

    // Delivery queue capacity, at least 1
    #[arg(
        long,
        default_value_t = 100,
        env = "FORMS_QUEUE_CAPACITY",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub queue_capacity: u64,

    // Timeout for provider calls in seconds
    #[arg(long, default_value_t = 10, env = "FORMS_UPSTREAM_TIMEOUT")]
    pub upstream_timeout: u64,

    #[arg(long, default_value = "info", env = "FORMS_LOG_LEVEL")]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "FORMS_LOG_FORMAT")]
    pub log_format: LogFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Per-endpoint rate-limit policies.
#[derive(Debug, Clone, Copy)]
pub struct Policies {
    pub contact: RatePolicy,
    pub newsletter: RatePolicy,
    pub inquiry: RatePolicy,
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            contact: RatePolicy::new(5, Duration::from_secs(600)),
            newsletter: RatePolicy::new(3, Duration::from_secs(3600)),
            inquiry: RatePolicy::new(3, Duration::from_secs(600)),
        }
    }
}

impl Args {
    pub fn policies(&self) -> Policies {
        Policies {
            contact: RatePolicy::new(self.contact_limit, Duration::from_secs(self.contact_window)),
            newsletter: RatePolicy::new(
                self.newsletter_limit,
                Duration::from_secs(self.newsletter_window),
            ),
            inquiry: RatePolicy::new(self.inquiry_limit, Duration::from_secs(self.inquiry_window)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_builtin_policies() {
        let args = Args::parse_from(["forms-gateway"]);
        let policies = args.policies();
        let defaults = Policies::default();
        assert_eq!(policies.contact, defaults.contact);
        assert_eq!(policies.newsletter, defaults.newsletter);
        assert_eq!(policies.inquiry, defaults.inquiry);
    }

    #[test]
    fn flags_override_policies() {
        let args = Args::parse_from([
            "forms-gateway",
            "--contact-limit",
            "2",
            "--contact-window",
            "30",
        ]);
        assert_eq!(
            args.policies().contact,
            RatePolicy::new(2, Duration::from_secs(30))
        );
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        assert!(Args::try_parse_from(["forms-gateway", "--queue-capacity", "0"]).is_err());
        let args = Args::try_parse_from(["forms-gateway", "--queue-capacity", "1"]).unwrap();
        assert_eq!(args.queue_capacity, 1);
    }

    #[test]
    fn log_format_is_validated() {
        assert!(Args::try_parse_from(["forms-gateway", "--log-format", "yaml"]).is_err());
        let args = Args::try_parse_from(["forms-gateway", "--log-format", "json"]).unwrap();
        assert_eq!(args.log_format, LogFormat::Json);
        assert_eq!(Args::parse_from(["forms-gateway"]).log_format, LogFormat::Text);
    }
}
