use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Gauge, Histogram, register_counter_vec, register_gauge, register_histogram,
};

lazy_static! {
    pub static ref SUBMISSIONS_TOTAL: CounterVec = register_counter_vec!(
        "forms_submissions_total",
        "Form submissions received",
        &["form"]
    )
    .unwrap();
    pub static ref RATE_LIMITED_TOTAL: CounterVec = register_counter_vec!(
        "forms_rate_limited_total",
        "Submissions rejected by the rate limiter",
        &["form"]
    )
    .unwrap();
    pub static ref SPAM_BLOCKED_TOTAL: CounterVec = register_counter_vec!(
        "forms_spam_blocked_total",
        "Submissions dropped by the honeypot or captcha",
        &["form", "reason"]
    )
    .unwrap();
    pub static ref DUPLICATES_TOTAL: CounterVec = register_counter_vec!(
        "forms_duplicates_total",
        "Resubmissions acknowledged without delivery",
        &["form"]
    )
    .unwrap();
    pub static ref DELIVERY_FAILURES_TOTAL: CounterVec = register_counter_vec!(
        "forms_delivery_failures_total",
        "Failed deliveries to email or webhook",
        &["target"]
    )
    .unwrap();
    pub static ref DELIVERY_LATENCY: Histogram = register_histogram!(
        "forms_delivery_latency_seconds",
        "Time from enqueue to delivery outcome in seconds"
    )
    .unwrap();
    pub static ref RATE_LIMIT_KEYS: Gauge = register_gauge!(
        "forms_rate_limit_keys",
        "Rate-limit buckets currently held in memory"
    )
    .unwrap();
}
