//! End-to-end tests for the form endpoints.
//!
//! Each test boots the router on an ephemeral port with in-process fake
//! providers and drives it with reqwest.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use forms_gateway::captcha::{CaptchaVerifier, HttpCaptchaVerifier};
use forms_gateway::config::Policies;
use forms_gateway::email::EmailSender;
use forms_gateway::models::EmailMessage;
use forms_gateway::rate_limit::{RatePolicy, RateLimiter};
use forms_gateway::templates::Mailbox;
use forms_gateway::worker::{DeliveryTargets, delivery_worker};
use forms_gateway::{AppState, DeliveryError, router};

#[derive(Default)]
struct RecordingEmail {
    sent: Mutex<Vec<EmailMessage>>,
    fail: bool,
    // fail this many attempts before succeeding
    fail_first: AtomicUsize,
    delay: Duration,
}

#[async_trait]
impl EmailSender for RecordingEmail {
    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        tokio::time::sleep(self.delay).await;
        let flaky = self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if self.fail || flaky {
            return Err(DeliveryError::Rejected {
                status: 503,
                body: "provider down".into(),
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

impl RecordingEmail {
    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

/// Accepts exactly the token "human".
struct FakeCaptcha {
    seen_ips: Mutex<Vec<String>>,
}

#[async_trait]
impl CaptchaVerifier for FakeCaptcha {
    async fn verify(&self, token: &str, remote_ip: &str) -> Result<bool, DeliveryError> {
        self.seen_ips.lock().unwrap().push(remote_ip.to_string());
        Ok(token == "human")
    }
}

struct Server {
    base: String,
    email: Arc<RecordingEmail>,
}

async fn spawn_with(
    policies: Policies,
    captcha: Option<Arc<dyn CaptchaVerifier>>,
    email: Arc<RecordingEmail>,
) -> Server {
    let (delivery_tx, delivery_rx) = mpsc::channel(16);
    let targets = DeliveryTargets {
        email: Some(email.clone()),
        webhook: None,
        mailbox: Mailbox {
            from: "forms@studio.example".into(),
            inbox: "hello@studio.example".into(),
        },
    };
    tokio::spawn(delivery_worker(delivery_rx, targets));

    let state = Arc::new(AppState::new(
        RateLimiter::new(),
        policies,
        captcha,
        Duration::from_secs(300),
        delivery_tx,
    ));
    let app = router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Server {
        base: format!("http://{addr}"),
        email,
    }
}

async fn spawn_server() -> Server {
    spawn_with(Policies::default(), None, Arc::default()).await
}

fn contact(message: &str) -> Value {
    json!({
        "name": "Ada Lovelace",
        "email": "ada@example.com",
        "company": "Analytical Engines Ltd",
        "message": message,
        "topic": "project",
    })
}

fn header<'a>(resp: &'a reqwest::Response, name: &str) -> &'a str {
    resp.headers()
        .get(name)
        .unwrap_or_else(|| panic!("missing {name}"))
        .to_str()
        .unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let server = spawn_server().await;
    let resp = Client::new()
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(body["rate_limit_keys"].is_u64());
}

#[tokio::test]
async fn contact_is_delivered_with_rate_limit_headers() {
    let server = spawn_server().await;
    let resp = Client::new()
        .post(format!("{}/api/contact", server.base))
        .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
        .json(&contact("We need a new marketing site by spring."))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(header(&resp, "x-ratelimit-limit"), "5");
    assert_eq!(header(&resp, "x-ratelimit-remaining"), "4");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);

    let sent = server.email.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].reply_to.as_deref(), Some("ada@example.com"));
    assert!(sent[0].text.contains("Topic: project"));
}

#[tokio::test]
async fn sixth_contact_within_window_is_rejected() {
    let server = spawn_server().await;
    let client = Client::new();

    for (i, remaining) in (0..5).rev().enumerate() {
        let resp = client
            .post(format!("{}/api/contact", server.base))
            .header("x-forwarded-for", "203.0.113.9")
            .json(&contact(&format!("Message number {i} about our project.")))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(header(&resp, "x-ratelimit-remaining"), remaining.to_string());
    }

    let resp = client
        .post(format!("{}/api/contact", server.base))
        .header("x-forwarded-for", "203.0.113.9")
        .json(&contact("One message too many for this window."))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 429);
    assert_eq!(header(&resp, "x-ratelimit-remaining"), "0");
    let retry_after: u64 = header(&resp, "retry-after").parse().unwrap();
    assert!((599..=600).contains(&retry_after));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "too_many_requests");

    assert_eq!(server.email.count(), 5);
}

#[tokio::test]
async fn limits_are_per_endpoint_and_per_client() {
    let policy = RatePolicy::new(1, Duration::from_secs(60));
    let policies = Policies {
        contact: policy,
        newsletter: policy,
        inquiry: policy,
    };
    let server = spawn_with(policies, None, Arc::default()).await;
    let client = Client::new();
    let post = |path: &str, ip: &str, body: Value| {
        client
            .post(format!("{}{path}", server.base))
            .header("x-forwarded-for", ip)
            .json(&body)
            .send()
    };

    let msg = contact("Hello there, we would like a quote.");
    assert_eq!(post("/api/contact", "1.2.3.4", msg.clone()).await.unwrap().status(), 200);
    assert_eq!(post("/api/contact", "1.2.3.4", msg.clone()).await.unwrap().status(), 429);
    assert_eq!(post("/api/contact", "5.6.7.8", msg).await.unwrap().status(), 200);

    let signup = json!({"email": "reader@example.com"});
    assert_eq!(post("/api/newsletter", "1.2.3.4", signup).await.unwrap().status(), 200);
}

#[tokio::test]
async fn unidentified_clients_share_one_bucket() {
    let policy = RatePolicy::new(1, Duration::from_secs(60));
    let policies = Policies {
        newsletter: policy,
        ..Policies::default()
    };
    let server = spawn_with(policies, None, Arc::default()).await;
    let client = Client::new();

    let first = client
        .post(format!("{}/api/newsletter", server.base))
        .json(&json!({"email": "one@example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);

    let second = client
        .post(format!("{}/api/newsletter", server.base))
        .json(&json!({"email": "two@example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 429);
}

#[tokio::test]
async fn honeypot_is_acknowledged_but_not_delivered() {
    let server = spawn_server().await;
    let mut body = contact("Cheap watches, click here right now!");
    body["website"] = json!("http://spam.example");

    let resp = Client::new()
        .post(format!("{}/api/contact", server.base))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(server.email.count(), 0);
}

#[tokio::test]
async fn invalid_inquiry_lists_field_errors() {
    let server = spawn_server().await;
    let resp = Client::new()
        .post(format!("{}/api/inquiry", server.base))
        .json(&json!({
            "name": "Grace",
            "email": "grace@",
            "projectType": "web",
            "budget": "undecided",
            "timeline": "yesterday",
            "description": "too short",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    assert_eq!(header(&resp, "x-ratelimit-limit"), "3");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid_submission");
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["email", "timeline", "description"]);
    assert_eq!(server.email.count(), 0);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let server = spawn_server().await;
    let resp = Client::new()
        .post(format!("{}/api/contact", server.base))
        .header("content-type", "application/json")
        .body("{\"name\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn captcha_is_enforced_when_configured() {
    let captcha = Arc::new(FakeCaptcha {
        seen_ips: Mutex::new(Vec::new()),
    });
    let server = spawn_with(Policies::default(), Some(captcha.clone()), Arc::default()).await;
    let client = Client::new();
    let post = |body: Value| {
        client
            .post(format!("{}/api/contact", server.base))
            .header("x-real-ip", "198.51.100.7")
            .json(&body)
            .send()
    };

    let missing = post(contact("No captcha token was attached here.")).await.unwrap();
    assert_eq!(missing.status(), 400);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["error"], "captcha_failed");

    let mut wrong = contact("A robot pretending to be a person.");
    wrong["captchaToken"] = json!("robot");
    assert_eq!(post(wrong).await.unwrap().status(), 400);

    let mut good = contact("A real person with a real project.");
    good["captchaToken"] = json!("human");
    assert_eq!(post(good).await.unwrap().status(), 200);

    assert_eq!(server.email.count(), 1);
    assert_eq!(
        captcha.seen_ips.lock().unwrap().as_slice(),
        &["198.51.100.7".to_string(), "198.51.100.7".to_string()]
    );
}

#[tokio::test]
async fn duplicate_submission_is_delivered_once() {
    let server = spawn_server().await;
    let client = Client::new();
    for _ in 0..2 {
        let resp = client
            .post(format!("{}/api/newsletter", server.base))
            .header("x-forwarded-for", "192.0.2.10")
            .json(&json!({"email": "Reader@Example.com", "source": "blog"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }
    assert_eq!(server.email.count(), 1);
}

#[tokio::test]
async fn provider_failure_is_bad_gateway() {
    let email = Arc::new(RecordingEmail {
        fail: true,
        ..Default::default()
    });
    let server = spawn_with(Policies::default(), None, email).await;
    let resp = Client::new()
        .post(format!("{}/api/contact", server.base))
        .json(&contact("This one will not make it to the inbox."))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "delivery_failed");
}

#[tokio::test]
async fn metrics_are_exposed() {
    let server = spawn_server().await;
    let client = Client::new();
    client
        .post(format!("{}/api/newsletter", server.base))
        .json(&json!({"email": "metrics@example.com"}))
        .send()
        .await
        .unwrap();

    let text = client
        .get(format!("{}/metrics", server.base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(text.contains("forms_submissions_total"));
    assert!(text.contains("forms_rate_limit_keys"));
}

#[tokio::test]
async fn concurrent_identical_submissions_are_delivered_once() {
    let email = Arc::new(RecordingEmail {
        delay: Duration::from_millis(200),
        ..Default::default()
    });
    let server = spawn_with(Policies::default(), None, email).await;
    let client = Client::new();
    let post = || {
        client
            .post(format!("{}/api/newsletter", server.base))
            .header("x-forwarded-for", "192.0.2.20")
            .json(&json!({"email": "twice@example.com"}))
            .send()
    };

    let (first, second) = tokio::join!(post(), post());
    assert_eq!(first.unwrap().status(), 200);
    assert_eq!(second.unwrap().status(), 200);
    assert_eq!(server.email.count(), 1);
}

#[tokio::test]
async fn failed_delivery_can_be_retried_immediately() {
    let email = Arc::new(RecordingEmail {
        fail_first: AtomicUsize::new(1),
        ..Default::default()
    });
    let server = spawn_with(Policies::default(), None, email).await;
    let client = Client::new();
    let body = contact("Please call me back about the redesign.");

    let first = client
        .post(format!("{}/api/contact", server.base))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 502);

    let retry = client
        .post(format!("{}/api/contact", server.base))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(retry.status(), 200);
    assert_eq!(server.email.count(), 1);
}

#[tokio::test]
async fn captcha_provider_outage_is_reported_separately() {
    // bind then drop to get a port nothing listens on
    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = closed.local_addr().unwrap();
    drop(closed);

    let captcha: Arc<dyn CaptchaVerifier> = Arc::new(HttpCaptchaVerifier::new(
        Client::new(),
        format!("http://{addr}/siteverify"),
        "secret".into(),
    ));
    let server = spawn_with(Policies::default(), Some(captcha), Arc::default()).await;

    let mut body = contact("The captcha service is down right now.");
    body["captchaToken"] = json!("token");
    let resp = Client::new()
        .post(format!("{}/api/contact", server.base))
        .json(&body)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "captcha_unavailable");
    assert_eq!(server.email.count(), 0);
}
