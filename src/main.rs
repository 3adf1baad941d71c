use clap::Parser; // for cli
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use forms_gateway::captcha::{CaptchaVerifier, HttpCaptchaVerifier};
use forms_gateway::config::{Args, LogFormat};
use forms_gateway::email::{EmailSender, HttpEmailSender};
use forms_gateway::models::DeliveryJob;
use forms_gateway::rate_limit::RateLimiter;
use forms_gateway::templates::Mailbox;
use forms_gateway::webhook::{HttpWebhookNotifier, WebhookNotifier};
use forms_gateway::worker::{DeliveryTargets, delivery_worker};
use forms_gateway::{AppState, router};

fn init_tracing(args: &Args) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.log_format == LogFormat::Json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

// this is main async function with tokio
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // parse cli arguments
    let args = Args::parse();
    init_tracing(&args);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.upstream_timeout))
        .build()?;

    let email: Option<Arc<dyn EmailSender>> = args.email_api_key.clone().map(|key| {
        Arc::new(HttpEmailSender::new(client.clone(), args.email_api_url.clone(), key))
            as Arc<dyn EmailSender>
    });
    let webhook: Option<Arc<dyn WebhookNotifier>> = args.webhook_url.clone().map(|url| {
        Arc::new(HttpWebhookNotifier::new(client.clone(), url)) as Arc<dyn WebhookNotifier>
    });
    let captcha: Option<Arc<dyn CaptchaVerifier>> = args.captcha_secret.clone().map(|secret| {
        Arc::new(HttpCaptchaVerifier::new(
            client.clone(),
            args.captcha_verify_url.clone(),
            secret,
        )) as Arc<dyn CaptchaVerifier>
    });

    let capacity = usize::try_from(args.queue_capacity)?;
    let (delivery_tx, delivery_rx) = mpsc::channel::<DeliveryJob>(capacity);

    // spawn the background worker
    let targets = DeliveryTargets {
        email,
        webhook,
        mailbox: Mailbox {
            from: args.email_from.clone(),
            inbox: args.inbox.clone(),
        },
    };
    tokio::spawn(delivery_worker(delivery_rx, targets));

    // creating shared state
    let policies = args.policies();
    let state = Arc::new(AppState::new(
        RateLimiter::new(),
        policies,
        captcha,
        Duration::from_secs(args.dedup_ttl),
        delivery_tx,
    ));

    let app = router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(%addr, version = env!("CARGO_PKG_VERSION"), "forms gateway listening");
    tracing::info!(
        contact = ?policies.contact,
        newsletter = ?policies.newsletter,
        inquiry = ?policies.inquiry,
        captcha = args.captcha_secret.is_some(),
        "rate limits configured"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("forms gateway shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install signal handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
