use std::sync::Arc;
use tokio::sync::mpsc;

use crate::email::EmailSender;
use crate::error::DeliveryError;
use crate::metrics::DELIVERY_FAILURES_TOTAL;
use crate::models::{DeliveryJob, Submission};
use crate::templates::{Mailbox, render};
use crate::webhook::WebhookNotifier;

/// Where accepted submissions end up.
pub struct DeliveryTargets {
    pub email: Option<Arc<dyn EmailSender>>,
    pub webhook: Option<Arc<dyn WebhookNotifier>>,
    pub mailbox: Mailbox,
}

impl DeliveryTargets {
    async fn deliver(&self, submission: &Submission) -> Result<(), DeliveryError> {
        let form = submission.form_name();

        if self.email.is_none() && self.webhook.is_none() {
            tracing::warn!(form, "no delivery target configured, submission only logged");
            tracing::info!(form, submission = ?submission, "submission received");
            return Ok(());
        }

        if let Some(email) = &self.email {
            let message = render(submission, &self.mailbox);
            if let Err(e) = email.send(&message).await {
                DELIVERY_FAILURES_TOTAL.with_label_values(&["email"]).inc();
                tracing::error!(form, error = %e, "email delivery failed");
                return Err(e);
            }
        }

        if let Some(webhook) = &self.webhook {
            if let Err(e) = webhook.notify(submission).await {
                DELIVERY_FAILURES_TOTAL.with_label_values(&["webhook"]).inc();
                tracing::error!(form, error = %e, "webhook delivery failed");
                return Err(e);
            }
        }

        tracing::info!(form, "submission delivered");
        Ok(())
    }
}

pub async fn delivery_worker(mut rx: mpsc::Receiver<DeliveryJob>, targets: DeliveryTargets) {
    tracing::info!(
        email = targets.email.is_some(),
        webhook = targets.webhook.is_some(),
        "delivery worker started"
    );

    // keep receiving jobs from the queue
    while let Some(job) = rx.recv().await {
        let result = targets.deliver(&job.submission).await;
        // handler may have gone away; nothing left to report to
        let _ = job.response_tx.send(result);
    }

    tracing::info!("delivery queue closed, worker exiting");
}
