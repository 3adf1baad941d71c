use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};

use crate::models::Submission;

// Create a fingerprint (hash of form name + normalized submission)
pub fn fingerprint(submission: &Submission) -> String {
    let mut hasher = Sha256::new();
    hasher.update(submission.form_name());
    // sanitized values only; honeypot and captcha token never reach Submission
    if let Ok(json) = serde_json::to_vec(submission) {
        hasher.update(&json);
    }
    format!("{:x}", hasher.finalize())
}

// Fingerprint state: queued for delivery, or delivered at a given instant
#[derive(Debug, Clone, Copy)]
enum Slot {
    InFlight,
    Delivered(Instant),
}

/// Remembers in-flight and recently delivered submissions so resubmits are not delivered twice.
pub struct SubmissionCache {
    seen: DashMap<String, Slot>, // fingerprint -> state
    ttl: Duration,
}

impl SubmissionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            ttl,
        }
    }

    /// Atomically reserves `key` for delivery. Returns `false` when the same
    /// submission is already in flight or was delivered within the TTL.
    pub fn claim(&self, key: &str) -> bool {
        let ttl = self.ttl;
        // expired deliveries only; in-flight claims are released by their owner
        self.seen.retain(|_, slot| match slot {
            Slot::InFlight => true,
            Slot::Delivered(at) => at.elapsed() < ttl,
        });

        match self.seen.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => match *occupied.get() {
                Slot::Delivered(at) if at.elapsed() >= ttl => {
                    occupied.insert(Slot::InFlight);
                    true
                }
                _ => false,
            },
            Entry::Vacant(vacant) => {
                vacant.insert(Slot::InFlight);
                true
            }
        }
    }

    /// Marks a claimed submission as delivered; duplicates are suppressed for the TTL.
    pub fn complete(&self, key: &str) {
        self.seen
            .insert(key.to_string(), Slot::Delivered(Instant::now()));
    }

    /// Drops a claim after a failed delivery so the sender can retry right away.
    pub fn release(&self, key: &str) {
        self.seen
            .remove_if(key, |_, slot| matches!(slot, Slot::InFlight));
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
