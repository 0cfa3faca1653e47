//! Outbound follow handshake
//!
//! Sends one Follow per configured target after a startup delay, retrying
//! only while the target cannot be reached.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::actor::{Actor, ActorDirectory};
use super::delivery::{ActivityDelivery, builder};
use crate::error::AppError;
use crate::metrics::FOLLOW_ATTEMPTS_TOTAL;

/// How a follow handshake ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowOutcome {
    /// Follow delivered; carries its activity id
    Sent(String),
    /// Target profile has no inbox
    NoInbox,
    /// Target stayed unreachable for the whole attempt budget
    Exhausted,
}

/// Follow-request initiator
#[derive(Debug, Clone)]
pub struct FollowRequester {
    local_actor: Arc<Actor>,
    directory: ActorDirectory,
    delivery: Arc<ActivityDelivery>,
    initial_delay: Duration,
    retry_delay: Duration,
    max_attempts: u32,
}

impl FollowRequester {
    pub fn new(
        local_actor: Arc<Actor>,
        directory: ActorDirectory,
        delivery: Arc<ActivityDelivery>,
    ) -> Self {
        Self {
            local_actor,
            directory,
            delivery,
            initial_delay: Duration::from_secs(2),
            retry_delay: Duration::from_secs(2),
            max_attempts: 10_000,
        }
    }

    pub fn with_delays(mut self, initial_delay: Duration, retry_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Wait the initial delay, then follow `target`, logging how it ended.
    pub async fn send_follow(&self, target: &str) {
        tracing::info!(actor = %target, delay = ?self.initial_delay, "Waiting to send Follow");
        tokio::time::sleep(self.initial_delay).await;

        match self.follow(target).await {
            Ok(FollowOutcome::Sent(follow_id)) => {
                tracing::info!(actor = %target, follow_id = %follow_id, "Sent Follow request");
            }
            // Both already logged where they happened.
            Ok(FollowOutcome::NoInbox) | Ok(FollowOutcome::Exhausted) => {}
            Err(error) => {
                tracing::error!(actor = %target, error = %error, details = ?error, "Follow request failed");
            }
        }
    }

    /// Follow `target`, retrying connection failures up to the attempt budget.
    ///
    /// # Errors
    /// Any failure other than an unreachable target ends the handshake at once.
    pub async fn follow(&self, target: &str) -> Result<FollowOutcome, AppError> {
        let mut remaining = self.max_attempts;

        loop {
            tracing::info!(actor = %target, remaining, "Requesting to Follow");

            match self.attempt(target).await {
                Ok(outcome) => {
                    let label = match outcome {
                        FollowOutcome::Sent(_) => "sent",
                        _ => "no_inbox",
                    };
                    FOLLOW_ATTEMPTS_TOTAL.with_label_values(&[label]).inc();
                    return Ok(outcome);
                }
                Err(error) if error.is_transient() => {
                    FOLLOW_ATTEMPTS_TOTAL.with_label_values(&["retry"]).inc();
                    remaining = remaining.saturating_sub(1);
                    if remaining == 0 {
                        FOLLOW_ATTEMPTS_TOTAL.with_label_values(&["exhausted"]).inc();
                        return Ok(FollowOutcome::Exhausted);
                    }
                    tracing::warn!(actor = %target, error = %error, "Connection failed, retrying...");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(error) => {
                    FOLLOW_ATTEMPTS_TOTAL.with_label_values(&["failed"]).inc();
                    return Err(error);
                }
            }
        }
    }

    async fn attempt(&self, target: &str) -> Result<FollowOutcome, AppError> {
        let profile = self.directory.fetch_document(target).await?;

        let Some(inbox) = profile.get("inbox").and_then(Value::as_str) else {
            tracing::error!(actor = %target, profile = %profile, "No inbox");
            return Ok(FollowOutcome::NoInbox);
        };

        let follow_id = format!("{}/{}", self.local_actor.id, uuid::Uuid::new_v4());
        let follow = builder::follow(&follow_id, &self.local_actor.id, target);
        self.delivery.deliver(inbox, &follow).await?;

        Ok(FollowOutcome::Sent(follow_id))
    }
}
