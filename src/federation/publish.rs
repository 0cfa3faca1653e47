//! Periodic publishing
//!
//! Every cycle wraps a timestamp Note in a Create and delivers it to each
//! follower registered at the start of the cycle. An inbox that fails is
//! dropped from the registry.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::MissedTickBehavior;

use super::actor::Actor;
use super::delivery::{ActivityDelivery, DeliveryResult, builder};
use crate::data::FollowerRegistry;
use crate::error::AppError;

/// Outbound delivery loop
#[derive(Debug, Clone)]
pub struct Publisher {
    local_actor: Arc<Actor>,
    followers: Arc<FollowerRegistry>,
    delivery: Arc<ActivityDelivery>,
    interval: Duration,
}

impl Publisher {
    pub fn new(
        local_actor: Arc<Actor>,
        followers: Arc<FollowerRegistry>,
        delivery: Arc<ActivityDelivery>,
        interval: Duration,
    ) -> Self {
        Self {
            local_actor,
            followers,
            delivery,
            interval,
        }
    }

    /// The Create sent to `inboxes` this cycle.
    pub fn build_activity(&self, inboxes: &[String]) -> Value {
        let note_id = format!("{}/notes/{}", self.local_actor.id, uuid::Uuid::new_v4());
        let content = format!("The time is {}", chrono::Utc::now().to_rfc3339());

        builder::create(
            &self.local_actor.id,
            builder::note(&note_id, &content, inboxes),
        )
    }

    /// Run one delivery cycle.
    ///
    /// Returns one result per follower in the snapshot; an empty registry
    /// returns immediately without touching the network.
    ///
    /// # Errors
    /// Only when the Create fails the outbound gate, in which case nothing
    /// is sent and nobody is evicted.
    pub async fn publish_once(&self) -> Result<Vec<DeliveryResult>, AppError> {
        let inboxes = self.followers.snapshot();
        if inboxes.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!(followers = inboxes.len(), "Publishing to {:?}", inboxes);

        let activity = self.build_activity(&inboxes);
        self.delivery.validate(&activity)?;

        let mut results = Vec::with_capacity(inboxes.len());
        for inbox in &inboxes {
            let outcome = self.delivery.post(inbox, &activity).await;

            if let Err(error) = &outcome {
                if error.is_connection_error() {
                    tracing::warn!(inbox = %inbox, error = %error, "Follower unreachable");
                } else {
                    tracing::error!(inbox = %inbox, error = %error, details = ?error, "Delivery failed");
                }
                tracing::warn!(inbox = %inbox, "Removing inbox from followers");
                // Already gone if an Undo or another cycle removed it first.
                self.followers.remove_by_inbox(inbox);
            }

            results.push(DeliveryResult::new(inbox, &outcome));
        }

        let failed = results.iter().filter(|r| !r.success).count();
        tracing::debug!(
            delivered = results.len() - failed,
            failed,
            "Publish cycle complete"
        );

        Ok(results)
    }

    /// Publish every `interval` until the task is aborted.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(error) = self.publish_once().await {
                tracing::error!(error = %error, "Publish cycle aborted");
            }
        }
    }
}
