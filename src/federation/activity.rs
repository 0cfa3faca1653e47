//! Activity processing
//!
//! Handles activities POSTed to the local inbox.

use std::sync::Arc;

use serde_json::Value;

use super::actor::{Actor, ActorDirectory};
use super::delivery::{ActivityDelivery, builder};
use super::schema::SchemaValidator;
use crate::data::FollowerRegistry;
use crate::error::AppError;
use crate::metrics::ACTIVITIES_RECEIVED;

/// Activity types the node understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityType {
    Follow,
    Accept,
    Reject,
    Undo,
    Create,
}

impl ActivityType {
    /// Parse activity type from string (case-sensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Follow" => Some(Self::Follow),
            "Accept" => Some(Self::Accept),
            "Reject" => Some(Self::Reject),
            "Undo" => Some(Self::Undo),
            "Create" => Some(Self::Create),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Follow => "Follow",
            Self::Accept => "Accept",
            Self::Reject => "Reject",
            Self::Undo => "Undo",
            Self::Create => "Create",
        }
    }
}

/// Activity processor
///
/// Keeps the follower registry in step with inbound Follow and Undo
/// activities, answering each Follow with an Accept or a Reject.
#[derive(Debug, Clone)]
pub struct ActivityProcessor {
    local_actor: Arc<Actor>,
    followers: Arc<FollowerRegistry>,
    directory: ActorDirectory,
    delivery: Arc<ActivityDelivery>,
    /// Inbound gate; failures are the sender's fault
    inbound_validator: Option<Arc<SchemaValidator>>,
}

impl ActivityProcessor {
    pub fn new(
        local_actor: Arc<Actor>,
        followers: Arc<FollowerRegistry>,
        directory: ActorDirectory,
        delivery: Arc<ActivityDelivery>,
    ) -> Self {
        Self {
            local_actor,
            followers,
            directory,
            delivery,
            inbound_validator: None,
        }
    }

    /// Check inbound activities against `validator` before processing them.
    pub fn with_inbound_validator(mut self, validator: Arc<SchemaValidator>) -> Self {
        self.inbound_validator = Some(validator);
        self
    }

    /// Process an incoming activity
    ///
    /// # Errors
    /// - `BadRequest` for unknown types, malformed fields, or a failed inbound gate
    /// - Actor lookup and Accept/Reject delivery failures, unchanged
    pub async fn process(&self, activity: Value) -> Result<(), AppError> {
        if let Some(validator) = &self.inbound_validator {
            validator
                .validate(&activity)
                .map_err(|e| AppError::BadRequest(e.message))?;
        }

        let type_name = activity
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::BadRequest("Missing activity type".to_string()))?;

        let activity_type = ActivityType::parse(type_name);
        ACTIVITIES_RECEIVED
            .with_label_values(&[activity_type.map_or("unknown", |t| t.as_str())])
            .inc();

        match activity_type {
            Some(ActivityType::Follow) => self.handle_follow(&activity).await,
            Some(ActivityType::Undo) => self.handle_undo(&activity),
            Some(ActivityType::Create) => {
                tracing::info!(actor = ?activity.get("actor"), "Received Create, nothing to do");
                Ok(())
            }
            _ => Err(AppError::BadRequest(format!(
                "Unsupported activity type: {type_name}"
            ))),
        }
    }

    /// Handle Follow activity
    ///
    /// A new follower gets an Accept and is registered afterwards. An inbox
    /// that is already registered is re-associated with this Follow's id and
    /// then sent a Reject.
    async fn handle_follow(&self, activity: &Value) -> Result<(), AppError> {
        let Some(follower_uri) = activity.get("actor").and_then(Value::as_str) else {
            tracing::warn!(actor = ?activity.get("actor"), "Follow without an actor URI, ignoring");
            return Ok(());
        };

        let follow_id = activity
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::BadRequest("Follow activity has no id".to_string()))?;

        let follower_inbox = self.directory.fetch_inbox(follower_uri).await?;

        if self.followers.contains(&follower_inbox) {
            // The existing entry now answers to the new id.
            self.followers.add(follower_inbox.clone(), follow_id);

            let reject = builder::reject(&self.local_actor.id, follow_id);
            self.delivery.deliver(&follower_inbox, &reject).await?;
            tracing::info!(follower = %follower_uri, follow_id, "Rejected duplicate Follow");
            return Ok(());
        }

        let accept = builder::accept(&self.local_actor.id, follow_id);
        self.delivery.deliver(&follower_inbox, &accept).await?;
        self.followers.add(follower_inbox.clone(), follow_id);

        tracing::info!(
            follower = %follower_uri,
            inbox = %follower_inbox,
            "Accepted Follow"
        );
        Ok(())
    }

    /// Handle Undo activity
    fn handle_undo(&self, activity: &Value) -> Result<(), AppError> {
        let follow_id = activity
            .get("object")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AppError::BadRequest("Undo object must be a Follow activity id".to_string())
            })?;

        if let Some(inbox) = self.followers.remove_by_follow_id(follow_id) {
            tracing::info!(inbox = %inbox, follow_id, "Follower removed by Undo");
        }
        Ok(())
    }
}
