//! Actors
//!
//! The local actor identity and live lookup of remote actor profiles.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::SchemaValidator;
use crate::error::AppError;

/// Media type used for every ActivityPub request and response body.
pub const ACTIVITY_JSON: &str = "application/activity+json";

/// Actor profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub inbox: String,
    pub outbox: String,
}

impl Actor {
    /// The node's own actor, rooted at `base_url` (e.g. "http://127.0.0.1:8000").
    pub fn local(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self {
            id: format!("{base_url}/actor"),
            kind: "Service".to_string(),
            inbox: format!("{base_url}/inbox"),
            outbox: format!("{base_url}/outbox"),
        }
    }
}

/// Remote actor lookup
///
/// Every call is a live GET; nothing is cached.
#[derive(Debug, Clone)]
pub struct ActorDirectory {
    http_client: Arc<reqwest::Client>,
    validator: Arc<SchemaValidator>,
}

impl ActorDirectory {
    pub fn new(http_client: Arc<reqwest::Client>, validator: Arc<SchemaValidator>) -> Self {
        Self {
            http_client,
            validator,
        }
    }

    /// Fetch the raw profile document at `uri`.
    ///
    /// # Errors
    /// Transport failures, non-2xx responses and non-JSON bodies.
    pub async fn fetch_document(&self, uri: &str) -> Result<Value, AppError> {
        tracing::debug!(actor = %uri, "Fetching actor");

        let response = self
            .http_client
            .get(uri)
            .header(reqwest::header::ACCEPT, ACTIVITY_JSON)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<Value>().await?)
    }

    /// Fetch and validate the profile at `uri`.
    ///
    /// Profiles missing any of id, type, inbox or outbox are rejected.
    pub async fn fetch_actor(&self, uri: &str) -> Result<Actor, AppError> {
        let document = self.fetch_document(uri).await?;
        self.validator.validate(&document)?;

        serde_json::from_value(document)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid actor {uri}: {e}")))
    }

    /// Inbox URI of the actor at `uri`.
    pub async fn fetch_inbox(&self, uri: &str) -> Result<String, AppError> {
        Ok(self.fetch_actor(uri).await?.inbox)
    }
}
