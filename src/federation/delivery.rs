//! Activity delivery
//!
//! POSTs activities to remote inboxes, behind the optional outbound
//! schema gate.

use std::sync::Arc;

use serde_json::Value;

use super::actor::ACTIVITY_JSON;
use super::schema::SchemaValidator;
use crate::error::AppError;
use crate::metrics::{ACTIVITIES_SENT, DELIVERIES_TOTAL};

/// Activity delivery service
#[derive(Debug, Clone)]
pub struct ActivityDelivery {
    http_client: Arc<reqwest::Client>,
    /// Outbound gate; `None` sends payloads unchecked
    validator: Option<Arc<SchemaValidator>>,
}

/// Result of delivering one activity to one inbox
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub inbox_uri: String,
    pub success: bool,
    pub error: Option<String>,
    pub status_code: Option<u16>,
}

impl DeliveryResult {
    pub fn new(inbox_uri: &str, outcome: &Result<(), AppError>) -> Self {
        let status_code = match outcome {
            Err(AppError::HttpStatus { status, .. }) => Some(status.as_u16()),
            _ => None,
        };
        Self {
            inbox_uri: inbox_uri.to_string(),
            success: outcome.is_ok(),
            error: outcome.as_ref().err().map(ToString::to_string),
            status_code,
        }
    }
}

impl ActivityDelivery {
    pub fn new(http_client: Arc<reqwest::Client>, validator: Option<Arc<SchemaValidator>>) -> Self {
        Self {
            http_client,
            validator,
        }
    }

    /// Run the outbound gate, if enabled.
    pub fn validate(&self, activity: &Value) -> Result<(), AppError> {
        if let Some(validator) = &self.validator {
            validator.validate(activity)?;
        }
        Ok(())
    }

    /// Validate, then POST to `inbox_uri`.
    ///
    /// Nothing is sent when validation fails.
    pub async fn deliver(&self, inbox_uri: &str, activity: &Value) -> Result<(), AppError> {
        self.validate(activity)?;
        self.post(inbox_uri, activity).await
    }

    /// POST an already validated activity to `inbox_uri`.
    ///
    /// # Errors
    /// Transport failures and non-2xx responses.
    pub async fn post(&self, inbox_uri: &str, activity: &Value) -> Result<(), AppError> {
        let body = serde_json::to_vec(activity)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize activity: {e}")))?;

        let result = self
            .http_client
            .post(inbox_uri)
            .header(reqwest::header::CONTENT_TYPE, ACTIVITY_JSON)
            .body(body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        match result {
            Ok(_) => {
                let activity_type = activity
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                ACTIVITIES_SENT.with_label_values(&[activity_type]).inc();
                DELIVERIES_TOTAL.with_label_values(&["success"]).inc();
                tracing::debug!(inbox = %inbox_uri, activity_type, "Delivered activity");
                Ok(())
            }
            Err(e) => {
                DELIVERIES_TOTAL.with_label_values(&["failure"]).inc();
                Err(e.into())
            }
        }
    }
}

/// Build activity JSON
pub mod builder {
    use serde_json::Value;

    /// Build a Follow activity
    ///
    /// # Arguments
    /// * `id` - Activity ID (unique URI)
    /// * `actor` - Actor URI (follower)
    /// * `object` - Object URI (followee)
    pub fn follow(id: &str, actor: &str, object: &str) -> Value {
        serde_json::json!({
            "id": id,
            "type": "Follow",
            "actor": actor,
            "object": object
        })
    }

    /// Build an Accept activity
    ///
    /// Transient, so no id. `object` is the accepted Follow's id.
    pub fn accept(actor: &str, object: &str) -> Value {
        serde_json::json!({
            "type": "Accept",
            "actor": actor,
            "object": object
        })
    }

    /// Build a Reject activity.
    pub fn reject(actor: &str, object: &str) -> Value {
        serde_json::json!({
            "type": "Reject",
            "actor": actor,
            "object": object
        })
    }

    /// Build a Create activity wrapping `object`.
    pub fn create(actor: &str, object: Value) -> Value {
        serde_json::json!({
            "type": "Create",
            "actor": actor,
            "object": object
        })
    }

    /// Build a Note addressed to `to`.
    pub fn note(id: &str, content: &str, to: &[String]) -> Value {
        serde_json::json!({
            "id": id,
            "type": "Note",
            "content": content,
            "to": to
        })
    }
}
