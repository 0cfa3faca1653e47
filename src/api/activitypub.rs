//! ActivityPub endpoints
//!
//! The node answers on every path and decides by full URL:
//! - GET of the local actor id returns the actor profile, anything else is 404
//! - POST to the local inbox is processed, anything else is 403

use axum::body::Bytes;
use axum::{
    Router,
    extract::{OriginalUri, State},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use http::{HeaderMap, StatusCode, Uri, header};
use serde_json::Value;

use crate::error::AppError;
use crate::federation::{ACTIVITY_JSON, ActivityType};
use crate::metrics::ACTIVITIES_RECEIVED;
use crate::{AppState, Role};

/// Create ActivityPub router
///
/// Routes:
/// - GET /{any} - Actor profile
/// - POST /{any} - Inbox
pub fn activitypub_router() -> Router<AppState> {
    Router::new()
        .route("/", get(actor).post(inbox))
        .route("/*path", get(actor).post(inbox))
}

/// Absolute URL of the request as the peer addressed it.
///
/// Uses the Host header, falling back to the local actor's own authority.
fn request_url(state: &AppState, headers: &HeaderMap, uri: &Uri) -> String {
    let authority = headers
        .get(header::HOST)
        .and_then(|host| host.to_str().ok())
        .map(str::to_string)
        .or_else(|| local_authority(&state.local_actor.id))
        .unwrap_or_else(|| {
            format!("{}:{}", state.config.server.host, state.config.server.port)
        });
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());

    format!("http://{authority}{path_and_query}")
}

fn local_authority(actor_id: &str) -> Option<String> {
    let url = url::Url::parse(actor_id).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// GET /actor
///
/// Content-Type: application/activity+json
async fn actor(
    State(state): State<AppState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, AppError> {
    if request_url(&state, &headers, &uri) != state.local_actor.id {
        return Err(AppError::NotFound);
    }

    Ok((
        [(header::CONTENT_TYPE, ACTIVITY_JSON)],
        Json(state.local_actor.as_ref().clone()),
    )
        .into_response())
}

/// POST /inbox
///
/// # Steps
/// 1. Reject anything not addressed to the local inbox
/// 2. Parse the body
/// 3. Process it (publisher) or log it (follower)
async fn inbox(
    State(state): State<AppState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let url = request_url(&state, &headers, &uri);
    if url != state.local_actor.inbox {
        tracing::debug!(url = %url, "POST outside the local inbox");
        return Err(AppError::Forbidden);
    }

    let activity: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid activity body: {e}")))?;

    match state.role {
        Role::Publisher => state.processor.process(activity).await?,
        Role::Follower => {
            let activity_type = activity
                .get("type")
                .and_then(Value::as_str)
                .and_then(ActivityType::parse);
            ACTIVITIES_RECEIVED
                .with_label_values(&[activity_type.map_or("unknown", |t| t.as_str())])
                .inc();
            tracing::info!(activity = %activity, "Received activity");
        }
    }

    Ok(StatusCode::OK)
}
