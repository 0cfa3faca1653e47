//! Mincore - a minimal ActivityPub node
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Local actor profile                                      │
//! │  - Inbox                                                    │
//! │  - Metrics (separate listener)                              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Federation Layer                          │
//! │  - Schema validation gate                                   │
//! │  - Activity processing (Follow / Undo / Create)             │
//! │  - Delivery, periodic publishing, follow handshake          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - In-memory follower registry                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `federation`: ActivityPub federation handling
//! - `data`: Follower registry
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod federation;
pub mod metrics;

use std::fmt;
use std::sync::Arc;

use federation::schema::{
    INBOUND_ACTIVITY_TYPES, OUTBOUND_ACTIVITY_TYPES, activity_validator, actor_validator,
};

/// What a running node does besides serving its actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Accepts followers and publishes to them periodically
    Publisher,
    /// Follows the configured targets and logs what it receives
    Follower,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Publisher => "publisher",
            Role::Follower => "follower",
        })
    }
}

/// Application state shared across all handlers
///
/// Cloned for each request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    pub role: Role,

    /// The node's own actor, fixed at startup
    pub local_actor: Arc<federation::Actor>,

    /// Accepted followers (volatile)
    pub followers: Arc<data::FollowerRegistry>,

    pub directory: federation::ActorDirectory,

    pub delivery: Arc<federation::ActivityDelivery>,

    pub processor: Arc<federation::ActivityProcessor>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Build the HTTP client
    /// 2. Compile the schema validators
    /// 3. Wire the actor directory, delivery service and inbox processor
    ///    around an empty follower registry
    ///
    /// # Errors
    /// Returns error if the client cannot be built or a schema fails to compile
    pub fn new(
        config: config::AppConfig,
        role: Role,
        local_actor: federation::Actor,
    ) -> Result<Self, error::AppError> {
        tracing::info!(%role, actor = %local_actor.id, "Initializing application state...");

        // 1. Initialize HTTP client
        let http_client = Arc::new(
            reqwest::Client::builder()
                .user_agent(config.http.user_agent.as_str())
                .timeout(std::time::Duration::from_secs(config.http.timeout_seconds))
                .build()
                .map_err(|e| error::AppError::Internal(e.into()))?,
        );

        // 2. Compile validators once
        let actor_validator = Arc::new(actor_validator()?);
        let outbound_validator = if config.validation.outbound {
            Some(Arc::new(activity_validator(OUTBOUND_ACTIVITY_TYPES)?))
        } else {
            None
        };
        tracing::info!(
            outbound = config.validation.outbound,
            inbound = config.validation.inbound,
            "Schema validators compiled"
        );

        // 3. Federation services
        let local_actor = Arc::new(local_actor);
        let followers = Arc::new(data::FollowerRegistry::new());
        let directory = federation::ActorDirectory::new(http_client.clone(), actor_validator);
        let delivery = Arc::new(federation::ActivityDelivery::new(
            http_client,
            outbound_validator,
        ));

        let mut processor = federation::ActivityProcessor::new(
            local_actor.clone(),
            followers.clone(),
            directory.clone(),
            delivery.clone(),
        );
        if config.validation.inbound {
            processor = processor
                .with_inbound_validator(Arc::new(activity_validator(INBOUND_ACTIVITY_TYPES)?));
        }

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            role,
            local_actor,
            followers,
            directory,
            delivery,
            processor: Arc::new(processor),
        })
    }

    /// Delivery loop publishing to this node's followers.
    pub fn publisher(&self) -> federation::Publisher {
        federation::Publisher::new(
            self.local_actor.clone(),
            self.followers.clone(),
            self.delivery.clone(),
            self.config.publisher.interval(),
        )
    }

    /// Follow handshake configured from `follower.*`.
    pub fn follow_requester(&self) -> federation::FollowRequester {
        federation::FollowRequester::new(
            self.local_actor.clone(),
            self.directory.clone(),
            self.delivery.clone(),
        )
        .with_delays(
            self.config.follower.initial_delay(),
            self.config.follower.retry_delay(),
        )
        .with_max_attempts(self.config.follower.max_attempts)
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    Router::new()
        .merge(api::activitypub_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
