//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{OriginalUri, State},
    http::StatusCode,
    routing::{get, post},
};
use mincore::{AppState, Role, config, federation::Actor};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Configuration with short delays, suitable for tests
pub fn test_config() -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
        },
        publisher: config::PublisherConfig {
            interval_seconds: 3600,
        },
        follower: config::FollowerConfig {
            port: 0,
            targets: vec![],
            initial_delay_seconds: 0,
            retry_delay_seconds: 0,
            max_attempts: 3,
        },
        validation: config::ValidationConfig {
            outbound: true,
            inbound: false,
        },
        http: config::HttpConfig {
            timeout_seconds: 5,
            user_agent: "mincore-test".to_string(),
        },
        metrics: config::MetricsConfig {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new(role: Role) -> Self {
        Self::with_config(role, test_config()).await
    }

    pub async fn with_config(role: Role, mut config: config::AppConfig) -> Self {
        // Bind first; the bound port names the local actor
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        config.server.port = addr.port();
        let local_actor = Actor::local(&config.server.base_url());

        let state = AppState::new(config, role, local_actor).unwrap();
        let app = mincore::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        Self {
            addr: format!("http://{addr}"),
            state,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    pub fn actor_id(&self) -> &str {
        &self.state.local_actor.id
    }

    pub fn inbox(&self) -> &str {
        &self.state.local_actor.inbox
    }

    /// POST a JSON activity to `path`
    pub async fn post_activity(&self, path: &str, activity: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header("Content-Type", "application/activity+json")
            .json(activity)
            .send()
            .await
            .unwrap()
    }
}

#[derive(Clone, Default)]
struct MockState {
    profile: Arc<Mutex<Value>>,
    received: Arc<Mutex<Vec<(String, Value)>>>,
    statuses: Arc<Mutex<HashMap<String, StatusCode>>>,
}

/// Remote node serving one actor at `/actor` and recording every POST
pub struct MockRemote {
    pub base: String,
    state: MockState,
}

impl MockRemote {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let state = MockState::default();
        *state.profile.lock().unwrap() = json!({
            "id": format!("{base}/actor"),
            "type": "Person",
            "inbox": format!("{base}/inbox"),
            "outbox": format!("{base}/outbox"),
        });

        let app = Router::new()
            .route("/actor", get(mock_actor))
            .route("/*path", post(mock_post))
            .with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base, state }
    }

    pub fn actor_uri(&self) -> String {
        format!("{}/actor", self.base)
    }

    pub fn inbox(&self) -> String {
        format!("{}/inbox", self.base)
    }

    /// Replace the served actor profile
    pub fn set_profile(&self, profile: Value) {
        *self.state.profile.lock().unwrap() = profile;
    }

    /// Status returned for POSTs to `path` from now on
    pub fn set_status(&self, path: &str, status: StatusCode) {
        self.state
            .statuses
            .lock()
            .unwrap()
            .insert(path.to_string(), status);
    }

    /// Bodies POSTed to `path`, in arrival order
    pub fn received(&self, path: &str) -> Vec<Value> {
        self.state
            .received
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// `type` of every activity POSTed to the inbox
    pub fn received_types(&self) -> Vec<String> {
        self.received("/inbox")
            .iter()
            .filter_map(|activity| activity["type"].as_str().map(str::to_string))
            .collect()
    }
}

async fn mock_actor(State(state): State<MockState>) -> Json<Value> {
    Json(state.profile.lock().unwrap().clone())
}

async fn mock_post(
    State(state): State<MockState>,
    OriginalUri(uri): OriginalUri,
    body: Bytes,
) -> StatusCode {
    let path = uri.path().to_string();
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.received.lock().unwrap().push((path.clone(), body));

    state
        .statuses
        .lock()
        .unwrap()
        .get(&path)
        .copied()
        .unwrap_or(StatusCode::OK)
}

/// Address nothing listens on
pub async fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Follow activity from `remote` to `server`
pub fn follow_from(remote: &MockRemote, server: &TestServer, suffix: &str) -> Value {
    json!({
        "id": format!("{}/follows/{suffix}", remote.actor_uri()),
        "type": "Follow",
        "actor": remote.actor_uri(),
        "object": server.actor_id(),
    })
}
