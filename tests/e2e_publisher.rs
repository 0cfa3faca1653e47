//! E2E tests for the publisher role: actor lookup, inbox protocol and
//! publish cycles against mock remote actors

mod common;

use axum::http::StatusCode;
use common::{MockRemote, TestServer, closed_address, follow_from};
use mincore::Role;
use serde_json::{Value, json};

#[tokio::test]
async fn test_actor_endpoint() {
    let server = TestServer::new(Role::Publisher).await;

    let response = server
        .client
        .get(server.url("/actor"))
        .header("Accept", "application/activity+json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "application/activity+json"
    );
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["id"], server.actor_id());
    assert_eq!(json["type"], "Service");
    assert_eq!(json["inbox"], server.inbox());
    assert_eq!(json["outbox"], server.url("/outbox"));
}

#[tokio::test]
async fn test_other_paths_are_not_found() {
    let server = TestServer::new(Role::Publisher).await;

    for path in ["/", "/inbox", "/actor/extra", "/actor?page=1", "/users/alice"] {
        let response = server.client.get(server.url(path)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "GET {path}");
    }
}

#[tokio::test]
async fn test_post_outside_inbox_is_forbidden() {
    let server = TestServer::new(Role::Publisher).await;
    let remote = MockRemote::start().await;

    for path in ["/actor", "/outbox", "/inbox/", "/inbox?x=1"] {
        let response = server
            .post_activity(path, &follow_from(&remote, &server, "1"))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "POST {path}");
    }

    // Nothing was processed.
    assert!(remote.received("/inbox").is_empty());
    assert!(server.state.followers.is_empty());
}

#[tokio::test]
async fn test_forbidden_is_decided_before_parsing_body() {
    let server = TestServer::new(Role::Publisher).await;

    let response = server
        .client
        .post(server.url("/elsewhere"))
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_body_is_internal_error_without_details() {
    let server = TestServer::new(Role::Publisher).await;

    let response = server
        .client
        .post(server.url("/inbox"))
        .header("Content-Type", "application/activity+json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["error"], "Internal server error");
}

#[tokio::test]
async fn test_unknown_activity_type_is_bad_request() {
    let server = TestServer::new(Role::Publisher).await;

    for activity in [
        json!({"type": "Like", "object": "http://remote.test/notes/1"}),
        json!({"type": "Accept", "object": "http://remote.test/follows/1"}),
        json!({"object": "http://remote.test/notes/1"}),
    ] {
        let response = server.post_activity("/inbox", &activity).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{activity}");
    }
}

#[tokio::test]
async fn test_create_is_acknowledged() {
    let server = TestServer::new(Role::Publisher).await;
    let activity = json!({
        "type": "Create",
        "actor": "http://remote.test/actor",
        "object": {"id": "http://remote.test/notes/1", "type": "Note"},
    });

    let response = server.post_activity("/inbox", &activity).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(server.state.followers.is_empty());
}

#[tokio::test]
async fn test_follow_is_accepted_then_duplicate_rejected() {
    let server = TestServer::new(Role::Publisher).await;
    let remote = MockRemote::start().await;

    let first = follow_from(&remote, &server, "1");
    let response = server.post_activity("/inbox", &first).await;
    assert_eq!(response.status(), StatusCode::OK);

    let received = remote.received("/inbox");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["type"], "Accept");
    assert_eq!(received[0]["actor"], server.actor_id());
    assert_eq!(received[0]["object"], first["id"]);
    assert!(received[0].get("id").is_none());
    assert!(server.state.followers.contains(&remote.inbox()));

    let second = follow_from(&remote, &server, "2");
    let response = server.post_activity("/inbox", &second).await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(remote.received_types(), vec!["Accept", "Reject"]);
    assert_eq!(remote.received("/inbox")[1]["object"], second["id"]);
    assert_eq!(server.state.followers.len(), 1);
}

#[tokio::test]
async fn test_follow_from_unreachable_actor_is_internal_error() {
    let server = TestServer::new(Role::Publisher).await;
    let actor = format!("{}/actor", closed_address().await);
    let activity = json!({
        "id": format!("{actor}/follows/1"),
        "type": "Follow",
        "actor": actor,
        "object": server.actor_id(),
    });

    let response = server.post_activity("/inbox", &activity).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(server.state.followers.is_empty());
}

#[tokio::test]
async fn test_follow_from_actor_with_malformed_profile_is_internal_error() {
    let server = TestServer::new(Role::Publisher).await;
    let remote = MockRemote::start().await;
    remote.set_profile(json!({"id": remote.actor_uri(), "type": "Person"}));

    let response = server
        .post_activity("/inbox", &follow_from(&remote, &server, "1"))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(remote.received("/inbox").is_empty());
    assert!(server.state.followers.is_empty());
}

#[tokio::test]
async fn test_rejected_accept_surfaces_as_internal_error() {
    let server = TestServer::new(Role::Publisher).await;
    let remote = MockRemote::start().await;
    remote.set_status("/inbox", StatusCode::SERVICE_UNAVAILABLE);

    let response = server
        .post_activity("/inbox", &follow_from(&remote, &server, "1"))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(server.state.followers.is_empty());
}

#[tokio::test]
async fn test_publish_cycle_delivers_to_every_follower_and_evicts_failures() {
    let server = TestServer::new(Role::Publisher).await;
    let first = MockRemote::start().await;
    let second = MockRemote::start().await;

    for remote in [&first, &second] {
        let response = server
            .post_activity("/inbox", &follow_from(remote, &server, "1"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let publisher = server.state.publisher();
    let results = publisher.publish_once().await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success));

    let mut expected_to = vec![first.inbox(), second.inbox()];
    expected_to.sort();
    for remote in [&first, &second] {
        let received = remote.received("/inbox");
        assert_eq!(received.len(), 2, "Accept then Create");
        let create = &received[1];
        assert_eq!(create["type"], "Create");
        assert_eq!(create["actor"], server.actor_id());
        assert_eq!(create["object"]["type"], "Note");
        assert_eq!(create["object"]["to"], json!(expected_to));
    }

    second.set_status("/inbox", StatusCode::INTERNAL_SERVER_ERROR);
    let results = publisher.publish_once().await.unwrap();
    assert_eq!(results.iter().filter(|r| !r.success).count(), 1);
    assert_eq!(server.state.followers.snapshot(), vec![first.inbox()]);

    let results = publisher.publish_once().await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].inbox_uri, first.inbox());
    assert_eq!(first.received_types(), vec!["Accept", "Create", "Create", "Create"]);
    assert_eq!(second.received_types(), vec!["Accept", "Create", "Create"]);
}

#[tokio::test]
async fn test_undo_removes_follower() {
    let server = TestServer::new(Role::Publisher).await;
    let remote = MockRemote::start().await;
    let follow = follow_from(&remote, &server, "1");

    server.post_activity("/inbox", &follow).await;
    assert!(server.state.followers.contains(&remote.inbox()));

    let undo = json!({
        "type": "Undo",
        "actor": remote.actor_uri(),
        "object": follow["id"],
    });
    let response = server.post_activity("/inbox", &undo).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(server.state.followers.is_empty());

    let results = server.state.publisher().publish_once().await.unwrap();
    assert!(results.is_empty());
    assert_eq!(remote.received_types(), vec!["Accept"]);
}

#[tokio::test]
async fn test_undo_of_unknown_follow_is_ignored() {
    let server = TestServer::new(Role::Publisher).await;

    let response = server
        .post_activity(
            "/inbox",
            &json!({"type": "Undo", "object": "http://remote.test/follows/unknown"}),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_inbound_gate_rejects_malformed_activity() {
    let mut config = common::test_config();
    config.validation.inbound = true;
    let server = TestServer::with_config(Role::Publisher, config).await;

    let response = server
        .post_activity("/inbox", &json!({"type": "Follow", "actor": "http://remote.test/actor"}))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
