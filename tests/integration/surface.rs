//! Routing and auth surface: missing/invalid bearer tokens, unknown paths,
//! wrong methods, and the bootstrap JSON shape itself.

use kvrelay_proto::messages::SnapshotRead;

use crate::{Harness, ACCESS_TOKEN};

#[tokio::test]
async fn bootstrap_reports_database_id_and_issues_a_token() {
    let harness = Harness::spawn().await;

    let response = reqwest::Client::new()
        .post(&harness.base)
        .bearer_auth(ACCESS_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["databaseId"], harness.database_id.to_string());
    assert_eq!(body["version"], 1);
    assert!(body["token"].as_str().unwrap().len() > 0);
    assert!(body["endpoints"].as_array().unwrap().len() > 0);

    harness.shutdown().await;
}

#[tokio::test]
async fn wrong_access_token_is_unauthorized() {
    let harness = Harness::spawn().await;

    let response = reqwest::Client::new()
        .post(&harness.base)
        .bearer_auth("not-the-right-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    assert_eq!(response.headers().get("www-authenticate").unwrap(), "Bearer");

    harness.shutdown().await;
}

#[tokio::test]
async fn missing_bearer_is_unauthorized_on_datapath() {
    let harness = Harness::spawn().await;

    let response = reqwest::Client::new()
        .post(format!("{}/kv/snapshot_read", harness.base))
        .body(SnapshotRead::default().encode())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    harness.shutdown().await;
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let harness = Harness::spawn().await;

    let response = reqwest::Client::new()
        .post(format!("{}/nonexistent", harness.base))
        .bearer_auth(ACCESS_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    harness.shutdown().await;
}

#[tokio::test]
async fn wrong_method_is_method_not_allowed_with_allow_header() {
    let harness = Harness::spawn().await;

    let response = reqwest::Client::new().get(&harness.base).send().await.unwrap();
    assert_eq!(response.status(), 405);
    assert_eq!(response.headers().get("allow").unwrap(), "POST");

    harness.shutdown().await;
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let harness = Harness::spawn().await;
    let token = harness.bootstrap().await;

    // A varint continuation byte with nothing after it never terminates.
    let response = harness.post_wire("/kv/snapshot_read", &token, vec![0x08, 0x80]).await;
    assert_eq!(response.status(), 400);

    harness.shutdown().await;
}

#[tokio::test]
async fn ephemeral_token_expires_after_its_ttl() {
    let harness = Harness::spawn_with_ttl(std::time::Duration::from_millis(50)).await;
    let token = harness.bootstrap().await;

    let response = harness.post_wire("/kv/snapshot_read", &token, SnapshotRead::default().encode()).await;
    assert_eq!(response.status(), 200);

    tokio::time::sleep(std::time::Duration::from_millis(150)).await;

    let response = harness.post_wire("/kv/snapshot_read", &token, SnapshotRead::default().encode()).await;
    assert_eq!(response.status(), 401);

    harness.shutdown().await;
}
