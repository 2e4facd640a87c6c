//! Drives `GitHubContentsStore` and `HttpTextFeed` against a local mock
//! HTTP server. No external network.

use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use httpmock::prelude::*;
use serde_json::json;
use usy_store::{
    GitHubContentsStore, GitHubLocation, HttpTextFeed, StoreError, TextFeed, TrackedStore,
    VersionToken, VersionedStore,
};

const PLAYERS: &str = "[\n  {\n    \"username\": \"atemmax\",\n    \"balance\": 660\n  }\n]";

fn store_for(server: &MockServer) -> GitHubContentsStore {
    let mut loc = GitHubLocation::new("club/ledger", "players.json");
    loc.api_base = server.base_url();
    GitHubContentsStore::new(loc, "test-token".to_string(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn read_decodes_content_and_returns_sha() {
    let server = MockServer::start_async().await;
    let encoded = general_purpose::STANDARD.encode(PLAYERS);
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/repos/club/ledger/contents/players.json")
                .query_param("ref", "main");
            then.status(200)
                .json_body(json!({ "content": format!("{encoded}\n"), "sha": "abc1234def" }));
        })
        .await;

    let snap = store_for(&server).read().await.unwrap();
    mock.assert_async().await;
    assert_eq!(snap.content, PLAYERS);
    assert_eq!(snap.version_token, VersionToken::new("abc1234def"));
}

#[tokio::test]
async fn read_404_is_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/club/ledger/contents/players.json");
            then.status(404).json_body(json!({ "message": "Not Found" }));
        })
        .await;

    let err = store_for(&server).read().await.unwrap_err();
    assert!(err.is_not_found(), "got {err:?}");
}

#[tokio::test]
async fn write_sends_sha_and_returns_new_token() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/repos/club/ledger/contents/players.json")
                .json_body_partial(r#"{ "sha": "old", "branch": "main" }"#);
            then.status(200)
                .json_body(json!({ "content": { "sha": "new" } }));
        })
        .await;

    let token = store_for(&server)
        .write(PLAYERS, Some(&VersionToken::new("old")), "Update players.json")
        .await
        .unwrap();
    mock.assert_async().await;
    assert_eq!(token.as_str(), "new");
}

#[tokio::test]
async fn write_with_stale_sha_is_conflict() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(PUT).path("/repos/club/ledger/contents/players.json");
            then.status(409)
                .json_body(json!({ "message": "players.json does not match old" }));
        })
        .await;

    let err = store_for(&server)
        .write(PLAYERS, Some(&VersionToken::new("old")), "msg")
        .await
        .unwrap_err();
    match err {
        StoreError::Conflict { status, message } => {
            assert_eq!(status, 409);
            assert!(message.contains("does not match"));
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn tracked_store_keeps_token_on_failed_write() {
    let server = MockServer::start_async().await;
    let encoded = general_purpose::STANDARD.encode(PLAYERS);
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/club/ledger/contents/players.json");
            then.status(200)
                .json_body(json!({ "content": encoded, "sha": "v1" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(PUT).path("/repos/club/ledger/contents/players.json");
            then.status(500).body("boom");
        })
        .await;

    let tracked = TrackedStore::new(std::sync::Arc::new(store_for(&server)));
    tracked.load().await.unwrap();
    assert_eq!(tracked.version_token().await, Some(VersionToken::new("v1")));

    let err = tracked.save(PLAYERS, "msg").await.unwrap_err();
    assert!(matches!(err, StoreError::Http { status: 500, .. }));
    assert_eq!(tracked.version_token().await, Some(VersionToken::new("v1")));
}

#[tokio::test]
async fn raw_feed_fetches_text_with_cache_buster() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/volt.txt").query_param_exists("t");
            then.status(200).body("atemmax: +600 +60\n");
        })
        .await;

    let feed = HttpTextFeed::new(server.url("/volt.txt"), Duration::from_secs(5)).unwrap();
    let text = feed.fetch().await.unwrap();
    mock.assert_async().await;
    assert_eq!(text, "atemmax: +600 +60\n");
}

#[tokio::test]
async fn raw_feed_server_error_is_reported() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/volt.txt");
            then.status(503).body("unavailable");
        })
        .await;

    let feed = HttpTextFeed::new(server.url("/volt.txt"), Duration::from_secs(5)).unwrap();
    assert!(matches!(
        feed.fetch().await,
        Err(StoreError::Http { status: 503, .. })
    ));
}
