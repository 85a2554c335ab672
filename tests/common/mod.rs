//! Shared test utilities and fixtures
//!
//! A mock Pocket ID plus helpers to build clients and inventories against it.

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pocketctl_client::{PocketIdClient, RetryConfig};
use pocketctl_config::Manifest;
use pocketctl_engine::Inventory;
use pocketctl_types::ApiKey;

pub const API_KEY: &str = "pk_test_123";
pub const CYCLE_TIMEOUT: Duration = Duration::from_secs(10);

/// A manifest with one user, one group and a binding between them.
pub const TEAM_MANIFEST: &str = r#"
    [[user]]
    name = "alice"
    spec = { username = "alice", email = "alice@example.com", first_name = "Alice" }

    [[group]]
    name = "eng"
    spec = { name = "eng", friendly_name = "Engineering" }

    [[user_group_binding]]
    name = "alice-eng"
    spec = { user = { ref = "alice" }, group = { ref = "eng" } }
"#;

pub fn client(server: &MockServer) -> PocketIdClient {
    client_with_retries(server, 0)
}

pub fn client_with_retries(server: &MockServer, max_retries: u32) -> PocketIdClient {
    PocketIdClient::new(
        &server.uri(),
        ApiKey::new(API_KEY).unwrap(),
        Duration::from_secs(5),
    )
    .unwrap()
    .with_retry(RetryConfig::default().with_max_retries(max_retries))
}

pub fn inventory(manifest: &str) -> Inventory {
    Inventory::from_manifest(Manifest::parse(manifest, Path::new("pocketid.toml")).unwrap())
}

pub fn alice(groups: &[&str]) -> Value {
    json!({
        "id": "u-1",
        "username": "alice",
        "email": "alice@example.com",
        "firstName": "Alice",
        "userGroups": groups,
    })
}

pub fn eng() -> Value {
    json!({
        "id": "g-123",
        "groupName": "eng",
        "friendlyName": "Engineering",
    })
}

/// `GET path` answers `body` with 200.
pub async fn mount_get(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("X-API-KEY", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// `POST path` answers `body` with 201, exactly `times` times.
pub async fn mount_create(server: &MockServer, route: &str, body: Value, times: u64) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(201).set_body_json(body))
        .expect(times)
        .mount(server)
        .await;
}

/// Fails the test if any request with `verb` reaches the server.
pub async fn forbid(server: &MockServer, verb: &str) {
    Mock::given(method(verb))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}
