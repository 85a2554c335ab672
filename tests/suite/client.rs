//! `PocketIdClient` behavior the engine relies on.

use std::net::TcpListener;
use std::time::Duration;

use serde_json::json;
use wiremock::MockServer;

use pocketctl_client::{ApiError, IdentityApi, PocketIdClient, RetryConfig};
use pocketctl_types::{ApiKey, ExternalId, StableName};

use crate::common::{API_KEY, alice, client, eng, mount_get};

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    // Nothing listens on a port that was just released.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = PocketIdClient::new(
        &format!("http://{addr}"),
        ApiKey::new(API_KEY).unwrap(),
        Duration::from_secs(5),
    )
    .unwrap()
    .with_retry(RetryConfig::default().with_max_retries(0));

    let err = client
        .get_group(&ExternalId::new("g-123").unwrap())
        .await
        .unwrap_err();
    assert!(
        matches!(err, ApiError::Transport { attempts: 1, .. }),
        "{err:?}"
    );
    assert!(err.to_string().contains("/api/groups/g-123"));
}

#[test]
fn endpoint_must_be_http() {
    let err = PocketIdClient::new(
        "ftp://id.example.com",
        ApiKey::new(API_KEY).unwrap(),
        Duration::from_secs(5),
    )
    .unwrap_err();
    assert!(matches!(err, ApiError::InvalidEndpoint { .. }));
}

#[test]
fn endpoint_trailing_slash_is_trimmed() {
    let client = PocketIdClient::new(
        "https://id.example.com/",
        ApiKey::new(API_KEY).unwrap(),
        Duration::from_secs(5),
    )
    .unwrap();
    assert_eq!(client.endpoint(), "https://id.example.com");
}

#[tokio::test]
async fn client_membership_is_read_from_group_names() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/api/oidc/clients/c-1",
        json!({ "id": "c-1", "clientName": "grafana", "groupNames": ["eng"] }),
    )
    .await;
    mount_get(&server, "/api/groups/g-123", eng()).await;
    mount_get(
        &server,
        "/api/groups/g-9",
        json!({ "id": "g-9", "groupName": "ops", "friendlyName": "Ops" }),
    )
    .await;

    let client = client(&server);
    let grafana = ExternalId::new("c-1").unwrap();
    assert!(
        client
            .has_client_membership(&grafana, &ExternalId::new("g-123").unwrap())
            .await
            .unwrap()
    );
    assert!(
        !client
            .has_client_membership(&grafana, &ExternalId::new("g-9").unwrap())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn find_user_ignores_other_usernames() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/api/users",
        json!([{ "id": "u-2", "username": "alicia" }, alice(&[])]),
    )
    .await;

    let client = client(&server);
    let found = client
        .find_user(&StableName::new("alice"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, "u-1");
    assert!(
        client
            .find_user(&StableName::new("bob"))
            .await
            .unwrap()
            .is_none()
    );
}
