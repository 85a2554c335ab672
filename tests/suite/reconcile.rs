//! Full passes through `PocketIdClient` against a mock Pocket ID.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pocketctl_client::{PocketIdClient, RetryConfig};
use pocketctl_engine::{CycleOutcome, run_pass};
use pocketctl_types::{ApiKey, ConnectionDetails, ExternalId, Health, ResourceKind};

use crate::common::{
    API_KEY, CYCLE_TIMEOUT, TEAM_MANIFEST, alice, client, client_with_retries, eng, forbid,
    inventory, mount_create, mount_get,
};

#[tokio::test]
async fn fresh_manifest_converges_in_one_pass() {
    let server = MockServer::start().await;
    mount_get(&server, "/api/users", json!([])).await;
    mount_get(&server, "/api/groups", json!([])).await;
    mount_create(&server, "/api/users", alice(&[]), 1).await;
    mount_create(&server, "/api/groups", eng(), 1).await;
    mount_get(&server, "/api/users/u-1", alice(&[])).await;
    mount_get(&server, "/api/groups/g-123", eng()).await;
    Mock::given(method("POST"))
        .and(path("/api/users/u-1/groups/g-123"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let mut inventory = inventory(TEAM_MANIFEST);
    let report = run_pass(&client, &mut inventory, CYCLE_TIMEOUT).await;

    assert!(report.all_converged(), "{report:?}");
    let kinds: Vec<ResourceKind> = report.entries.iter().map(|entry| entry.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ResourceKind::User,
            ResourceKind::Group,
            ResourceKind::UserGroupBinding
        ]
    );
    assert!(matches!(
        report.entry(ResourceKind::UserGroupBinding, "alice-eng").unwrap().outcome,
        CycleOutcome::Created
    ));
    assert_eq!(
        inventory.groups[0].status.observed_id,
        Some(ExternalId::new("g-123").unwrap())
    );
    assert_eq!(
        inventory.user_group_bindings[0].status.observed_id,
        Some(ExternalId::composite(
            &ExternalId::new("u-1").unwrap(),
            &ExternalId::new("g-123").unwrap()
        ))
    );
}

#[tokio::test]
async fn converged_manifest_makes_no_changes() {
    let server = MockServer::start().await;
    mount_get(&server, "/api/users", json!([])).await;
    mount_get(&server, "/api/groups", json!([])).await;
    mount_create(&server, "/api/users", alice(&[]), 1).await;
    mount_create(&server, "/api/groups", eng(), 1).await;
    mount_get(&server, "/api/users/u-1", alice(&[])).await;
    mount_get(&server, "/api/groups/g-123", eng()).await;
    Mock::given(method("POST"))
        .and(path("/api/users/u-1/groups/g-123"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut inventory = inventory(TEAM_MANIFEST);
    assert!(run_pass(&client, &mut inventory, CYCLE_TIMEOUT).await.all_converged());

    // The server now holds exactly what the manifest declares.
    server.verify().await;
    server.reset().await;
    mount_get(&server, "/api/users/u-1", alice(&["eng"])).await;
    mount_get(&server, "/api/groups/g-123", eng()).await;
    forbid(&server, "POST").await;
    forbid(&server, "PUT").await;
    forbid(&server, "DELETE").await;

    let report = run_pass(&client, &mut inventory, CYCLE_TIMEOUT).await;
    assert!(
        report
            .entries
            .iter()
            .all(|entry| matches!(entry.outcome, CycleOutcome::UpToDate)),
        "{report:?}"
    );
}

#[tokio::test]
async fn existing_group_is_adopted_by_name() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/api/groups",
        json!({ "data": [eng()], "pagination": { "totalPages": 1 } }),
    )
    .await;
    forbid(&server, "POST").await;
    forbid(&server, "PUT").await;

    let client = client(&server);
    let mut inventory = inventory(
        r#"
        [[group]]
        name = "eng"
        spec = { name = "eng", friendly_name = "Engineering" }
        "#,
    );
    let report = run_pass(&client, &mut inventory, CYCLE_TIMEOUT).await;

    assert!(matches!(
        report.entry(ResourceKind::Group, "eng").unwrap().outcome,
        CycleOutcome::UpToDate
    ));
    assert_eq!(
        inventory.groups[0].status.observed_id,
        Some(ExternalId::new("g-123").unwrap())
    );
}

#[tokio::test]
async fn drifted_group_is_updated() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/api/groups",
        json!([{ "id": "g-123", "groupName": "eng", "friendlyName": "Old name" }]),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/api/groups/g-123"))
        .and(body_partial_json(json!({ "friendlyName": "Engineering" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(eng()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let mut inventory = inventory(
        r#"
        [[group]]
        name = "eng"
        spec = { name = "eng", friendly_name = "Engineering" }
        "#,
    );
    let report = run_pass(&client, &mut inventory, CYCLE_TIMEOUT).await;

    assert!(matches!(
        report.entry(ResourceKind::Group, "eng").unwrap().outcome,
        CycleOutcome::Updated
    ));
}

#[tokio::test]
async fn confidential_client_secret_is_reported() {
    let server = MockServer::start().await;
    mount_get(&server, "/api/oidc/clients", json!([])).await;
    mount_create(
        &server,
        "/api/oidc/clients",
        json!({
            "id": "c-1",
            "clientName": "grafana",
            "clientSecret": "s3cret",
            "redirectUris": ["https://grafana.example.com/login"],
        }),
        1,
    )
    .await;

    let client = client(&server);
    let mut inventory = inventory(
        r#"
        [[oidc_client]]
        name = "grafana"
        spec = { name = "grafana", callback_urls = ["https://grafana.example.com/login"] }
        "#,
    );
    let report = run_pass(&client, &mut inventory, CYCLE_TIMEOUT).await;

    let entry = report.entry(ResourceKind::OidcClient, "grafana").unwrap();
    assert!(matches!(entry.outcome, CycleOutcome::Created));
    assert_eq!(
        entry.connection_details.get(ConnectionDetails::CLIENT_ID),
        Some("c-1")
    );
    assert_eq!(
        entry.connection_details.get(ConnectionDetails::CLIENT_SECRET),
        Some("s3cret")
    );
}

#[tokio::test]
async fn binding_waits_for_unmanaged_user() {
    let server = MockServer::start().await;
    mount_get(&server, "/api/groups", json!([eng()])).await;
    forbid(&server, "POST").await;

    let client = client(&server);
    let mut inventory = inventory(
        r#"
        [[group]]
        name = "eng"
        spec = { name = "eng", friendly_name = "Engineering" }

        [[user_group_binding]]
        name = "bob-eng"
        spec = { user = { ref = "bob" }, group = { ref = "eng" } }
        "#,
    );
    let report = run_pass(&client, &mut inventory, CYCLE_TIMEOUT).await;

    assert!(!report.all_converged());
    let condition = inventory.user_group_bindings[0]
        .status
        .condition
        .as_ref()
        .unwrap();
    assert_eq!(condition.health, Health::Unresolved);
    assert!(
        condition
            .message
            .as_deref()
            .unwrap()
            .contains("is not declared")
    );
}

#[tokio::test]
async fn server_error_marks_resource_unavailable() {
    let server = MockServer::start().await;
    mount_get(&server, "/api/groups", json!([])).await;
    Mock::given(method("POST"))
        .and(path("/api/groups"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut inventory = inventory(
        r#"
        [[group]]
        name = "eng"
        spec = { name = "eng", friendly_name = "Engineering" }
        "#,
    );
    let report = run_pass(&client, &mut inventory, CYCLE_TIMEOUT).await;

    assert!(!report.all_converged());
    let status = &inventory.groups[0].status;
    assert_eq!(status.observed_id, None);
    let condition = status.condition.as_ref().unwrap();
    assert_eq!(condition.health, Health::Unavailable);
    assert!(
        condition
            .message
            .as_deref()
            .unwrap()
            .starts_with("failed to create group")
    );
}

#[tokio::test]
async fn throttled_create_is_retried_inside_the_client() {
    let server = MockServer::start().await;
    mount_get(&server, "/api/groups", json!([])).await;
    Mock::given(method("POST"))
        .and(path("/api/groups"))
        .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_create(&server, "/api/groups", eng(), 1).await;

    let client = client_with_retries(&server, 2);
    let mut inventory = inventory(
        r#"
        [[group]]
        name = "eng"
        spec = { name = "eng", friendly_name = "Engineering" }
        "#,
    );
    let report = run_pass(&client, &mut inventory, CYCLE_TIMEOUT).await;

    assert!(matches!(
        report.entry(ResourceKind::Group, "eng").unwrap().outcome,
        CycleOutcome::Created
    ));
}

#[tokio::test]
async fn slow_create_is_not_sent_twice() {
    let server = MockServer::start().await;
    mount_get(&server, "/api/groups", json!([])).await;
    // The group gets created, but the answer arrives after the client gave up.
    Mock::given(method("POST"))
        .and(path("/api/groups"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(eng())
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = PocketIdClient::new(
        &server.uri(),
        ApiKey::new(API_KEY).unwrap(),
        Duration::from_millis(100),
    )
    .unwrap()
    .with_retry(RetryConfig::default().with_max_retries(2));
    let mut inventory = inventory(
        r#"
        [[group]]
        name = "eng"
        spec = { name = "eng", friendly_name = "Engineering" }
        "#,
    );
    let report = run_pass(&client, &mut inventory, CYCLE_TIMEOUT).await;

    assert!(matches!(
        report.entry(ResourceKind::Group, "eng").unwrap().outcome,
        CycleOutcome::Failed(_)
    ));
    assert_eq!(inventory.groups[0].status.health(), Some(Health::Unavailable));
    server.verify().await;
}

#[tokio::test]
async fn deleted_group_leaves_the_inventory() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/groups/g-123"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    // First lookup sees the group, the confirmation after the delete does not.
    Mock::given(method("GET"))
        .and(path("/api/groups/g-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(eng()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/groups/g-123"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut inventory = inventory(
        r#"
        [[group]]
        name = "eng"
        delete = true
        spec = { name = "eng", friendly_name = "Engineering" }
        "#,
    );
    inventory.groups[0].status.observed_id = Some(ExternalId::new("g-123").unwrap());

    let report = run_pass(&client, &mut inventory, CYCLE_TIMEOUT).await;
    assert!(matches!(
        report.entry(ResourceKind::Group, "eng").unwrap().outcome,
        CycleOutcome::Deleted
    ));
    assert!(inventory.groups.is_empty());
}
