//! Status and connection details surviving a restart.

use std::fs;

use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pocketctl_engine::{StateFile, run_pass};
use pocketctl_types::{ConnectionDetails, ExternalId, Health, ResourceKind, ResourceName};

use crate::common::{
    CYCLE_TIMEOUT, TEAM_MANIFEST, alice, client, eng, forbid, inventory, mount_create, mount_get,
};

const CLIENT_MANIFEST: &str = r#"
    [[oidc_client]]
    name = "grafana"
    spec = { name = "grafana", callback_urls = ["https://grafana.example.com/login"] }
"#;

const DELETED_CLIENT_MANIFEST: &str = r#"
    [[oidc_client]]
    name = "grafana"
    delete = true
    spec = { name = "grafana", callback_urls = ["https://grafana.example.com/login"] }
"#;

fn grafana() -> ResourceName {
    ResourceName::new("grafana").unwrap()
}

#[tokio::test]
async fn restart_resumes_from_saved_ids() {
    let dir = tempdir().unwrap();
    let state = StateFile::new(dir.path());
    let server = MockServer::start().await;
    mount_get(&server, "/api/users", json!([])).await;
    mount_get(&server, "/api/groups", json!([])).await;
    mount_create(&server, "/api/users", alice(&[]), 1).await;
    mount_create(&server, "/api/groups", eng(), 1).await;
    mount_get(&server, "/api/users/u-1", alice(&["eng"])).await;
    mount_get(&server, "/api/groups/g-123", eng()).await;

    let client = client(&server);
    let mut first = inventory(TEAM_MANIFEST);
    let report = run_pass(&client, &mut first, CYCLE_TIMEOUT).await;
    assert!(report.all_converged(), "{report:?}");
    state.save(&first.snapshot()).unwrap();
    state.record_pass(&report).unwrap();

    // A new process: nothing is discovered or created again.
    server.verify().await;
    server.reset().await;
    mount_get(&server, "/api/users/u-1", alice(&["eng"])).await;
    mount_get(&server, "/api/groups/g-123", eng()).await;
    forbid(&server, "POST").await;
    forbid(&server, "PUT").await;

    let mut second = inventory(TEAM_MANIFEST);
    second.restore(state.load().unwrap());
    assert_eq!(
        second.users[0].status.observed_id,
        Some(ExternalId::new("u-1").unwrap())
    );

    let report = run_pass(&client, &mut second, CYCLE_TIMEOUT).await;
    assert!(report.all_converged(), "{report:?}");
    assert!(second.conditions().iter().all(|resource| {
        resource
            .condition
            .as_ref()
            .is_some_and(|condition| condition.health == Health::Available)
    }));
}

#[tokio::test]
async fn client_secret_is_published_and_forgotten_on_delete() {
    let dir = tempdir().unwrap();
    let state = StateFile::new(dir.path());
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
    let mut declared = inventory(CLIENT_MANIFEST);
    let report = run_pass(&client, &mut declared, CYCLE_TIMEOUT).await;
    state.save(&declared.snapshot()).unwrap();
    state.record_pass(&report).unwrap();

    let published = state
        .read_connection(ResourceKind::OidcClient, &grafana())
        .unwrap()
        .unwrap();
    assert_eq!(published.get(ConnectionDetails::CLIENT_SECRET), Some("s3cret"));

    // The secret is never part of the status snapshot.
    let status = fs::read_to_string(dir.path().join("status.json")).unwrap();
    assert!(!status.contains("s3cret"));

    // Marking the client for deletion removes it remotely and locally.
    server.verify().await;
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/api/oidc/clients/c-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": "c-1", "clientName": "grafana" })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/oidc/clients/c-1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/oidc/clients/c-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut deleting = inventory(DELETED_CLIENT_MANIFEST);
    deleting.restore(state.load().unwrap());
    let report = run_pass(&client, &mut deleting, CYCLE_TIMEOUT).await;
    state.save(&deleting.snapshot()).unwrap();
    state.record_pass(&report).unwrap();

    assert!(deleting.oidc_clients.is_empty());
    assert!(state.load().unwrap().oidc_client.is_empty());
    assert_eq!(
        state
            .read_connection(ResourceKind::OidcClient, &grafana())
            .unwrap(),
        None
    );
}
