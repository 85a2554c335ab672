//! In-memory [`IdentityApi`] that records every call.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::future::pending;
use std::sync::{Mutex, MutexGuard};

use pocketctl_client::{ApiError, ApiFut, IdentityApi, LogoError, StatusCode};
use pocketctl_types::{
    ExternalId, GroupRequest, OidcClientRequest, RemoteGroup, RemoteOidcClient, RemoteUser,
    StableName, UserRequest,
};

#[derive(Default)]
pub struct FakeState {
    pub users: BTreeMap<String, RemoteUser>,
    pub groups: BTreeMap<String, RemoteGroup>,
    pub clients: BTreeMap<String, RemoteOidcClient>,
    pub user_groups: BTreeSet<(String, String)>,
    pub client_groups: BTreeSet<(String, String)>,
    pub calls: Vec<String>,
    next_ids: VecDeque<String>,
    counter: u32,
    failures: BTreeMap<&'static str, StatusCode>,
    stalled: BTreeSet<&'static str>,
    pub fail_logo: bool,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_ids.pop_front().unwrap_or_else(|| {
            self.counter += 1;
            format!("{prefix}-{}", self.counter)
        })
    }
}

#[derive(Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

fn not_found() -> ApiError {
    ApiError::Status {
        status: StatusCode::NOT_FOUND,
        body: "not found".to_string(),
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Queues the id the next create returns.
    pub fn set_next_id(&self, id: &str) {
        self.state().next_ids.push_back(id.to_string());
    }

    /// Makes every call of `operation` fail with `status`.
    pub fn fail_on(&self, operation: &'static str, status: StatusCode) {
        self.state().failures.insert(operation, status);
    }

    /// Makes every call of `operation` wait forever.
    pub fn stall_on(&self, operation: &'static str) {
        self.state().stalled.insert(operation);
    }

    pub fn insert_user(&self, user: RemoteUser) {
        self.state().users.insert(user.id.clone(), user);
    }

    pub fn insert_group(&self, group: RemoteGroup) {
        self.state().groups.insert(group.id.clone(), group);
    }

    pub fn insert_client(&self, client: RemoteOidcClient) {
        self.state().clients.insert(client.id.clone(), client);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Calls that change remote state.
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| {
                ["create_", "update_", "delete_", "set_", "upload_"]
                    .iter()
                    .any(|prefix| call.starts_with(prefix))
            })
            .collect()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split(' ').next() == Some(operation))
            .count()
    }

    async fn begin(
        &self,
        operation: &'static str,
        arg: &str,
    ) -> Result<MutexGuard<'_, FakeState>, ApiError> {
        let stalled = {
            let mut state = self.state();
            state.calls.push(format!("{operation} {arg}"));
            state.stalled.contains(operation)
        };
        if stalled {
            pending::<()>().await;
        }
        let state = self.state();
        if let Some(status) = state.failures.get(operation) {
            return Err(ApiError::Status {
                status: *status,
                body: "boom".to_string(),
            });
        }
        Ok(state)
    }
}

fn apply_user(user: &mut RemoteUser, request: &UserRequest) {
    user.username.clone_from(&request.username);
    user.email.clone_from(&request.email);
    user.first_name.clone_from(&request.first_name);
    user.last_name.clone_from(&request.last_name);
    user.locale.clone_from(&request.locale);
    user.disabled = request.disabled;
    user.is_admin |= request.is_admin;
    user.custom_claims.clone_from(&request.custom_claims);
}

fn apply_group(group: &mut RemoteGroup, request: &GroupRequest) {
    group.group_name.clone_from(&request.group_name);
    group.friendly_name.clone_from(&request.friendly_name);
    group.custom_claims.clone_from(&request.custom_claims);
}

fn apply_client(client: &mut RemoteOidcClient, request: &OidcClientRequest) {
    client.client_name.clone_from(&request.client_name);
    client.redirect_uris.clone_from(&request.redirect_uris);
    client.post_logout_uris.clone_from(&request.post_logout_uris);
    client.launch_url.clone_from(&request.launch_url);
    client.is_public = request.is_public;
    client.require_pkce = request.require_pkce;
    client.custom_claims.clone_from(&request.custom_claims);
}

impl IdentityApi for FakeApi {
    fn get_user<'a>(&'a self, id: &'a ExternalId) -> ApiFut<'a, Option<RemoteUser>> {
        Box::pin(async move {
            let state = self.begin("get_user", id.as_str()).await?;
            Ok(state.users.get(id.as_str()).cloned())
        })
    }

    fn find_user<'a>(&'a self, username: &'a StableName) -> ApiFut<'a, Option<RemoteUser>> {
        Box::pin(async move {
            let state = self.begin("find_user", username.as_str()).await?;
            Ok(state
                .users
                .values()
                .find(|user| user.username == username.as_str())
                .cloned())
        })
    }

    fn create_user<'a>(&'a self, request: &'a UserRequest) -> ApiFut<'a, RemoteUser> {
        Box::pin(async move {
            let mut state = self.begin("create_user", &request.username).await?;
            let mut user = RemoteUser {
                id: state.next_id("u"),
                ..Default::default()
            };
            apply_user(&mut user, request);
            state.users.insert(user.id.clone(), user.clone());
            Ok(user)
        })
    }

    fn update_user<'a>(
        &'a self,
        id: &'a ExternalId,
        request: &'a UserRequest,
    ) -> ApiFut<'a, RemoteUser> {
        Box::pin(async move {
            let mut state = self.begin("update_user", id.as_str()).await?;
            let user = state.users.get_mut(id.as_str()).ok_or_else(not_found)?;
            apply_user(user, request);
            Ok(user.clone())
        })
    }

    fn delete_user<'a>(&'a self, id: &'a ExternalId) -> ApiFut<'a, ()> {
        Box::pin(async move {
            let mut state = self.begin("delete_user", id.as_str()).await?;
            state.users.remove(id.as_str());
            state.user_groups.retain(|(user, _)| user != id.as_str());
            Ok(())
        })
    }

    fn get_group<'a>(&'a self, id: &'a ExternalId) -> ApiFut<'a, Option<RemoteGroup>> {
        Box::pin(async move {
            let state = self.begin("get_group", id.as_str()).await?;
            Ok(state.groups.get(id.as_str()).cloned())
        })
    }

    fn find_group<'a>(&'a self, name: &'a StableName) -> ApiFut<'a, Option<RemoteGroup>> {
        Box::pin(async move {
            let state = self.begin("find_group", name.as_str()).await?;
            Ok(state
                .groups
                .values()
                .find(|group| group.group_name == name.as_str())
                .cloned())
        })
    }

    fn create_group<'a>(&'a self, request: &'a GroupRequest) -> ApiFut<'a, RemoteGroup> {
        Box::pin(async move {
            let mut state = self.begin("create_group", &request.group_name).await?;
            let mut group = RemoteGroup {
                id: state.next_id("g"),
                ..Default::default()
            };
            apply_group(&mut group, request);
            state.groups.insert(group.id.clone(), group.clone());
            Ok(group)
        })
    }

    fn update_group<'a>(
        &'a self,
        id: &'a ExternalId,
        request: &'a GroupRequest,
    ) -> ApiFut<'a, RemoteGroup> {
        Box::pin(async move {
            let mut state = self.begin("update_group", id.as_str()).await?;
            let group = state.groups.get_mut(id.as_str()).ok_or_else(not_found)?;
            apply_group(group, request);
            Ok(group.clone())
        })
    }

    fn delete_group<'a>(&'a self, id: &'a ExternalId) -> ApiFut<'a, ()> {
        Box::pin(async move {
            let mut state = self.begin("delete_group", id.as_str()).await?;
            state.groups.remove(id.as_str());
            Ok(())
        })
    }

    fn get_oidc_client<'a>(
        &'a self,
        id: &'a ExternalId,
    ) -> ApiFut<'a, Option<RemoteOidcClient>> {
        Box::pin(async move {
            let state = self.begin("get_oidc_client", id.as_str()).await?;
            Ok(state.clients.get(id.as_str()).cloned())
        })
    }

    fn find_oidc_client<'a>(
        &'a self,
        name: &'a StableName,
    ) -> ApiFut<'a, Option<RemoteOidcClient>> {
        Box::pin(async move {
            let state = self.begin("find_oidc_client", name.as_str()).await?;
            Ok(state
                .clients
                .values()
                .find(|client| client.client_name == name.as_str())
                .cloned())
        })
    }

    fn create_oidc_client<'a>(
        &'a self,
        request: &'a OidcClientRequest,
    ) -> ApiFut<'a, RemoteOidcClient> {
        Box::pin(async move {
            let mut state = self
                .begin("create_oidc_client", &request.client_name)
                .await?;
            let mut client = RemoteOidcClient {
                id: state.next_id("c"),
                ..Default::default()
            };
            apply_client(&mut client, request);
            state.clients.insert(client.id.clone(), client.clone());
            // The secret is only ever returned by the create call.
            if !client.is_public {
                client.client_secret = Some(format!("secret-{}", client.id));
            }
            Ok(client)
        })
    }

    fn update_oidc_client<'a>(
        &'a self,
        id: &'a ExternalId,
        request: &'a OidcClientRequest,
    ) -> ApiFut<'a, RemoteOidcClient> {
        Box::pin(async move {
            let mut state = self.begin("update_oidc_client", id.as_str()).await?;
            let client = state.clients.get_mut(id.as_str()).ok_or_else(not_found)?;
            apply_client(client, request);
            Ok(client.clone())
        })
    }

    fn delete_oidc_client<'a>(&'a self, id: &'a ExternalId) -> ApiFut<'a, ()> {
        Box::pin(async move {
            let mut state = self.begin("delete_oidc_client", id.as_str()).await?;
            state.clients.remove(id.as_str());
            state.client_groups.retain(|(client, _)| client != id.as_str());
            Ok(())
        })
    }

    fn set_user_membership<'a>(
        &'a self,
        user: &'a ExternalId,
        group: &'a ExternalId,
        present: bool,
    ) -> ApiFut<'a, ()> {
        Box::pin(async move {
            let mut state = self
                .begin("set_user_membership", &format!("{user} {group} {present}"))
                .await?;
            let key = (user.to_string(), group.to_string());
            if present {
                state.user_groups.insert(key);
            } else {
                state.user_groups.remove(&key);
            }
            Ok(())
        })
    }

    fn has_user_membership<'a>(
        &'a self,
        user: &'a ExternalId,
        group: &'a ExternalId,
    ) -> ApiFut<'a, bool> {
        Box::pin(async move {
            let state = self
                .begin("has_user_membership", &format!("{user} {group}"))
                .await?;
            Ok(state
                .user_groups
                .contains(&(user.to_string(), group.to_string())))
        })
    }

    fn set_client_membership<'a>(
        &'a self,
        client: &'a ExternalId,
        group: &'a ExternalId,
        present: bool,
    ) -> ApiFut<'a, ()> {
        Box::pin(async move {
            let mut state = self
                .begin("set_client_membership", &format!("{client} {group} {present}"))
                .await?;
            let key = (client.to_string(), group.to_string());
            if present {
                state.client_groups.insert(key);
            } else {
                state.client_groups.remove(&key);
            }
            Ok(())
        })
    }

    fn has_client_membership<'a>(
        &'a self,
        client: &'a ExternalId,
        group: &'a ExternalId,
    ) -> ApiFut<'a, bool> {
        Box::pin(async move {
            let state = self
                .begin("has_client_membership", &format!("{client} {group}"))
                .await?;
            Ok(state
                .client_groups
                .contains(&(client.to_string(), group.to_string())))
        })
    }

    fn upload_client_logo<'a>(
        &'a self,
        id: &'a ExternalId,
        logo_url: &'a str,
    ) -> ApiFut<'a, ()> {
        Box::pin(async move {
            let mut state = self
                .begin("upload_client_logo", &format!("{id} {logo_url}"))
                .await?;
            if state.fail_logo {
                return Err(LogoError::DownloadStatus {
                    status: StatusCode::NOT_FOUND,
                }
                .into());
            }
            let client = state.clients.get_mut(id.as_str()).ok_or_else(not_found)?;
            client.has_logo = true;
            Ok(())
        })
    }
}
