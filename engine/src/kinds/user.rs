use pocketctl_client::{ApiFut, IdentityApi};
use pocketctl_types::{
    ExternalId, RemoteUser, ResourceKind, StableName, UserObservation, UserRequest, UserSpec,
    same_claims,
};

use crate::ManagedKind;

/// A regular Pocket ID user.
pub struct UserKind;

/// A user that must carry the admin flag. Never adopts a regular user.
pub struct AdminUserKind;

fn request(spec: &UserSpec, is_admin: bool) -> UserRequest {
    UserRequest {
        username: spec.username.clone(),
        email: spec.email.clone(),
        first_name: spec.first_name.clone(),
        last_name: spec.last_name.clone(),
        locale: spec.locale.clone(),
        disabled: spec.disabled,
        is_admin,
        custom_claims: spec.custom_claims.clone(),
    }
}

/// The admin flag is not part of drift: a regular user never gets one from
/// an update, and an admin user is guarded by its invariant instead.
fn fields_match(spec: &UserSpec, remote: &RemoteUser) -> bool {
    spec.username == remote.username
        && spec.email == remote.email
        && spec.first_name == remote.first_name
        && spec.last_name == remote.last_name
        && spec.locale == remote.locale
        && spec.disabled == remote.disabled
        && same_claims(&spec.custom_claims, &remote.custom_claims)
}

impl ManagedKind for UserKind {
    type Spec = UserSpec;
    type Observation = UserObservation;
    type Remote = RemoteUser;

    const KIND: ResourceKind = ResourceKind::User;

    fn spec_stable_name(spec: &UserSpec) -> &str {
        &spec.username
    }

    fn remote_id(remote: &RemoteUser) -> ExternalId {
        ExternalId::from_remote(remote.id.as_str())
    }

    fn observe(remote: &RemoteUser) -> UserObservation {
        UserObservation::from(remote)
    }

    fn is_up_to_date(spec: &UserSpec, remote: &RemoteUser) -> bool {
        fields_match(spec, remote)
    }

    fn get<'a>(api: &'a dyn IdentityApi, id: &'a ExternalId) -> ApiFut<'a, Option<RemoteUser>> {
        api.get_user(id)
    }

    fn discover<'a>(
        api: &'a dyn IdentityApi,
        key: &'a StableName,
    ) -> ApiFut<'a, Option<RemoteUser>> {
        api.find_user(key)
    }

    fn create<'a>(api: &'a dyn IdentityApi, spec: &'a UserSpec) -> ApiFut<'a, RemoteUser> {
        Box::pin(async move { api.create_user(&request(spec, false)).await })
    }

    fn update<'a>(
        api: &'a dyn IdentityApi,
        id: &'a ExternalId,
        spec: &'a UserSpec,
    ) -> ApiFut<'a, RemoteUser> {
        Box::pin(async move { api.update_user(id, &request(spec, false)).await })
    }

    fn delete<'a>(api: &'a dyn IdentityApi, id: &'a ExternalId) -> ApiFut<'a, ()> {
        api.delete_user(id)
    }
}

impl ManagedKind for AdminUserKind {
    type Spec = UserSpec;
    type Observation = UserObservation;
    type Remote = RemoteUser;

    const KIND: ResourceKind = ResourceKind::AdminUser;

    fn spec_stable_name(spec: &UserSpec) -> &str {
        &spec.username
    }

    fn remote_id(remote: &RemoteUser) -> ExternalId {
        ExternalId::from_remote(remote.id.as_str())
    }

    fn observe(remote: &RemoteUser) -> UserObservation {
        UserObservation::from(remote)
    }

    fn is_up_to_date(spec: &UserSpec, remote: &RemoteUser) -> bool {
        fields_match(spec, remote)
    }

    fn check_invariant(remote: &RemoteUser) -> Result<(), String> {
        if remote.is_admin {
            Ok(())
        } else {
            Err("user exists but is not an admin user".to_string())
        }
    }

    fn get<'a>(api: &'a dyn IdentityApi, id: &'a ExternalId) -> ApiFut<'a, Option<RemoteUser>> {
        api.get_user(id)
    }

    fn discover<'a>(
        api: &'a dyn IdentityApi,
        key: &'a StableName,
    ) -> ApiFut<'a, Option<RemoteUser>> {
        api.find_user(key)
    }

    fn create<'a>(api: &'a dyn IdentityApi, spec: &'a UserSpec) -> ApiFut<'a, RemoteUser> {
        Box::pin(async move { api.create_user(&request(spec, true)).await })
    }

    fn update<'a>(
        api: &'a dyn IdentityApi,
        id: &'a ExternalId,
        spec: &'a UserSpec,
    ) -> ApiFut<'a, RemoteUser> {
        Box::pin(async move { api.update_user(id, &request(spec, true)).await })
    }

    fn delete<'a>(api: &'a dyn IdentityApi, id: &'a ExternalId) -> ApiFut<'a, ()> {
        api.delete_user(id)
    }
}
