use pocketctl_client::{ApiFut, IdentityApi};
use pocketctl_types::{
    ExternalId, GroupObservation, GroupRequest, GroupSpec, RemoteGroup, ResourceKind, StableName,
    same_claims,
};

use crate::ManagedKind;

pub struct GroupKind;

fn request(spec: &GroupSpec) -> GroupRequest {
    GroupRequest {
        group_name: spec.name.clone(),
        friendly_name: spec.friendly_name.clone(),
        custom_claims: spec.custom_claims.clone(),
    }
}

impl ManagedKind for GroupKind {
    type Spec = GroupSpec;
    type Observation = GroupObservation;
    type Remote = RemoteGroup;

    const KIND: ResourceKind = ResourceKind::Group;

    fn spec_stable_name(spec: &GroupSpec) -> &str {
        &spec.name
    }

    fn remote_id(remote: &RemoteGroup) -> ExternalId {
        ExternalId::from_remote(remote.id.as_str())
    }

    fn observe(remote: &RemoteGroup) -> GroupObservation {
        GroupObservation::from(remote)
    }

    fn is_up_to_date(spec: &GroupSpec, remote: &RemoteGroup) -> bool {
        spec.name == remote.group_name
            && spec.friendly_name == remote.friendly_name
            && same_claims(&spec.custom_claims, &remote.custom_claims)
    }

    fn get<'a>(api: &'a dyn IdentityApi, id: &'a ExternalId) -> ApiFut<'a, Option<RemoteGroup>> {
        api.get_group(id)
    }

    fn discover<'a>(
        api: &'a dyn IdentityApi,
        key: &'a StableName,
    ) -> ApiFut<'a, Option<RemoteGroup>> {
        api.find_group(key)
    }

    fn create<'a>(api: &'a dyn IdentityApi, spec: &'a GroupSpec) -> ApiFut<'a, RemoteGroup> {
        Box::pin(async move { api.create_group(&request(spec)).await })
    }

    fn update<'a>(
        api: &'a dyn IdentityApi,
        id: &'a ExternalId,
        spec: &'a GroupSpec,
    ) -> ApiFut<'a, RemoteGroup> {
        Box::pin(async move { api.update_group(id, &request(spec)).await })
    }

    fn delete<'a>(api: &'a dyn IdentityApi, id: &'a ExternalId) -> ApiFut<'a, ()> {
        api.delete_group(id)
    }
}
