//! Membership bindings.
//!
//! A binding has no fields of its own: it either exists or it does not. Both
//! endpoints are resolved before any remote call, and a binding whose
//! endpoints are gone counts as deleted.

use tracing::debug;

use pocketctl_client::{ApiFut, IdentityApi};
use pocketctl_types::{
    Declared, DeletionPolicy, ExternalId, GroupObservation, OidcClientGroupBindingObservation,
    OidcClientGroupBindingSpec, OidcClientObservation, Reference, ResourceKind, StableName,
    UserGroupBindingObservation, UserGroupBindingSpec, UserObservation,
};

use crate::ReconcileError;
use crate::reconciler::{CycleOutcome, CycleReport, Reconciler, finish_cycle};
use crate::resolve::resolve_reference;

const CONTAINER_FIELD: &str = "group";
const CONTAINER_TARGETS: &[ResourceKind] = &[ResourceKind::Group];

/// A member-in-group association kind.
pub trait Membership: Send + Sync + 'static {
    type Spec: Clone + Send + Sync;
    type Observation: Clone + Default + Send + Sync;

    const KIND: ResourceKind;
    const MEMBER_FIELD: &'static str;
    /// Kinds a member `ref` may point at, tried in order.
    const MEMBER_TARGETS: &'static [ResourceKind];

    fn member(spec: &Self::Spec) -> &Reference;
    fn container(spec: &Self::Spec) -> &Reference;

    fn exists<'a>(
        api: &'a dyn IdentityApi,
        member: &'a ExternalId,
        container: &'a ExternalId,
    ) -> ApiFut<'a, bool>;
    fn set<'a>(
        api: &'a dyn IdentityApi,
        member: &'a ExternalId,
        container: &'a ExternalId,
        present: bool,
    ) -> ApiFut<'a, ()>;
    /// Reads both endpoints for the status mirror.
    fn observe<'a>(
        api: &'a dyn IdentityApi,
        member: &'a ExternalId,
        container: &'a ExternalId,
    ) -> ApiFut<'a, Self::Observation>;
}

pub type BindingOf<M> = Declared<<M as Membership>::Spec, <M as Membership>::Observation>;

pub struct UserGroupMembership;

impl Membership for UserGroupMembership {
    type Spec = UserGroupBindingSpec;
    type Observation = UserGroupBindingObservation;

    const KIND: ResourceKind = ResourceKind::UserGroupBinding;
    const MEMBER_FIELD: &'static str = "user";
    const MEMBER_TARGETS: &'static [ResourceKind] = &[ResourceKind::User, ResourceKind::AdminUser];

    fn member(spec: &UserGroupBindingSpec) -> &Reference {
        &spec.user
    }

    fn container(spec: &UserGroupBindingSpec) -> &Reference {
        &spec.group
    }

    fn exists<'a>(
        api: &'a dyn IdentityApi,
        member: &'a ExternalId,
        container: &'a ExternalId,
    ) -> ApiFut<'a, bool> {
        api.has_user_membership(member, container)
    }

    fn set<'a>(
        api: &'a dyn IdentityApi,
        member: &'a ExternalId,
        container: &'a ExternalId,
        present: bool,
    ) -> ApiFut<'a, ()> {
        api.set_user_membership(member, container, present)
    }

    fn observe<'a>(
        api: &'a dyn IdentityApi,
        member: &'a ExternalId,
        container: &'a ExternalId,
    ) -> ApiFut<'a, UserGroupBindingObservation> {
        Box::pin(async move {
            let user = api.get_user(member).await?;
            let group = api.get_group(container).await?;
            Ok(UserGroupBindingObservation {
                user: user.as_ref().map(UserObservation::from),
                group: group.as_ref().map(GroupObservation::from),
            })
        })
    }
}

pub struct ClientGroupMembership;

impl Membership for ClientGroupMembership {
    type Spec = OidcClientGroupBindingSpec;
    type Observation = OidcClientGroupBindingObservation;

    const KIND: ResourceKind = ResourceKind::OidcClientGroupBinding;
    const MEMBER_FIELD: &'static str = "client";
    const MEMBER_TARGETS: &'static [ResourceKind] = &[ResourceKind::OidcClient];

    fn member(spec: &OidcClientGroupBindingSpec) -> &Reference {
        &spec.client
    }

    fn container(spec: &OidcClientGroupBindingSpec) -> &Reference {
        &spec.group
    }

    fn exists<'a>(
        api: &'a dyn IdentityApi,
        member: &'a ExternalId,
        container: &'a ExternalId,
    ) -> ApiFut<'a, bool> {
        api.has_client_membership(member, container)
    }

    fn set<'a>(
        api: &'a dyn IdentityApi,
        member: &'a ExternalId,
        container: &'a ExternalId,
        present: bool,
    ) -> ApiFut<'a, ()> {
        api.set_client_membership(member, container, present)
    }

    fn observe<'a>(
        api: &'a dyn IdentityApi,
        member: &'a ExternalId,
        container: &'a ExternalId,
    ) -> ApiFut<'a, OidcClientGroupBindingObservation> {
        Box::pin(async move {
            let client = api.get_oidc_client(member).await?;
            let group = api.get_group(container).await?;
            Ok(OidcClientGroupBindingObservation {
                client: client.as_ref().map(OidcClientObservation::from),
                group: group.as_ref().map(GroupObservation::from),
            })
        })
    }
}

impl Reconciler<'_> {
    /// Runs one cycle for a membership binding.
    pub async fn reconcile_binding<M: Membership>(
        &self,
        binding: &mut BindingOf<M>,
    ) -> CycleReport {
        let deleting = binding.meta.deletion_requested;
        let outcome = match self.converge_binding::<M>(binding).await {
            Ok(outcome) => outcome,
            // The association cannot outlive its endpoints.
            Err(ReconcileError::ReferenceUnresolved { .. }) if deleting => {
                CycleOutcome::Deleted
            }
            Err(err @ ReconcileError::ReferenceUnresolved { .. }) => {
                CycleOutcome::NotReady(err.to_string())
            }
            Err(err) => CycleOutcome::Failed(err),
        };
        finish_cycle(M::KIND, &binding.meta.name, &mut binding.status, &outcome);
        CycleReport::new(outcome)
    }

    async fn converge_binding<M: Membership>(
        &self,
        binding: &mut BindingOf<M>,
    ) -> Result<CycleOutcome, ReconcileError> {
        if binding.meta.deletion_requested
            && binding.meta.deletion_policy == DeletionPolicy::Orphan
        {
            return Ok(CycleOutcome::Orphaned);
        }

        let member = resolve_reference(
            self.store,
            M::MEMBER_FIELD,
            M::member(&binding.spec),
            M::MEMBER_TARGETS,
        )?;
        let container = resolve_reference(
            self.store,
            CONTAINER_FIELD,
            M::container(&binding.spec),
            CONTAINER_TARGETS,
        )?;

        let exists = M::exists(self.api, &member, &container)
            .await
            .map_err(ReconcileError::api("check", M::KIND))?;

        if binding.meta.deletion_requested {
            if !exists {
                return Ok(CycleOutcome::Deleted);
            }
            M::set(self.api, &member, &container, false)
                .await
                .map_err(ReconcileError::api("remove", M::KIND))?;
            let still_there = M::exists(self.api, &member, &container)
                .await
                .map_err(ReconcileError::api("check", M::KIND))?;
            return Ok(if still_there {
                CycleOutcome::Deleting
            } else {
                CycleOutcome::Deleted
            });
        }

        let outcome = if exists {
            CycleOutcome::UpToDate
        } else {
            M::set(self.api, &member, &container, true)
                .await
                .map_err(ReconcileError::api("create", M::KIND))?;
            CycleOutcome::Created
        };

        let id = ExternalId::composite(&member, &container);
        debug!(kind = %M::KIND, name = %binding.meta.name, id = %id, "Membership present");
        binding.status.record_identity(id.clone(), StableName::from(&id));
        binding.status.observed = M::observe(self.api, &member, &container)
            .await
            .map_err(ReconcileError::api("get", M::KIND))?;
        Ok(outcome)
    }
}
