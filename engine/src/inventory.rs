//! Every declared resource, grouped by kind.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use pocketctl_config::{Manifest, ManifestEntry};
use pocketctl_types::{Condition, Declared, ResourceKind, ResourceName, Status};

use crate::binding::{BindingOf, ClientGroupMembership, UserGroupMembership};
use crate::kind::DeclaredOf;
use crate::kinds::{AdminUserKind, GroupKind, OidcClientKind, UserKind};
use crate::state::StatusSnapshot;
use crate::store::{ObservedIdentity, ResourceStore};

/// The declared state plus the status each resource last reached.
#[derive(Debug, Default)]
pub struct Inventory {
    pub users: Vec<DeclaredOf<UserKind>>,
    pub admin_users: Vec<DeclaredOf<AdminUserKind>>,
    pub groups: Vec<DeclaredOf<GroupKind>>,
    pub oidc_clients: Vec<DeclaredOf<OidcClientKind>>,
    pub user_group_bindings: Vec<BindingOf<UserGroupMembership>>,
    pub oidc_client_group_bindings: Vec<BindingOf<ClientGroupMembership>>,
}

/// One resource's condition, for status output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceCondition {
    pub kind: ResourceKind,
    pub name: ResourceName,
    pub observed_id: Option<String>,
    pub condition: Option<Condition>,
}

fn declare<S, O: Default>(entries: Vec<ManifestEntry<S>>) -> Vec<Declared<S, O>> {
    entries.into_iter().map(ManifestEntry::into_declared).collect()
}

impl Inventory {
    #[must_use]
    pub fn from_manifest(manifest: Manifest) -> Self {
        Self {
            users: declare(manifest.user),
            admin_users: declare(manifest.admin_user),
            groups: declare(manifest.group),
            oidc_clients: declare(manifest.oidc_client),
            user_group_bindings: declare(manifest.user_group_binding),
            oidc_client_group_bindings: declare(manifest.oidc_client_group_binding),
        }
    }

    /// Replaces the declared state, carrying over the status of resources
    /// that are still declared.
    pub fn reload(&mut self, manifest: Manifest) {
        let previous = self.snapshot();
        *self = Self::from_manifest(manifest);
        self.restore(previous);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            saved_at: None,
            user: statuses(&self.users),
            admin_user: statuses(&self.admin_users),
            group: statuses(&self.groups),
            oidc_client: statuses(&self.oidc_clients),
            user_group_binding: statuses(&self.user_group_bindings),
            oidc_client_group_binding: statuses(&self.oidc_client_group_bindings),
        }
    }

    /// Applies a snapshot to the declared resources. Entries for resources
    /// that are no longer declared are dropped; their remote objects are
    /// left untouched.
    pub fn restore(&mut self, snapshot: StatusSnapshot) {
        restore_kind(ResourceKind::User, &mut self.users, snapshot.user);
        restore_kind(ResourceKind::AdminUser, &mut self.admin_users, snapshot.admin_user);
        restore_kind(ResourceKind::Group, &mut self.groups, snapshot.group);
        restore_kind(ResourceKind::OidcClient, &mut self.oidc_clients, snapshot.oidc_client);
        restore_kind(
            ResourceKind::UserGroupBinding,
            &mut self.user_group_bindings,
            snapshot.user_group_binding,
        );
        restore_kind(
            ResourceKind::OidcClientGroupBinding,
            &mut self.oidc_client_group_bindings,
            snapshot.oidc_client_group_binding,
        );
    }

    /// Conditions of every resource, in pass order.
    #[must_use]
    pub fn conditions(&self) -> Vec<ResourceCondition> {
        let mut out = Vec::with_capacity(self.len());
        collect_conditions(ResourceKind::User, &self.users, &mut out);
        collect_conditions(ResourceKind::AdminUser, &self.admin_users, &mut out);
        collect_conditions(ResourceKind::Group, &self.groups, &mut out);
        collect_conditions(ResourceKind::OidcClient, &self.oidc_clients, &mut out);
        collect_conditions(
            ResourceKind::UserGroupBinding,
            &self.user_group_bindings,
            &mut out,
        );
        collect_conditions(
            ResourceKind::OidcClientGroupBinding,
            &self.oidc_client_group_bindings,
            &mut out,
        );
        out
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
            + self.admin_users.len()
            + self.groups.len()
            + self.oidc_clients.len()
            + self.user_group_bindings.len()
            + self.oidc_client_group_bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResourceStore for Inventory {
    fn observed_identity(&self, kind: ResourceKind, name: &ResourceName) -> ObservedIdentity {
        match kind {
            ResourceKind::User => lookup(&self.users, name),
            ResourceKind::AdminUser => lookup(&self.admin_users, name),
            ResourceKind::Group => lookup(&self.groups, name),
            ResourceKind::OidcClient => lookup(&self.oidc_clients, name),
            ResourceKind::UserGroupBinding => lookup(&self.user_group_bindings, name),
            ResourceKind::OidcClientGroupBinding => lookup(&self.oidc_client_group_bindings, name),
        }
    }
}

fn lookup<S, O>(resources: &[Declared<S, O>], name: &ResourceName) -> ObservedIdentity {
    match resources.iter().find(|resource| resource.name() == name) {
        None => ObservedIdentity::NotDeclared,
        Some(resource) => match &resource.status.observed_id {
            Some(id) if !id.is_empty() => ObservedIdentity::Observed(id.clone()),
            _ => ObservedIdentity::Pending,
        },
    }
}

fn statuses<S, O: Clone>(resources: &[Declared<S, O>]) -> BTreeMap<ResourceName, Status<O>> {
    resources
        .iter()
        .map(|resource| (resource.name().clone(), resource.status.clone()))
        .collect()
}

fn restore_kind<S, O>(
    kind: ResourceKind,
    resources: &mut [Declared<S, O>],
    mut saved: BTreeMap<ResourceName, Status<O>>,
) {
    for resource in resources.iter_mut() {
        let Some(mut status) = saved.remove(resource.name()) else {
            continue;
        };
        if status.stable_name.is_none() {
            status.stable_name = resource.status.stable_name.take();
        } else if let (Some(recorded), Some(seeded)) =
            (&status.stable_name, &resource.status.stable_name)
            && recorded != seeded
        {
            warn!(
                %kind,
                name = %resource.name(),
                recorded = %recorded,
                external_name = %seeded,
                "external_name differs from the recorded stable name; keeping the recorded one"
            );
        }
        resource.status = status;
    }
    for (name, status) in saved {
        let id = status.observed_id.as_ref().map_or("", |id| id.as_str());
        warn!(
            %kind,
            %name,
            id,
            "Resource is no longer declared; forgetting it and leaving the remote object in place"
        );
    }
    debug!(%kind, count = resources.len(), "Restored status");
}

fn collect_conditions<S, O>(
    kind: ResourceKind,
    resources: &[Declared<S, O>],
    out: &mut Vec<ResourceCondition>,
) {
    out.extend(resources.iter().map(|resource| ResourceCondition {
        kind,
        name: resource.name().clone(),
        observed_id: resource
            .status
            .observed_id
            .as_ref()
            .map(|id| id.as_str().to_string()),
        condition: resource.status.condition.clone(),
    }));
}
