//! One reconciliation pass over the whole inventory.
//!
//! Kinds run in stage order (users, admin users, groups, clients, then
//! bindings) so a fresh manifest usually converges in a single pass. Within
//! a stage every resource gets its own cycle and the cycles run
//! concurrently against a read-only view of the inventory; results are
//! written back once the stage is done.

use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use pocketctl_client::IdentityApi;
use pocketctl_types::{ConnectionDetails, Declared, ResourceKind, ResourceName};

use crate::ReconcileError;
use crate::binding::{BindingOf, ClientGroupMembership, Membership, UserGroupMembership};
use crate::inventory::Inventory;
use crate::kind::{DeclaredOf, ManagedKind};
use crate::kinds::{AdminUserKind, GroupKind, OidcClientKind, UserKind};
use crate::reconciler::{CycleOutcome, CycleReport, Reconciler, finish_cycle};
use crate::store::ResourceStore;

#[derive(Debug)]
pub struct PassEntry {
    pub kind: ResourceKind,
    pub name: ResourceName,
    pub outcome: CycleOutcome,
    pub connection_details: ConnectionDetails,
}

#[derive(Debug, Default)]
pub struct PassReport {
    pub entries: Vec<PassEntry>,
}

impl PassReport {
    /// True when every resource converged.
    #[must_use]
    pub fn all_converged(&self) -> bool {
        self.entries.iter().all(|entry| entry.outcome.is_converged())
    }

    pub fn unconverged(&self) -> impl Iterator<Item = &PassEntry> {
        self.entries
            .iter()
            .filter(|entry| !entry.outcome.is_converged())
    }

    #[must_use]
    pub fn entry(&self, kind: ResourceKind, name: &str) -> Option<&PassEntry> {
        self.entries
            .iter()
            .find(|entry| entry.kind == kind && entry.name.as_str() == name)
    }
}

/// Reconciles every declared resource once. Resources that finished
/// deleting are removed from the inventory.
pub async fn run_pass(
    api: &dyn IdentityApi,
    inventory: &mut Inventory,
    cycle_timeout: Duration,
) -> PassReport {
    let mut report = PassReport::default();

    let results = run_managed::<UserKind>(api, &*inventory, &inventory.users, cycle_timeout).await;
    settle(ResourceKind::User, &mut inventory.users, results, &mut report);

    let results =
        run_managed::<AdminUserKind>(api, &*inventory, &inventory.admin_users, cycle_timeout).await;
    settle(ResourceKind::AdminUser, &mut inventory.admin_users, results, &mut report);

    let results =
        run_managed::<GroupKind>(api, &*inventory, &inventory.groups, cycle_timeout).await;
    settle(ResourceKind::Group, &mut inventory.groups, results, &mut report);

    let results =
        run_managed::<OidcClientKind>(api, &*inventory, &inventory.oidc_clients, cycle_timeout)
            .await;
    settle(ResourceKind::OidcClient, &mut inventory.oidc_clients, results, &mut report);

    let results = run_bindings::<UserGroupMembership>(
        api,
        &*inventory,
        &inventory.user_group_bindings,
        cycle_timeout,
    )
    .await;
    settle(
        ResourceKind::UserGroupBinding,
        &mut inventory.user_group_bindings,
        results,
        &mut report,
    );

    let results = run_bindings::<ClientGroupMembership>(
        api,
        &*inventory,
        &inventory.oidc_client_group_bindings,
        cycle_timeout,
    )
    .await;
    settle(
        ResourceKind::OidcClientGroupBinding,
        &mut inventory.oidc_client_group_bindings,
        results,
        &mut report,
    );

    let failed = report.unconverged().count();
    if failed == 0 {
        info!(resources = report.entries.len(), "Pass converged");
    } else {
        warn!(
            resources = report.entries.len(),
            unconverged = failed,
            "Pass finished with unconverged resources"
        );
    }
    report
}

async fn run_managed<K: ManagedKind>(
    api: &dyn IdentityApi,
    store: &dyn ResourceStore,
    resources: &[DeclaredOf<K>],
    cycle_timeout: Duration,
) -> Vec<(DeclaredOf<K>, CycleReport)> {
    let reconciler = Reconciler::new(api, store);
    let cycles = resources.iter().map(|resource| async move {
        let mut working = resource.clone();
        let result = timeout(cycle_timeout, reconciler.reconcile::<K>(&mut working)).await;
        match result {
            Ok(report) => (working, report),
            Err(_) => timed_out(K::KIND, resource, cycle_timeout),
        }
    });
    join_all(cycles).await
}

async fn run_bindings<M: Membership>(
    api: &dyn IdentityApi,
    store: &dyn ResourceStore,
    bindings: &[BindingOf<M>],
    cycle_timeout: Duration,
) -> Vec<(BindingOf<M>, CycleReport)> {
    let reconciler = Reconciler::new(api, store);
    let cycles = bindings.iter().map(|binding| async move {
        let mut working = binding.clone();
        let result = timeout(cycle_timeout, reconciler.reconcile_binding::<M>(&mut working)).await;
        match result {
            Ok(report) => (working, report),
            Err(_) => timed_out(M::KIND, binding, cycle_timeout),
        }
    });
    join_all(cycles).await
}

/// A cycle that ran out of time keeps the resource's last observation but
/// reports it unavailable.
fn timed_out<S: Clone, O: Clone>(
    kind: ResourceKind,
    resource: &Declared<S, O>,
    after: Duration,
) -> (Declared<S, O>, CycleReport) {
    let mut stale = resource.clone();
    let outcome = CycleOutcome::Failed(ReconcileError::TimedOut { kind, after });
    finish_cycle(kind, resource.name(), &mut stale.status, &outcome);
    (stale, CycleReport::new(outcome))
}

fn settle<S, O>(
    kind: ResourceKind,
    slot: &mut Vec<Declared<S, O>>,
    results: Vec<(Declared<S, O>, CycleReport)>,
    report: &mut PassReport,
) {
    let mut kept = Vec::with_capacity(results.len());
    for (resource, cycle) in results {
        let finished = cycle.outcome.is_final();
        report.entries.push(PassEntry {
            kind,
            name: resource.name().clone(),
            outcome: cycle.outcome,
            connection_details: cycle.connection_details,
        });
        if finished {
            debug!(%kind, name = %resource.name(), "Forgetting resource");
        } else {
            kept.push(resource);
        }
    }
    *slot = kept;
}
