//! The convergence state machine.
//!
//! One call to [`Reconciler::reconcile`] is one cycle for one declared
//! resource: observe the remote object, then create, update, delete or leave
//! it alone. Every cycle ends with a [`CycleOutcome`] and a condition written
//! into the resource's status; errors never escape as `Err`.

use std::fmt;

use tracing::{debug, info, warn};

use pocketctl_client::IdentityApi;
use pocketctl_types::{
    ConnectionDetails, DeletionPolicy, ExternalId, Health, ResourceKind, ResourceName, StableName,
    Status,
};

use crate::ReconcileError;
use crate::kind::{DeclaredOf, ManagedKind};
use crate::resolve::discovery_key;
use crate::store::ResourceStore;

/// How a cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    Created,
    Updated,
    UpToDate,
    /// Delete was issued but the object is still visible.
    Deleting,
    /// The remote object is gone; the resource can be forgotten.
    Deleted,
    /// Deletion with the orphan policy; the remote object was left alone.
    Orphaned,
    /// A dependency has not been observed yet.
    NotReady(String),
    Failed(ReconcileError),
}

impl CycleOutcome {
    /// The declared resource is finished with and should be dropped.
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Deleted | Self::Orphaned)
    }

    /// The remote object matches the declaration (or is gone, as asked).
    #[must_use]
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            Self::Created | Self::Updated | Self::UpToDate | Self::Deleted | Self::Orphaned
        )
    }

    fn from_error(err: ReconcileError) -> Self {
        match err {
            ReconcileError::ReferenceUnresolved { .. } => Self::NotReady(err.to_string()),
            other => Self::Failed(other),
        }
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Updated => f.write_str("updated"),
            Self::UpToDate => f.write_str("up to date"),
            Self::Deleting => f.write_str("deleting"),
            Self::Deleted => f.write_str("deleted"),
            Self::Orphaned => f.write_str("orphaned"),
            Self::NotReady(reason) => write!(f, "not ready: {reason}"),
            Self::Failed(err) => write!(f, "failed: {err}"),
        }
    }
}

/// Result of one cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    /// Secrets produced by this cycle. Never stored in status.
    pub connection_details: ConnectionDetails,
}

impl CycleReport {
    pub(crate) fn new(outcome: CycleOutcome) -> Self {
        Self {
            outcome,
            connection_details: ConnectionDetails::new(),
        }
    }
}

/// Drives declared resources toward their declared state through an [`IdentityApi`].
#[derive(Clone, Copy)]
pub struct Reconciler<'a> {
    pub(crate) api: &'a dyn IdentityApi,
    pub(crate) store: &'a dyn ResourceStore,
}

impl<'a> Reconciler<'a> {
    #[must_use]
    pub fn new(api: &'a dyn IdentityApi, store: &'a dyn ResourceStore) -> Self {
        Self { api, store }
    }

    /// Runs one cycle for a managed (non-binding) resource.
    pub async fn reconcile<K: ManagedKind>(&self, resource: &mut DeclaredOf<K>) -> CycleReport {
        let report = match self.converge::<K>(resource).await {
            Ok(report) => report,
            Err(err) => CycleReport::new(CycleOutcome::from_error(err)),
        };
        finish_cycle(
            K::KIND,
            &resource.meta.name,
            &mut resource.status,
            &report.outcome,
        );
        report
    }

    async fn converge<K: ManagedKind>(
        &self,
        resource: &mut DeclaredOf<K>,
    ) -> Result<CycleReport, ReconcileError> {
        if resource.meta.deletion_requested
            && resource.meta.deletion_policy == DeletionPolicy::Orphan
        {
            return Ok(CycleReport::new(CycleOutcome::Orphaned));
        }

        let remote = self.observe::<K>(resource).await?;

        if resource.meta.deletion_requested {
            return self.delete::<K>(remote).await;
        }

        match remote {
            None => self.create::<K>(resource).await,
            Some(remote) => self.converge_present::<K>(resource, remote).await,
        }
    }

    /// Looks the object up by its observed id, falling back to discovery by
    /// stable name when there is none or it no longer exists.
    async fn observe<K: ManagedKind>(
        &self,
        resource: &DeclaredOf<K>,
    ) -> Result<Option<K::Remote>, ReconcileError> {
        if let Some(id) = &resource.status.observed_id {
            let found = K::get(self.api, id)
                .await
                .map_err(ReconcileError::api("get", K::KIND))?;
            if found.is_some() {
                return Ok(found);
            }
            debug!(
                kind = %K::KIND,
                name = %resource.meta.name,
                id = %id,
                "Observed id no longer exists, falling back to discovery"
            );
        }

        let key = discovery_key(&resource.status, K::spec_stable_name(&resource.spec));
        K::discover(self.api, &key)
            .await
            .map_err(ReconcileError::api("find", K::KIND))
    }

    async fn create<K: ManagedKind>(
        &self,
        resource: &mut DeclaredOf<K>,
    ) -> Result<CycleReport, ReconcileError> {
        let created = K::create(self.api, &resource.spec)
            .await
            .map_err(ReconcileError::api("create", K::KIND))?;
        let id = K::remote_id(&created);
        if id.is_empty() {
            return Err(ReconcileError::IncompleteResponse {
                operation: "create",
                kind: K::KIND,
            });
        }
        record::<K>(resource, id.clone(), &created);

        K::converge_out_of_band(self.api, &id, &resource.spec).await;
        Ok(CycleReport {
            outcome: CycleOutcome::Created,
            connection_details: K::connection_details(&created),
        })
    }

    async fn converge_present<K: ManagedKind>(
        &self,
        resource: &mut DeclaredOf<K>,
        remote: K::Remote,
    ) -> Result<CycleReport, ReconcileError> {
        K::check_invariant(&remote).map_err(ReconcileError::InvariantViolated)?;
        let id = K::remote_id(&remote);
        if id.is_empty() {
            return Err(ReconcileError::MissingIdentity {
                operation: "update",
                kind: K::KIND,
            });
        }
        record::<K>(resource, id.clone(), &remote);

        if K::is_up_to_date(&resource.spec, &remote) {
            return Ok(CycleReport::new(CycleOutcome::UpToDate));
        }

        let updated = K::update(self.api, &id, &resource.spec)
            .await
            .map_err(ReconcileError::api("update", K::KIND))?;
        // Some responses carry no body fields; read the object back instead.
        let updated = if K::remote_id(&updated).is_empty() {
            K::get(self.api, &id)
                .await
                .map_err(ReconcileError::api("get", K::KIND))?
                .ok_or(ReconcileError::IncompleteResponse {
                    operation: "update",
                    kind: K::KIND,
                })?
        } else {
            updated
        };
        record::<K>(resource, id.clone(), &updated);

        K::converge_out_of_band(self.api, &id, &resource.spec).await;
        Ok(CycleReport {
            outcome: CycleOutcome::Updated,
            connection_details: K::connection_details(&updated),
        })
    }

    /// Deletes the object and checks it is gone. An absent object is
    /// already deleted.
    async fn delete<K: ManagedKind>(
        &self,
        remote: Option<K::Remote>,
    ) -> Result<CycleReport, ReconcileError> {
        let Some(remote) = remote else {
            return Ok(CycleReport::new(CycleOutcome::Deleted));
        };
        K::check_invariant(&remote).map_err(ReconcileError::InvariantViolated)?;
        let id = K::remote_id(&remote);
        if id.is_empty() {
            return Err(ReconcileError::MissingIdentity {
                operation: "delete",
                kind: K::KIND,
            });
        }

        K::delete(self.api, &id)
            .await
            .map_err(ReconcileError::api("delete", K::KIND))?;
        let still_there = K::get(self.api, &id)
            .await
            .map_err(ReconcileError::api("get", K::KIND))?
            .is_some();
        Ok(CycleReport::new(if still_there {
            CycleOutcome::Deleting
        } else {
            CycleOutcome::Deleted
        }))
    }
}

fn record<K: ManagedKind>(resource: &mut DeclaredOf<K>, id: ExternalId, remote: &K::Remote) {
    let stable_name = StableName::new(K::spec_stable_name(&resource.spec));
    resource.status.record_identity(id, stable_name);
    resource.status.observed = K::observe(remote);
}

/// Writes the outcome into the status condition and logs it.
pub(crate) fn finish_cycle<O>(
    kind: ResourceKind,
    name: &ResourceName,
    status: &mut Status<O>,
    outcome: &CycleOutcome,
) {
    let id = status
        .observed_id
        .as_ref()
        .map_or("", |id| id.as_str())
        .to_string();
    match outcome {
        CycleOutcome::Created | CycleOutcome::Updated => {
            status.set_condition(Health::Available, None);
            info!(%kind, %name, id = %id, "Resource {outcome}");
        }
        CycleOutcome::UpToDate => {
            status.set_condition(Health::Available, None);
            debug!(%kind, %name, id = %id, "Resource up to date");
        }
        CycleOutcome::Deleting => {
            status.set_condition(
                Health::Unavailable,
                Some("deletion issued, object still present".to_string()),
            );
            info!(%kind, %name, id = %id, "Deletion pending");
        }
        CycleOutcome::Deleted | CycleOutcome::Orphaned => {
            status.set_condition(Health::Unavailable, Some(outcome.to_string()));
            info!(%kind, %name, id = %id, "Resource {outcome}");
        }
        CycleOutcome::NotReady(reason) => {
            status.set_condition(Health::Unresolved, Some(reason.clone()));
            debug!(%kind, %name, "Not ready: {reason}");
        }
        CycleOutcome::Failed(err) => {
            status.set_condition(err.health(), Some(err.to_string()));
            warn!(
                %kind,
                %name,
                id = %id,
                retryable = err.is_retryable(),
                "Reconcile failed: {err}"
            );
        }
    }
}
