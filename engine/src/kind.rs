//! The seam between the generic state machine and each managed kind.

use futures_util::future::BoxFuture;

use pocketctl_client::{ApiFut, IdentityApi};
use pocketctl_types::{ConnectionDetails, Declared, ExternalId, ResourceKind, StableName};

/// A declared resource of kind `K`.
pub type DeclaredOf<K> = Declared<<K as ManagedKind>::Spec, <K as ManagedKind>::Observation>;

/// Everything the [`Reconciler`](crate::Reconciler) needs to know about one
/// kind of remote object.
///
/// All operations are associated functions: a kind carries no state, and the
/// client is passed in explicitly.
pub trait ManagedKind: Send + Sync + 'static {
    type Spec: Clone + Send + Sync;
    type Observation: Clone + Default + Send + Sync;
    type Remote: Send + Sync;

    const KIND: ResourceKind;

    /// Human-legible declared name, used for discovery until a stable
    /// name has been recorded.
    fn spec_stable_name(spec: &Self::Spec) -> &str;
    /// Primary key of the remote object; empty when the response omitted it.
    fn remote_id(remote: &Self::Remote) -> ExternalId;
    fn observe(remote: &Self::Remote) -> Self::Observation;
    /// Whether the remote object already matches the declared state.
    fn is_up_to_date(spec: &Self::Spec, remote: &Self::Remote) -> bool;

    /// Rejects remote objects this kind must never adopt.
    fn check_invariant(_remote: &Self::Remote) -> Result<(), String> {
        Ok(())
    }

    /// Secrets to publish after a create or update.
    fn connection_details(_remote: &Self::Remote) -> ConnectionDetails {
        ConnectionDetails::new()
    }

    fn get<'a>(api: &'a dyn IdentityApi, id: &'a ExternalId) -> ApiFut<'a, Option<Self::Remote>>;
    fn discover<'a>(
        api: &'a dyn IdentityApi,
        key: &'a StableName,
    ) -> ApiFut<'a, Option<Self::Remote>>;
    fn create<'a>(api: &'a dyn IdentityApi, spec: &'a Self::Spec) -> ApiFut<'a, Self::Remote>;
    fn update<'a>(
        api: &'a dyn IdentityApi,
        id: &'a ExternalId,
        spec: &'a Self::Spec,
    ) -> ApiFut<'a, Self::Remote>;
    fn delete<'a>(api: &'a dyn IdentityApi, id: &'a ExternalId) -> ApiFut<'a, ()>;

    /// Side work that runs after every create and update but never decides
    /// the cycle's outcome.
    fn converge_out_of_band<'a>(
        _api: &'a dyn IdentityApi,
        _id: &'a ExternalId,
        _spec: &'a Self::Spec,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}
