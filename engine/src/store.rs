use pocketctl_types::{ExternalId, ResourceKind, ResourceName};

/// What the store knows about a declared resource's remote identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedIdentity {
    NotDeclared,
    /// Declared, but no cycle has observed or created it yet.
    Pending,
    Observed(ExternalId),
}

/// Read access to the observed status of other declared resources.
///
/// Reference resolution goes through this seam; it is never handed a
/// mutable view, so a pass can share one store across concurrent cycles.
pub trait ResourceStore: Send + Sync {
    fn observed_identity(&self, kind: ResourceKind, name: &ResourceName) -> ObservedIdentity;
}
