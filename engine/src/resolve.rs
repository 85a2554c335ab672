//! Reference resolution and discovery keys.

use pocketctl_types::{ExternalId, Reference, ResourceKind, StableName, Status};

use crate::ReconcileError;
use crate::store::{ObservedIdentity, ResourceStore};

/// Resolves a reference to the remote id it denotes.
///
/// Literals are returned as-is without consulting the store. Pointers are
/// looked up in each of `targets` in order and resolve to the first observed
/// identity; a pointer to something undeclared or not yet observed is
/// [`ReconcileError::ReferenceUnresolved`].
pub fn resolve_reference(
    store: &dyn ResourceStore,
    field: &'static str,
    reference: &Reference,
    targets: &[ResourceKind],
) -> Result<ExternalId, ReconcileError> {
    match reference {
        Reference::Literal(id) => Ok(id.clone()),
        Reference::Pointer { name } => {
            let mut declared = false;
            for kind in targets {
                match store.observed_identity(*kind, name) {
                    ObservedIdentity::Observed(id) => return Ok(id),
                    ObservedIdentity::Pending => declared = true,
                    ObservedIdentity::NotDeclared => {}
                }
            }
            Err(ReconcileError::ReferenceUnresolved {
                field,
                target: name.clone(),
                reason: if declared {
                    "has not been observed yet"
                } else {
                    "is not declared"
                },
            })
        }
        Reference::Selector(_) => Err(ReconcileError::SelectorUnsupported { field }),
    }
}

/// The name to discover a remote object by: the recorded stable name when
/// set, otherwise the declared name.
#[must_use]
pub fn discovery_key<O>(status: &Status<O>, spec_name: &str) -> StableName {
    status
        .stable_name
        .clone()
        .unwrap_or_else(|| StableName::new(spec_name))
}
