//! Reconciliation engine for pocketctl.
//!
//! # Architecture
//!
//! - [`Reconciler`] - The convergence state machine. One cycle observes a
//!   remote object and creates, updates, deletes or leaves it alone.
//! - [`ManagedKind`] - Per-kind capabilities (lookup, drift check, requests,
//!   invariants, out-of-band work) the state machine is generic over.
//! - [`Membership`] - The binding variant: existence only, both references
//!   resolved before any remote call.
//! - [`Inventory`] - Declared resources and their status; the
//!   [`ResourceStore`] references resolve against.
//! - [`run_pass`] - One pass over every declared resource in stage order.
//! - [`StateFile`] - Status snapshot and connection details on disk.
//!
//! The engine never retries on its own. A failed cycle records its error in
//! the resource's condition and the next pass starts over from observation.

mod binding;
mod error;
mod inventory;
mod kind;
pub mod kinds;
mod pass;
mod reconciler;
mod resolve;
mod state;
mod store;

#[cfg(test)]
mod fake;

pub use binding::{BindingOf, ClientGroupMembership, Membership, UserGroupMembership};
pub use error::ReconcileError;
pub use inventory::{Inventory, ResourceCondition};
pub use kind::{DeclaredOf, ManagedKind};
pub use pass::{PassEntry, PassReport, run_pass};
pub use reconciler::{CycleOutcome, CycleReport, Reconciler};
pub use resolve::{discovery_key, resolve_reference};
pub use state::{STATUS_FILE, StateError, StateFile, StatusSnapshot};
pub use store::{ObservedIdentity, ResourceStore};
