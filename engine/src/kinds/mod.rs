//! [`ManagedKind`](crate::ManagedKind) implementations for Pocket ID objects.

mod group;
mod oidc_client;
mod user;

pub use group::GroupKind;
pub use oidc_client::OidcClientKind;
pub use user::{AdminUserKind, UserKind};
