//! Core domain types for pocketctl.
//!
//! Declared resources, references, observations and Pocket ID wire shapes.
//! No IO and no async; every other crate in the workspace builds on these.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod compare;
mod connection;
mod ids;
mod observation;
mod reference;
mod remote;
mod resource;
mod spec;

pub use compare::{same_claims, same_multiset};
pub use connection::ConnectionDetails;
pub use ids::{EmptyIdError, ExternalId, ResourceName, StableName};
pub use observation::{
    GroupObservation, OidcClientGroupBindingObservation, OidcClientObservation,
    UserGroupBindingObservation, UserObservation,
};
pub use reference::{RawReference, Reference, ReferenceError, Selector};
pub use remote::{
    GroupRequest, OidcClientRequest, RemoteGroup, RemoteOidcClient, RemoteUser, UserRequest,
};
pub use resource::{Condition, Declared, DeletionPolicy, Health, Metadata, Status};
pub use spec::{
    GroupSpec, OidcClientGroupBindingSpec, OidcClientSpec, UserGroupBindingSpec, UserSpec,
};

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Resource kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    User,
    AdminUser,
    Group,
    OidcClient,
    UserGroupBinding,
    OidcClientGroupBinding,
}

impl ResourceKind {
    /// Every kind, in the order a pass reconciles them.
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::User,
        ResourceKind::AdminUser,
        ResourceKind::Group,
        ResourceKind::OidcClient,
        ResourceKind::UserGroupBinding,
        ResourceKind::OidcClientGroupBinding,
    ];

    /// Manifest table name, also used in state file keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::AdminUser => "admin_user",
            Self::Group => "group",
            Self::OidcClient => "oidc_client",
            Self::UserGroupBinding => "user_group_binding",
            Self::OidcClientGroupBinding => "oidc_client_group_binding",
        }
    }

    /// Noun used in error messages ("failed to update OIDC client").
    #[must_use]
    pub const fn noun(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::AdminUser => "admin user",
            Self::Group => "group",
            Self::OidcClient => "OIDC client",
            Self::UserGroupBinding => "user group binding",
            Self::OidcClientGroupBinding => "OIDC client group binding",
        }
    }

    #[must_use]
    pub const fn is_binding(self) -> bool {
        matches!(self, Self::UserGroupBinding | Self::OidcClientGroupBinding)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// API Key
// ============================================================================

/// Pocket ID admin API key, sent as `X-API-KEY`.
///
/// Note: `Debug` is manually implemented to redact the key value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyIdError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(EmptyIdError::new("api key"));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(<redacted>)")
    }
}
