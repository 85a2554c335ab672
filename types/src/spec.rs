//! Desired state per resource kind, as written in the manifest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Reference;

/// Desired state shared by `User` and `AdminUser`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserSpec {
    pub username: String,
    pub email: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Preferred language and region, e.g. `en-US`.
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub disabled: bool,
    /// Extra claims added to issued tokens.
    #[serde(default)]
    pub custom_claims: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSpec {
    pub name: String,
    /// Display name. Pocket ID requires one.
    pub friendly_name: String,
    #[serde(default)]
    pub custom_claims: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OidcClientSpec {
    /// Display name shown during sign-in.
    pub name: String,
    pub callback_urls: Vec<String>,
    #[serde(default)]
    pub logout_callback_urls: Vec<String>,
    #[serde(default)]
    pub launch_url: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub pkce_enabled: bool,
    /// Image downloaded and uploaded as the client logo on every create and
    /// update. PNG, JPEG, GIF or SVG, at most 2 MiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub custom_claims: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserGroupBindingSpec {
    pub user: Reference,
    pub group: Reference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OidcClientGroupBindingSpec {
    pub client: Reference,
    pub group: Reference,
}
