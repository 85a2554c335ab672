//! Pocket ID wire types.
//!
//! Field names follow the Pocket ID JSON API. Optional fields the server
//! omits deserialize to their zero value, so an absent map and an empty map
//! are indistinguishable downstream.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub locale: String,
    pub disabled: bool,
    pub is_admin: bool,
    /// Names (not ids) of the groups the user belongs to.
    pub user_groups: Vec<String>,
    pub custom_claims: BTreeMap<String, String>,
}

/// Body of both `POST /api/users` and `PUT /api/users/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub last_name: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub locale: String,
    #[serde(skip_serializing_if = "is_false", default)]
    pub disabled: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    pub is_admin: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub custom_claims: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteGroup {
    pub id: String,
    pub group_name: String,
    pub friendly_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub custom_claims: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRequest {
    pub group_name: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub friendly_name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub custom_claims: BTreeMap<String, String>,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteOidcClient {
    pub id: String,
    pub client_name: String,
    /// Only present in the create response of a confidential client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub redirect_uris: Vec<String>,
    pub post_logout_uris: Vec<String>,
    #[serde(rename = "launchURL")]
    pub launch_url: String,
    pub is_public: bool,
    #[serde(rename = "requirePKCE")]
    pub require_pkce: bool,
    pub has_logo: bool,
    pub custom_claims: BTreeMap<String, String>,
    /// Names of the groups allowed to use this client.
    pub group_names: Vec<String>,
}

// Manual Debug impl to keep the client secret out of logs.
impl fmt::Debug for RemoteOidcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteOidcClient")
            .field("id", &self.id)
            .field("client_name", &self.client_name)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uris", &self.redirect_uris)
            .field("post_logout_uris", &self.post_logout_uris)
            .field("launch_url", &self.launch_url)
            .field("is_public", &self.is_public)
            .field("require_pkce", &self.require_pkce)
            .field("has_logo", &self.has_logo)
            .field("custom_claims", &self.custom_claims)
            .field("group_names", &self.group_names)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcClientRequest {
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub post_logout_uris: Vec<String>,
    #[serde(rename = "launchURL", skip_serializing_if = "String::is_empty", default)]
    pub launch_url: String,
    #[serde(skip_serializing_if = "is_false", default)]
    pub is_public: bool,
    #[serde(rename = "requirePKCE", skip_serializing_if = "is_false", default)]
    pub require_pkce: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub custom_claims: BTreeMap<String, String>,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if passes by reference
fn is_false(value: &bool) -> bool {
    !*value
}
