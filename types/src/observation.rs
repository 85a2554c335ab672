//! What a reconciliation cycle last saw of each remote object.
//!
//! Observations live in status and are persisted to the state file, so they
//! never carry secrets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{RemoteGroup, RemoteOidcClient, RemoteUser};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserObservation {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub locale: String,
    pub disabled: bool,
    pub is_admin: bool,
    pub groups: Vec<String>,
    pub custom_claims: BTreeMap<String, String>,
}

impl From<&RemoteUser> for UserObservation {
    fn from(remote: &RemoteUser) -> Self {
        Self {
            username: remote.username.clone(),
            email: remote.email.clone(),
            first_name: remote.first_name.clone(),
            last_name: remote.last_name.clone(),
            locale: remote.locale.clone(),
            disabled: remote.disabled,
            is_admin: remote.is_admin,
            groups: remote.user_groups.clone(),
            custom_claims: remote.custom_claims.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupObservation {
    pub name: String,
    pub friendly_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub custom_claims: BTreeMap<String, String>,
}

impl From<&RemoteGroup> for GroupObservation {
    fn from(remote: &RemoteGroup) -> Self {
        Self {
            name: remote.group_name.clone(),
            friendly_name: remote.friendly_name.clone(),
            created_at: remote.created_at.clone(),
            custom_claims: remote.custom_claims.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OidcClientObservation {
    pub name: String,
    pub callback_urls: Vec<String>,
    pub logout_callback_urls: Vec<String>,
    pub launch_url: String,
    pub is_public: bool,
    pub pkce_enabled: bool,
    pub has_logo: bool,
    pub groups: Vec<String>,
    pub custom_claims: BTreeMap<String, String>,
}

impl From<&RemoteOidcClient> for OidcClientObservation {
    fn from(remote: &RemoteOidcClient) -> Self {
        Self {
            name: remote.client_name.clone(),
            callback_urls: remote.redirect_uris.clone(),
            logout_callback_urls: remote.post_logout_uris.clone(),
            launch_url: remote.launch_url.clone(),
            is_public: remote.is_public,
            pkce_enabled: remote.require_pkce,
            has_logo: remote.has_logo,
            groups: remote.group_names.clone(),
            custom_claims: remote.custom_claims.clone(),
        }
    }
}

/// Both endpoints of a user-to-group membership as last observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserGroupBindingObservation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserObservation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupObservation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OidcClientGroupBindingObservation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<OidcClientObservation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupObservation>,
}
