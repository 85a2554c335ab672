//! The declared-state manifest.
//!
//! ```toml
//! [[group]]
//! name = "eng"
//! spec = { name = "eng", friendly_name = "Engineering" }
//!
//! [[user_group_binding]]
//! name = "alice-eng"
//! spec = { user = { ref = "alice" }, group = { ref = "eng" } }
//! ```
//!
//! Every entry carries a `name` unique within its kind, an optional
//! `external_name` (the lookup key to adopt an existing object by), a
//! `delete` marker and a `deletion_policy`.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use pocketctl_types::{
    Declared, DeletionPolicy, GroupSpec, OidcClientGroupBindingSpec, OidcClientSpec,
    ResourceKind, ResourceName, StableName, UserGroupBindingSpec, UserSpec,
};

use crate::ConfigError;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry<S> {
    pub name: ResourceName,
    #[serde(default)]
    pub external_name: Option<String>,
    /// Marks the resource for deletion. It is removed from the state file once
    /// deletion completes.
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
    pub spec: S,
}

impl<S> ManifestEntry<S> {
    /// Builds the declared resource with an empty status. A non-blank
    /// `external_name` seeds the stable name used for discovery.
    #[must_use]
    pub fn into_declared<O: Default>(self) -> Declared<S, O> {
        let mut declared = Declared::new(self.name, self.spec);
        declared.meta.deletion_requested = self.delete;
        declared.meta.deletion_policy = self.deletion_policy;
        declared.status.stable_name = self
            .external_name
            .filter(|name| !name.trim().is_empty())
            .map(StableName::new);
        declared
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub user: Vec<ManifestEntry<UserSpec>>,
    #[serde(default)]
    pub admin_user: Vec<ManifestEntry<UserSpec>>,
    #[serde(default)]
    pub group: Vec<ManifestEntry<GroupSpec>>,
    #[serde(default)]
    pub oidc_client: Vec<ManifestEntry<OidcClientSpec>>,
    #[serde(default)]
    pub user_group_binding: Vec<ManifestEntry<UserGroupBindingSpec>>,
    #[serde(default)]
    pub oidc_client_group_binding: Vec<ManifestEntry<OidcClientGroupBindingSpec>>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let manifest: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        manifest.validate(path)?;
        Ok(manifest)
    }

    /// Total number of declared resources across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.user.len()
            + self.admin_user.len()
            + self.group.len()
            + self.oidc_client.len()
            + self.user_group_binding.len()
            + self.oidc_client_group_binding.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        check_unique(path, ResourceKind::User, &self.user)?;
        check_unique(path, ResourceKind::AdminUser, &self.admin_user)?;
        check_unique(path, ResourceKind::Group, &self.group)?;
        check_unique(path, ResourceKind::OidcClient, &self.oidc_client)?;
        check_unique(path, ResourceKind::UserGroupBinding, &self.user_group_binding)?;
        check_unique(
            path,
            ResourceKind::OidcClientGroupBinding,
            &self.oidc_client_group_binding,
        )?;

        // Users and admin users share the binding `ref` namespace.
        if let Some(entry) = self
            .admin_user
            .iter()
            .find(|admin| self.user.iter().any(|user| user.name == admin.name))
        {
            return Err(ConfigError::InvalidManifest {
                path: path.to_path_buf(),
                reason: format!(
                    "{:?} is declared as both a user and an admin_user",
                    entry.name.as_str()
                ),
            });
        }
        Ok(())
    }
}

fn check_unique<S>(
    path: &Path,
    kind: ResourceKind,
    entries: &[ManifestEntry<S>],
) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for entry in entries {
        if !seen.insert(&entry.name) {
            return Err(ConfigError::InvalidManifest {
                path: path.to_path_buf(),
                reason: format!("duplicate {kind} name {:?}", entry.name.as_str()),
            });
        }
    }
    Ok(())
}
