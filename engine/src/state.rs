//! On-disk state: the status snapshot and published connection details.
//!
//! ```text
//! state_dir/
//!   status.json
//!   connection/
//!     oidc_client/
//!       grafana.json      (0600)
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use pocketctl_types::{
    ConnectionDetails, GroupObservation, OidcClientGroupBindingObservation, OidcClientObservation,
    ResourceKind, ResourceName, Status, UserGroupBindingObservation, UserObservation,
};
use pocketctl_utils::{PersistMode, atomic_write, ensure_private_dir};

use crate::pass::PassReport;

pub const STATUS_FILE: &str = "status.json";
const CONNECTION_DIR: &str = "connection";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed state file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Persisted status of every declared resource, keyed by kind and name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    pub user: BTreeMap<ResourceName, Status<UserObservation>>,
    pub admin_user: BTreeMap<ResourceName, Status<UserObservation>>,
    pub group: BTreeMap<ResourceName, Status<GroupObservation>>,
    pub oidc_client: BTreeMap<ResourceName, Status<OidcClientObservation>>,
    pub user_group_binding: BTreeMap<ResourceName, Status<UserGroupBindingObservation>>,
    pub oidc_client_group_binding:
        BTreeMap<ResourceName, Status<OidcClientGroupBindingObservation>>,
}

impl StatusSnapshot {
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
}

/// The state directory.
#[derive(Debug, Clone)]
pub struct StateFile {
    dir: PathBuf,
}

impl StateFile {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn status_path(&self) -> PathBuf {
        self.dir.join(STATUS_FILE)
    }

    fn connection_path(&self, kind: ResourceKind, name: &ResourceName) -> PathBuf {
        self.dir
            .join(CONNECTION_DIR)
            .join(kind.as_str())
            .join(connection_file_name(name))
    }

    /// Loads the snapshot. A missing file is an empty snapshot.
    pub fn load(&self) -> Result<StatusSnapshot, StateError> {
        let path = self.status_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No state file yet");
                return Ok(StatusSnapshot::default());
            }
            Err(source) => return Err(StateError::Io { path, source }),
        };
        serde_json::from_slice(&bytes).map_err(|source| StateError::Json { path, source })
    }

    pub fn save(&self, snapshot: &StatusSnapshot) -> Result<(), StateError> {
        fs::create_dir_all(&self.dir).map_err(|source| StateError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.status_path();
        let mut snapshot = snapshot.clone();
        snapshot.saved_at = Some(Utc::now());
        let bytes = serde_json::to_vec_pretty(&snapshot).map_err(|source| StateError::Json {
            path: path.clone(),
            source,
        })?;
        atomic_write(&path, &bytes, PersistMode::Default)
            .map_err(|source| StateError::Io { path, source })
    }

    /// Writes connection details readable by the owner only.
    pub fn publish_connection(
        &self,
        kind: ResourceKind,
        name: &ResourceName,
        details: &ConnectionDetails,
    ) -> Result<(), StateError> {
        let path = self.connection_path(kind, name);
        if let Some(parent) = path.parent() {
            ensure_private_dir(parent).map_err(|source| StateError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let bytes = serde_json::to_vec_pretty(details).map_err(|source| StateError::Json {
            path: path.clone(),
            source,
        })?;
        atomic_write(&path, &bytes, PersistMode::OwnerOnly)
            .map_err(|source| StateError::Io { path, source })
    }

    pub fn read_connection(
        &self,
        kind: ResourceKind,
        name: &ResourceName,
    ) -> Result<Option<ConnectionDetails>, StateError> {
        let path = self.connection_path(kind, name);
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StateError::Json { path, source }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StateError::Io { path, source }),
        }
    }

    /// Removes published connection details. Missing files are fine.
    pub fn forget_connection(
        &self,
        kind: ResourceKind,
        name: &ResourceName,
    ) -> Result<(), StateError> {
        let path = self.connection_path(kind, name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StateError::Io { path, source }),
        }
    }

    /// Publishes every secret a pass produced and drops the secrets of
    /// resources the pass finished deleting.
    pub fn record_pass(&self, report: &PassReport) -> Result<(), StateError> {
        for entry in &report.entries {
            if entry.outcome.is_final() {
                self.forget_connection(entry.kind, &entry.name)?;
            } else if !entry.connection_details.is_empty() {
                self.publish_connection(entry.kind, &entry.name, &entry.connection_details)?;
                let keys: Vec<&str> = entry.connection_details.keys().collect();
                debug!(
                    kind = %entry.kind,
                    name = %entry.name,
                    ?keys,
                    "Published connection details"
                );
            }
        }
        Ok(())
    }
}

/// Keeps resource names from escaping the connection directory.
fn connection_file_name(name: &ResourceName) -> String {
    let sanitized: String = name
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized != name.as_str() {
        warn!(name = %name, file = %sanitized, "Resource name sanitized for connection file");
    }
    format!("{sanitized}.json")
}
