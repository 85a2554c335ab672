//! Configuration for pocketctl.
//!
//! Settings live in `~/.pocketctl/config.toml` (or the file passed with
//! `--config`). String values may reference environment variables as
//! `${VAR}`, which keeps the API key out of the file:
//!
//! ```toml
//! [pocketid]
//! endpoint = "https://id.example.com"
//! api_key = "${POCKETID_API_KEY}"
//! timeout_seconds = 30
//!
//! [reconcile]
//! manifest = "pocketid.toml"
//! state_dir = "~/.pocketctl/state"
//! poll_interval_seconds = 60
//! cycle_timeout_seconds = 120
//!
//! [retry]
//! max_retries = 2
//! ```

mod manifest;

pub use manifest::{Manifest, ManifestEntry};

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fmt, fs, io};

use serde::Deserialize;
use toml::de::Error as TomlError;
use thiserror::Error;

use pocketctl_types::ApiKey;

pub const ENDPOINT_ENV: &str = "POCKETID_ENDPOINT";
pub const API_KEY_ENV: &str = "POCKETID_API_KEY";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_CYCLE_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_MANIFEST: &str = "pocketid.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: TomlError,
    },
    #[error("missing Pocket ID {what}: set [pocketid].{what} or {env}")]
    MissingCredential {
        what: &'static str,
        env: &'static str,
    },
    #[error("invalid manifest {}: {reason}", path.display())]
    InvalidManifest { path: PathBuf, reason: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PocketctlConfig {
    pub pocketid: Option<PocketIdConfig>,
    pub reconcile: Option<ReconcileConfig>,
    pub retry: Option<RetrySection>,
    /// Directory the config was read from; relative paths resolve against it.
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PocketIdConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_seconds: Option<u64>,
}

// Manual Debug impl to prevent leaking the API key in logs.
impl fmt::Debug for PocketIdConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PocketIdConfig")
            .field("endpoint", &self.endpoint)
            .field(
                "api_key",
                &if self.api_key.is_some() {
                    "[REDACTED]"
                } else {
                    "None"
                },
            )
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileConfig {
    pub manifest: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub poll_interval_seconds: Option<u64>,
    pub cycle_timeout_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    pub max_retries: Option<u32>,
}

/// Endpoint and API key used to reach Pocket ID.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Base URL without a trailing `/`.
    pub endpoint: String,
    pub api_key: ApiKey,
    pub timeout: Duration,
}

/// Effective reconciliation settings with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileSettings {
    pub manifest: PathBuf,
    pub state_dir: PathBuf,
    pub poll_interval: Duration,
    pub cycle_timeout: Duration,
    pub max_retries: u32,
}

impl PocketctlConfig {
    /// Loads the config file.
    ///
    /// An explicit path must exist. The default path is optional: when it is
    /// missing, every setting falls back to its default.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match config_path() {
                Some(path) if path.exists() => path,
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let mut config = Self::parse(&content, &path)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| {
            tracing::warn!(path = %path.display(), "Failed to parse config: {source}");
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Resolves credentials from the process environment.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        self.credentials_with(|name| env::var(name).ok())
    }

    /// Resolves credentials. `POCKETID_ENDPOINT` and `POCKETID_API_KEY`
    /// override the file; `${VAR}` references in the file are expanded with
    /// the same lookup.
    pub fn credentials_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Credentials, ConfigError> {
        let section = self.pocketid.as_ref();
        let resolve = |env_name: &str, value: Option<&String>| {
            lookup(env_name)
                .or_else(|| value.map(|raw| expand_with(raw, &lookup)))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let endpoint = resolve(ENDPOINT_ENV, section.and_then(|s| s.endpoint.as_ref())).ok_or(
            ConfigError::MissingCredential {
                what: "endpoint",
                env: ENDPOINT_ENV,
            },
        )?;
        let api_key = resolve(API_KEY_ENV, section.and_then(|s| s.api_key.as_ref()))
            .and_then(|key| ApiKey::new(key).ok())
            .ok_or(ConfigError::MissingCredential {
                what: "api_key",
                env: API_KEY_ENV,
            })?;
        let timeout_secs = section
            .and_then(|s| s.timeout_seconds)
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Credentials {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    #[must_use]
    pub fn reconcile_settings(&self) -> ReconcileSettings {
        let section = self.reconcile.as_ref();
        let manifest = section
            .and_then(|s| s.manifest.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST));
        let state_dir = section
            .and_then(|s| s.state_dir.clone())
            .or_else(default_state_dir)
            .unwrap_or_else(|| PathBuf::from(".pocketctl-state"));

        let seconds = |value: Option<u64>, default: u64| {
            Duration::from_secs(value.filter(|secs| *secs > 0).unwrap_or(default))
        };

        ReconcileSettings {
            manifest: self.resolve_path(&manifest),
            state_dir: self.resolve_path(&state_dir),
            poll_interval: seconds(
                section.and_then(|s| s.poll_interval_seconds),
                DEFAULT_POLL_INTERVAL_SECS,
            ),
            cycle_timeout: seconds(
                section.and_then(|s| s.cycle_timeout_seconds),
                DEFAULT_CYCLE_TIMEOUT_SECS,
            ),
            max_retries: self
                .retry
                .as_ref()
                .and_then(|r| r.max_retries)
                .unwrap_or(DEFAULT_MAX_RETRIES),
        }
    }

    /// Expands `~/` and anchors relative paths at the config file's directory.
    fn resolve_path(&self, path: &Path) -> PathBuf {
        let expanded = expand_home(path);
        if expanded.is_absolute() {
            return expanded;
        }
        match &self.base_dir {
            Some(base) => base.join(expanded),
            None => expanded,
        }
    }
}

pub fn expand_env_vars(value: &str) -> String {
    expand_with(value, |name| env::var(name).ok())
}

/// `${VAR}` expansion. Unknown variables become empty; an unclosed `${` is
/// kept verbatim.
fn expand_with(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        if !name.is_empty() {
            out.push_str(&lookup(name).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".pocketctl").join("config.toml"))
}

fn default_state_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".pocketctl").join("state"))
}
