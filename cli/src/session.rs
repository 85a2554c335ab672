//! A loaded manifest, its state directory and the client that reconciles it.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use std::{fs, iter};

use anyhow::{Context, Result};
use tokio::signal;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use pocketctl_client::{PocketIdClient, RetryConfig};
use pocketctl_config::{Manifest, PocketctlConfig, ReconcileSettings};
use pocketctl_engine::{
    Inventory, PassReport, ResourceCondition, STATUS_FILE, StateFile, run_pass,
};
use pocketctl_types::Health;

/// How often `run` checks the manifest for changes.
const MANIFEST_CHECK_INTERVAL: Duration = Duration::from_secs(2);

/// Declared resources with their restored status.
pub struct Workspace {
    pub settings: ReconcileSettings,
    pub inventory: Inventory,
    pub state: StateFile,
}

impl Workspace {
    /// Loads the manifest and applies the saved status snapshot.
    pub fn open(config: &PocketctlConfig) -> Result<Self> {
        let settings = config.reconcile_settings();
        let manifest = Manifest::load(&settings.manifest)?;
        let mut inventory = Inventory::from_manifest(manifest);

        let state = StateFile::new(&settings.state_dir);
        let snapshot = state.load().context("failed to load saved status")?;
        debug!(saved = snapshot.len(), declared = inventory.len(), "Restoring status");
        inventory.restore(snapshot);

        Ok(Self {
            settings,
            inventory,
            state,
        })
    }

    pub fn conditions(&self) -> Vec<ResourceCondition> {
        self.inventory.conditions()
    }

    /// True when every declared resource is `Available`.
    pub fn all_available(&self) -> bool {
        self.conditions().iter().all(|resource| {
            resource
                .condition
                .as_ref()
                .is_some_and(|condition| condition.health == Health::Available)
        })
    }

    fn reload(&mut self) -> Result<()> {
        let manifest = Manifest::load(&self.settings.manifest)?;
        self.inventory.reload(manifest);
        Ok(())
    }

    /// Saves status and publishes connection details. Failures are logged;
    /// the next pass saves again.
    fn persist(&self, report: &PassReport) {
        if let Err(e) = self.state.save(&self.inventory.snapshot()) {
            error!("Failed to save status: {e}");
        }
        if let Err(e) = self.state.record_pass(report) {
            error!("Failed to publish connection details: {e}");
        }
    }
}

/// A workspace plus the Pocket ID client.
pub struct Session {
    client: PocketIdClient,
    workspace: Workspace,
}

impl Session {
    pub fn open(config: &PocketctlConfig) -> Result<Self> {
        let workspace = Workspace::open(config)?;
        let credentials = config.credentials()?;
        let client = PocketIdClient::new(
            &credentials.endpoint,
            credentials.api_key,
            credentials.timeout,
        )?
        .with_retry(RetryConfig::default().with_max_retries(workspace.settings.max_retries));

        info!(
            endpoint = client.endpoint(),
            manifest = %workspace.settings.manifest.display(),
            resources = workspace.inventory.len(),
            "Session opened"
        );
        Ok(Self { client, workspace })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub async fn pass(&mut self) -> PassReport {
        let report = run_pass(
            &self.client,
            &mut self.workspace.inventory,
            self.workspace.settings.cycle_timeout,
        )
        .await;
        self.workspace.persist(&report);
        report
    }

    /// Reconciles until Ctrl-C. A pass that is running when the signal
    /// arrives finishes and is saved first.
    pub async fn run(&mut self) -> Result<()> {
        let mut ticker = interval(self.workspace.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut manifest_check = interval(MANIFEST_CHECK_INTERVAL);
        manifest_check.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let manifest_path = self.workspace.settings.manifest.clone();
        let mut last_modified = modified_at(&manifest_path);

        let shutdown = signal::ctrl_c();
        tokio::pin!(shutdown);

        info!(
            poll_secs = self.workspace.settings.poll_interval.as_secs(),
            "Reconciling until interrupted"
        );
        loop {
            tokio::select! {
                result = &mut shutdown => {
                    result.context("failed to listen for Ctrl-C")?;
                    info!("Interrupted, shutting down");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.pass().await;
                }
                _ = manifest_check.tick() => {
                    let current = modified_at(&manifest_path);
                    if current == last_modified {
                        continue;
                    }
                    last_modified = current;
                    match self.workspace.reload() {
                        Ok(()) => {
                            let resources = self.workspace.inventory.len();
                            info!(resources, "Manifest changed, reconciling");
                            self.pass().await;
                        }
                        Err(e) => {
                            warn!("Manifest changed but could not be parsed: {e:#}");
                        }
                    }
                }
            }
        }
    }
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// Renders conditions as an aligned table.
pub fn render_status(conditions: &[ResourceCondition]) -> String {
    let rows: Vec<[String; 4]> = conditions
        .iter()
        .map(|resource| {
            let (health, message) = match &resource.condition {
                Some(condition) => (
                    condition.health.as_str().to_string(),
                    condition.message.clone().unwrap_or_default(),
                ),
                None => ("Pending".to_string(), String::new()),
            };
            [
                format!("{}/{}", resource.kind, resource.name),
                health,
                resource.observed_id.clone().unwrap_or_else(|| "-".to_string()),
                message,
            ]
        })
        .collect();

    let header = [
        "RESOURCE".to_string(),
        "HEALTH".to_string(),
        "ID".to_string(),
        "MESSAGE".to_string(),
    ];
    let mut widths = [0usize; 3];
    for row in iter::once(&header).chain(&rows) {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    for row in iter::once(&header).chain(&rows) {
        let line = format!(
            "{:<w0$}  {:<w1$}  {:<w2$}  {}",
            row[0],
            row[1],
            row[2],
            row[3],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Where `status` reads from, for the "nothing saved yet" hint.
pub fn status_file(workspace: &Workspace) -> PathBuf {
    workspace.state.dir().join(STATUS_FILE)
}
