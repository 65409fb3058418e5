mod file_config;

pub use file_config::{ConflictPolicyConfig, CredentialsConfig, FileConfig, PolicyKind};

use crate::staging::LoadOptions;
use crate::transform::BuildOptions;
use crate::warehouse::{destination_path, ConflictPolicies, ConflictPolicy};
use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_DURATION_TOLERANCE_SECS: f64 = 0.5;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub source_events: Option<PathBuf>,
    pub source_songs: Option<PathBuf>,
    pub destination: Option<String>,
    pub batch_size: usize,
    pub load_timeout_secs: u64,
    pub duration_tolerance_secs: f64,
    pub strict_integrity: bool,
    pub max_rejected: Option<usize>,
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            source_events: None,
            source_songs: None,
            destination: None,
            batch_size: DEFAULT_BATCH_SIZE,
            load_timeout_secs: DEFAULT_LOAD_TIMEOUT_SECS,
            duration_tolerance_secs: DEFAULT_DURATION_TOLERANCE_SECS,
            strict_integrity: false,
            max_rejected: None,
        }
    }
}

/// Destination login. The SQLite destination does not use it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub source_events: Option<PathBuf>,
    pub source_songs: Option<PathBuf>,
    /// SQLite database file of the warehouse.
    pub destination: PathBuf,
    pub credentials: Option<Credentials>,
    pub conflict_policies: ConflictPolicies,

    pub batch_size: usize,
    pub load_timeout: Duration,
    pub duration_tolerance_secs: f64,
    pub strict_integrity: bool,
    pub max_rejected: Option<usize>,
}

fn resolve_policies(overrides: BTreeMap<String, ConflictPolicyConfig>) -> Result<ConflictPolicies> {
    let mut policies = BTreeMap::new();
    for (relation, config) in overrides {
        let policy = match config.policy {
            PolicyKind::InsertIgnore => {
                if !config.update_columns.is_empty() {
                    bail!(
                        "conflict_policy_overrides.{}: update_columns only apply to insert_or_update",
                        relation
                    );
                }
                ConflictPolicy::InsertIgnore
            }
            PolicyKind::InsertOrUpdate => ConflictPolicy::InsertOrUpdate {
                update_columns: config.update_columns,
            },
        };
        policies.insert(relation, policy);
    }
    ConflictPolicies::new(policies).context("Invalid conflict_policy_overrides")
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let destination = file
            .destination
            .or_else(|| cli.destination.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("destination must be specified via --destination or in config file")
            })?;
        let destination = destination_path(&destination)?;
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                bail!("Destination directory does not exist: {:?}", parent);
            }
        }

        let source_events = file
            .source_events
            .map(PathBuf::from)
            .or_else(|| cli.source_events.clone());
        let source_songs = file
            .source_songs
            .map(PathBuf::from)
            .or_else(|| cli.source_songs.clone());

        let batch_size = file.batch_size.unwrap_or(cli.batch_size);
        if batch_size == 0 {
            bail!("batch_size must be at least 1");
        }

        let load_timeout_secs = file.load_timeout_secs.unwrap_or(cli.load_timeout_secs);
        if load_timeout_secs == 0 {
            bail!("load_timeout_secs must be at least 1");
        }

        let duration_tolerance_secs = file
            .duration_tolerance_secs
            .unwrap_or(cli.duration_tolerance_secs);
        if !duration_tolerance_secs.is_finite() || duration_tolerance_secs < 0.0 {
            bail!(
                "duration_tolerance_secs must be a non-negative number, got {}",
                duration_tolerance_secs
            );
        }

        let strict_integrity = file.strict_integrity.unwrap_or(cli.strict_integrity);
        let max_rejected = file.max_rejected.or(cli.max_rejected);

        let credentials = file.credentials.map(|c| Credentials {
            user: c.user,
            password: c.password,
        });

        let conflict_policies = resolve_policies(file.conflict_policy_overrides)?;

        Ok(Self {
            source_events,
            source_songs,
            destination,
            credentials,
            conflict_policies,
            batch_size,
            load_timeout: Duration::from_secs(load_timeout_secs),
            duration_tolerance_secs,
            strict_integrity,
            max_rejected,
        })
    }

    /// Both sources, required by a run.
    pub fn require_sources(&self) -> Result<(&Path, &Path)> {
        match (&self.source_events, &self.source_songs) {
            (Some(events), Some(songs)) => Ok((events.as_path(), songs.as_path())),
            (None, _) => {
                bail!("source_events must be specified via --events or in config file")
            }
            (_, None) => bail!("source_songs must be specified via --songs or in config file"),
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            max_rejected: self.max_rejected,
        }
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            strict_integrity: self.strict_integrity,
        }
    }
}
