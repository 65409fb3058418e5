use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Sources and destination (can override CLI)
    pub source_events: Option<String>,
    pub source_songs: Option<String>,
    #[serde(alias = "destination_root_or_dsn")]
    pub destination: Option<String>,
    pub credentials: Option<CredentialsConfig>,

    // Tuning
    pub batch_size: Option<usize>,
    pub load_timeout_secs: Option<u64>,
    pub duration_tolerance_secs: Option<f64>,
    pub strict_integrity: Option<bool>,
    pub max_rejected: Option<usize>,

    /// Per-relation conflict policy, keyed by relation name.
    pub conflict_policy_overrides: BTreeMap<String, ConflictPolicyConfig>,
}

#[derive(Deserialize, Default, Clone)]
#[serde(default)]
pub struct CredentialsConfig {
    pub user: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    InsertIgnore,
    InsertOrUpdate,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConflictPolicyConfig {
    pub policy: PolicyKind,
    #[serde(default)]
    pub update_columns: Vec<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
