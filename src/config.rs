// ⚙️ Import Configuration
// Defaults match the desktop importer; every field can be overridden from YAML

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// SQLite database holding blobs, snapshots and entities
    pub db_path: PathBuf,

    /// How long a statement waits on a locked database before failing
    pub busy_timeout_ms: u64,

    /// Run Reader → Mapper → Differ only; nothing is written
    pub validate_only: bool,

    /// Reject paths that do not end in `.L5X` (case-insensitive)
    pub require_l5x_extension: bool,

    /// Asset placement recorded on the controller row
    pub facility_id: Option<i64>,
    pub unit_id: Option<i64>,

    /// Rolling backups kept next to the database
    pub max_backups: usize,

    /// Accepted major numbers of the root `SchemaRevision` attribute
    pub supported_schema_majors: Vec<u32>,

    /// Refuse to apply when the store's registered schema fingerprint differs from ours
    pub abort_on_schema_mismatch: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            db_path: PathBuf::from("plc_sync.sqlite"),
            busy_timeout_ms: 30_000,
            validate_only: false,
            require_l5x_extension: true,
            facility_id: None,
            unit_id: None,
            max_backups: 5,
            supported_schema_majors: vec![1],
            abort_on_schema_mismatch: true,
        }
    }
}

impl ImportConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        ImportConfig {
            db_path: db_path.into(),
            ..Default::default()
        }
    }

    /// Load from a YAML file. Relative `db_path` values resolve against the file's directory.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_yaml_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        if config.db_path.is_relative() {
            if let Some(dir) = path.parent() {
                config.db_path = dir.join(&config.db_path);
            }
        }

        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: ImportConfig =
            serde_yaml::from_str(text).context("Failed to parse import config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.supported_schema_majors.is_empty() {
            anyhow::bail!("supported_schema_majors must list at least one revision");
        }
        if self.max_backups == 0 {
            anyhow::bail!("max_backups must be at least 1");
        }
        Ok(())
    }
}
