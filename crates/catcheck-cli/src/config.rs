//! TOML configuration for the catcheck binary.
//!
//! Every section is optional; command-line flags override file values via
//! [`CatcheckConfig::apply_cli`].

use std::path::{Path, PathBuf};

use catcheck_core::BatchPolicy;
use catcheck_error::{CatcheckError, Result};
use serde::Deserialize;

use crate::cli::CliArgs;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CatcheckConfig {
    pub cluster: ClusterSection,
    pub batch: BatchSection,
    pub repair: RepairSection,
    pub log: LogSection,
}

/// `[cluster]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClusterSection {
    /// Directory holding `coordinator.db` and `dbid_<n>.db`.
    pub snapshot_dir: Option<PathBuf>,
    pub database: String,
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            snapshot_dir: None,
            database: "postgres".to_owned(),
        }
    }
}

/// `[batch]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    /// Explicit batch size; derived from coordinator memory when unset.
    pub size: Option<usize>,
    #[serde(flatten)]
    pub policy: BatchPolicy,
}

/// `[repair]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RepairSection {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for RepairSection {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from("catcheck.repair"),
        }
    }
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

impl CatcheckConfig {
    /// Load from `path`, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p).map_err(|err| {
                    CatcheckError::config(format!("cannot read {}: {err}", p.display()))
                })?;
                Self::from_toml(&content)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|err| CatcheckError::config(format!("invalid config: {err}")))?;
        if config.batch.size == Some(0) {
            return Err(CatcheckError::config("[batch] size must be at least 1"));
        }
        Ok(config)
    }

    pub fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(dir) = &args.snapshot_dir {
            self.cluster.snapshot_dir = Some(dir.clone());
        }
        if let Some(database) = &args.database {
            self.cluster.database.clone_from(database);
        }
        if args.batch_size.is_some() {
            self.batch.size = args.batch_size;
        }
        if args.repair_extra {
            self.repair.enabled = true;
        }
        if let Some(dir) = &args.repair_dir {
            self.repair.dir.clone_from(dir);
        }
        if args.verbose {
            "debug".clone_into(&mut self.log.level);
        }
    }

    pub fn snapshot_dir(&self) -> Result<&Path> {
        self.cluster.snapshot_dir.as_deref().ok_or_else(|| {
            CatcheckError::config("no snapshot directory; pass --snapshot-dir or set [cluster] snapshot_dir")
        })
    }
}
