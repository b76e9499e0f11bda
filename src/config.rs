// ⚙️ Configuration
// JSON file → environment overrides → CLI flags (applied by the binary)

use crate::parser::SourceFormat;
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_DATABASE: &str = "IBAN_BIC_DB";
pub const ENV_DATA_DIR: &str = "IBAN_BIC_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database holding the loaded registries
    pub database_path: PathBuf,

    /// Directory holding the registry files under their default names
    pub data_dir: PathBuf,

    /// Optional JSON file with BIC override rules; the standard set otherwise
    pub overrides_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: PathBuf::from("bankdata.db"),
            data_dir: PathBuf::from("data"),
            overrides_path: None,
        }
    }
}

impl Config {
    /// Load from a JSON file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))
    }

    /// Apply `IBAN_BIC_DB` / `IBAN_BIC_DATA_DIR` from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any variable source (tests pass a closure)
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DATABASE).filter(|v| !v.is_empty()) {
            self.database_path = PathBuf::from(db);
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        self
    }

    /// Where the registry file for `format` is expected
    pub fn source_path(&self, format: SourceFormat) -> PathBuf {
        self.data_dir.join(format.default_file_name())
    }
}
