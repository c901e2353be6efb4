//! Import configuration.
//!
//! Settings are read from `geocache-import.json` in the working directory,
//! or from the file named by `GEOCACHE_IMPORT_CONFIG`. A missing file means
//! defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Config file looked up in the working directory
const CONFIG_FILE: &str = "geocache-import.json";

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "GEOCACHE_IMPORT_CONFIG";

pub const DATA_DIR: &str = "data";
pub const OUT_PATH: &str = "data/caches.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory (or single file) imported when no path is given.
    pub data_dir: PathBuf,
    pub output_path: PathBuf,
    /// Default tracing filter; `RUST_LOG` takes precedence.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from(DATA_DIR),
            output_path: PathBuf::from(OUT_PATH),
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }
}
