//! Configuration discovery and loading.
//!
//! Lookup order: explicit path (an unreadable explicit path is an error),
//! `./cadence.yaml`, `<user config dir>/cadence/config.yaml`, built-in
//! defaults. A present-but-invalid file is always an error; silently
//! falling back to defaults would mask typos.

use super::types::ReportConfig;
use crate::error::Error;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Load the report configuration.
pub fn load(explicit: Option<&Path>) -> Result<ReportConfig, Error> {
    if let Some(path) = explicit {
        return read_file(path);
    }

    for candidate in candidates() {
        if candidate.exists() {
            info!(path = %candidate.display(), "loading config");
            return read_file(&candidate);
        }
        debug!(path = %candidate.display(), "no config file");
    }

    debug!("no config file found, using defaults");
    Ok(ReportConfig::default())
}

fn candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("cadence.yaml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("cadence").join("config.yaml"));
    }
    paths
}

fn read_file(path: &Path) -> Result<ReportConfig, Error> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}
