//! YAML deployment manifest.
//!
//! A manifest fixes the file order for a batch deploy and can override the
//! pipeline's tuning knobs. Command-line flags always win over manifest
//! values; manifest values win over built-in defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Complete YAML configuration for the deploy command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployManifest {
    /// Dump files in deployment order. Schema files belong before the data
    /// files that reference them.
    pub files: Vec<PathBuf>,
    /// Read chunk size in bytes for streaming mode
    pub chunk_size: Option<usize>,
    /// File size in bytes above which deployment streams
    pub streaming_threshold: Option<u64>,
    /// Statement executed before the payload
    pub fk_disable: Option<String>,
    /// Statement executed after a fully successful payload
    pub fk_enable: Option<String>,
}

impl DeployManifest {
    /// Load a manifest from a YAML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let manifest: DeployManifest = serde_yaml_ng::from_str(&content)?;
        Ok(manifest)
    }
}
