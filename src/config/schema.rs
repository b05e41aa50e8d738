//! Configuration schema for Replica
//!
//! Configuration is stored at `~/.config/replica/config.toml`

use crate::error::ReplicaResult;
use crate::resources::ResourceManager;
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Progress reporting
    pub progress: ProgressConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// Global caps enforced by the resource manager
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Memory budget for cached file contents, in bytes
    pub memory_bytes: u64,

    /// Disk operations (stat, read, write) allowed in flight at once
    pub disk_ops: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            memory_bytes: 128 * 1024 * 1024,
            disk_ops: 1,
        }
    }
}

impl LimitsConfig {
    /// Build the process-wide resource manager for these limits
    pub fn resource_manager(&self) -> ReplicaResult<ResourceManager> {
        ResourceManager::new(self.memory_bytes, self.disk_ops)
    }
}

/// Progress reporting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Show the progress line while copying
    pub enabled: bool,

    /// Refresh interval in milliseconds
    pub interval_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 701,
        }
    }
}
