//! Configuration for the capture request resolver
//!
//! The resolver is configured with explicit objects instead of process-wide
//! registries. A [`ResolverConfig`] carries:
//! - the data item arena capacity (the pipeline's maximum node/output count)
//! - the node adjacency table, with node *names* so files stay readable
//!
//! # Files
//!
//! Configs are TOML by default; a `.json` extension selects JSON.
//!
//! ```toml
//! arena_capacity = 32
//!
//! [[path_table.paths]]
//! src = "root"
//! dst = "p2a"
//!
//! [[path_table.repeating]]
//! variant = "yuv_r1"
//! base = "yuv"
//! ```
//!
//! # Example
//!
//! ```ignore
//! use capture_resolver::config::ResolverConfig;
//!
//! let config = ResolverConfig::load("resolver.toml")?;
//! let table = config.path_table()?;
//! ```

use crate::error::{ResolverError, Result};
use crate::pipeline::path_table::PathTable;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default arena capacity, enough for the stock pipe with dual sensors.
pub const DEFAULT_ARENA_CAPACITY: usize = 32;

/// One directed edge of the path table, by node name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    pub src: String,
    pub dst: String,
}

/// Repeating node variant and the base node it is looked up as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatEntry {
    pub variant: String,
    pub base: String,
}

/// Name-based description of a [`PathTable`]. Path ids are 1-based positions
/// in `paths`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTableConfig {
    #[serde(default)]
    pub paths: Vec<PathEntry>,

    #[serde(default)]
    pub repeating: Vec<RepeatEntry>,
}

impl Default for PathTableConfig {
    fn default() -> Self {
        PathTable::stock().to_config()
    }
}

/// Top-level resolver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum number of data items one resolution may create
    pub arena_capacity: usize,

    /// Node adjacency table
    pub path_table: PathTableConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            arena_capacity: DEFAULT_ARENA_CAPACITY,
            path_table: PathTableConfig::default(),
        }
    }
}

impl ResolverConfig {
    /// Parse a TOML config string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ResolverError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file from disk (TOML, or JSON for `.json` files)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ResolverError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = if is_json(path) {
            serde_json::from_str(&content).map_err(|e| {
                ResolverError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        } else {
            toml::from_str(&content).map_err(|e| {
                ResolverError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        };
        config.validate()?;

        tracing::debug!(
            "Loaded resolver config from {:?}: capacity {}, {} paths",
            path,
            config.arena_capacity,
            config.path_table.paths.len()
        );
        Ok(config)
    }

    /// Load a config file, returning defaults if any error occurs
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path.as_ref()).unwrap_or_else(|e| {
            tracing::warn!("Using default resolver config: {}", e);
            Self::default()
        })
    }

    /// Save the config to disk (TOML, or JSON for `.json` files)
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ResolverError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = if is_json(path) {
            serde_json::to_string_pretty(self)
                .map_err(|e| ResolverError::Config(format!("Failed to serialize config: {}", e)))?
        } else {
            toml::to_string_pretty(self)
                .map_err(|e| ResolverError::Config(format!("Failed to serialize config: {}", e)))?
        };

        std::fs::write(path, content).map_err(|e| {
            ResolverError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Build the path table this config describes
    pub fn path_table(&self) -> Result<PathTable> {
        PathTable::from_config(&self.path_table)
    }

    fn validate(&self) -> Result<()> {
        if self.arena_capacity == 0 {
            return Err(ResolverError::Config(
                "arena_capacity must be at least 1".to_string(),
            ));
        }
        self.path_table().map(|_| ())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
