//! Engine configuration loaded from TOML files or constructed programmatically
//!
//! # TOML Format
//! ```toml
//! graph_path = "./data/web-google.pull.bin"
//! num_parts = 8
//! layout = "pull"
//! split = "vertex-balanced"
//! placement_stride = 9
//! max_iterations = 20
//! tolerance = 1e-6
//! ```

use crate::error::ConfigError;
use crate::placement::DEFAULT_STRIDE;
use crate::storage::{GraphOptions, Layout, SplitPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration of one engine run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Graph file in the binary CSR format
    pub graph_path: PathBuf,
    /// Partition count
    pub num_parts: usize,
    /// Layout of the graph file
    pub layout: Layout,
    /// Row split policy
    #[serde(default)]
    pub split: SplitPolicy,
    /// Total frontier capacity in bytes (default: dense bitmap per partition)
    #[serde(default)]
    pub frontier_size: Option<u64>,
    /// Intra-node placement stride
    #[serde(default = "default_stride")]
    pub placement_stride: usize,
    /// Iteration cap for [`Engine::run`](crate::Engine::run)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Pull programs stop once an iteration's L1 delta is at most this
    #[serde(default)]
    pub tolerance: Option<f64>,
}

fn default_stride() -> usize {
    DEFAULT_STRIDE
}

fn default_max_iterations() -> u32 {
    10
}

impl EngineConfig {
    /// Minimal config for a graph file
    #[must_use]
    pub fn new(graph_path: impl Into<PathBuf>, num_parts: usize, layout: Layout) -> Self {
        Self {
            graph_path: graph_path.into(),
            num_parts,
            layout,
            ..Self::default()
        }
    }

    /// Loads configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or validated
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on malformed TOML or invalid values
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ConfigError::Toml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises configuration to TOML
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if serialisation fails
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Toml(e.to_string()))
    }

    /// Check values that do not depend on the graph
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroPartitions`] for `num_parts == 0`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_parts == 0 {
            return Err(ConfigError::ZeroPartitions);
        }
        if self.placement_stride == 0 {
            return Err(ConfigError::ZeroStride);
        }
        Ok(())
    }

    /// Partitioning inputs for [`Graph::open`](crate::storage::Graph::open)
    #[must_use]
    pub const fn graph_options(&self) -> GraphOptions {
        GraphOptions {
            num_parts: self.num_parts,
            layout: self.layout,
            split: self.split,
            frontier_size: self.frontier_size,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            graph_path: PathBuf::from("graph.bin"),
            num_parts: 1,
            layout: Layout::Pull,
            split: SplitPolicy::VertexBalanced,
            frontier_size: None,
            placement_stride: DEFAULT_STRIDE,
            max_iterations: default_max_iterations(),
            tolerance: None,
        }
    }
}
