use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chunker::Chunking;
use crate::error::{EngineError, EngineResult};

/// Tunables for the bucket engine.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// max_cas_retries = 16
///
/// [chunking]
/// type = "fixed"
/// size = 1048576
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub chunking: Chunking,
    /// Fan-out of file index nodes.
    pub max_links_per_node: usize,
    /// CAS retries after the first attempt before giving up.
    pub max_cas_retries: u32,
    /// Bytes requested per read from a source stream.
    pub read_buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunking: Chunking::default(),
            max_links_per_node: 174,
            max_cas_retries: 8,
            read_buffer_size: 64 * 1024,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.chunking.validate().map_err(EngineError::Config)?;
        if self.max_links_per_node < 2 {
            return Err(EngineError::Config(format!(
                "max_links_per_node must be at least 2, got {}",
                self.max_links_per_node
            )));
        }
        if self.read_buffer_size == 0 {
            return Err(EngineError::Config("read_buffer_size must be positive".into()));
        }
        Ok(())
    }
}
