//! Store configuration (`config.toml` at the store root)

use crate::error::{Error, IoContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings persisted alongside the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Gzip archives written out of the store
    pub compress_exports: bool,
    /// Gzip level, 0-9
    pub compression_level: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            compress_exports: true,
            compression_level: 6,
        }
    }
}

impl StoreConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).io_context(|| format!("reading {}", path.display()))?;
        let config: StoreConfig = toml::from_str(&text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        let body = format!("# acb store configuration\n{}", text);
        std::fs::write(path, body).io_context(|| format!("writing {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if self.compression_level > 9 {
            return Err(Error::Config(format!(
                "compression_level must be 0-9, got {}",
                self.compression_level
            )));
        }
        Ok(())
    }
}
