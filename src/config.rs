//! `MachineConfig`: model variant, RAM size, MMU generation, NVRAM/boot-ROM
//! paths, loaded from JSON (or TOML behind the `config-toml` feature),
//! following the ambient-config convention of the wider retrieval pack
//! (SPEC_FULL.md §B "Configuration").

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which MMU hardware generation the machine boots with (spec §4.2
/// "two hardware generations").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MmuGeneration {
    Gen1,
    Gen2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineConfig {
    pub model: String,
    pub ram_size_mib: u32,
    pub mmu_generation: MmuGeneration,
    pub nvram_path: Option<PathBuf>,
    pub boot_rom_path: Option<PathBuf>,
    #[serde(default)]
    pub halt_on_exception: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            model: "3B2/400".to_string(),
            ram_size_mib: 8,
            mmu_generation: MmuGeneration::Gen1,
            nvram_path: None,
            boot_rom_path: None,
            halt_on_exception: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "config-toml")]
    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
}

impl MachineConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        #[cfg(feature = "config-toml")]
        if path.extension().and_then(|e| e.to_str()) == Some("toml") {
            return Ok(toml::from_str(&text)?);
        }
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let config = MachineConfig::default();
        let text = config.to_json_string().unwrap();
        assert_eq!(MachineConfig::from_json_str(&text).unwrap(), config);
    }
}
