//! JSON configuration files
//!
//! Both sides keep their settings in a small JSON document. Writes go through
//! a temp file and a rename so a crash never leaves a truncated config.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Write data atomically to a file
///
/// Creates a temporary file, writes the data, syncs, then renames
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path)
        .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;
    file.write_all(data).context("Failed to write data")?;
    file.sync_all().context("Failed to sync file")?;
    drop(file);

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        let dir = OpenOptions::new()
            .read(true)
            .open(parent)
            .with_context(|| format!("Failed to open directory: {:?}", parent))?;
        dir.sync_all().context("Failed to sync directory")?;
    }

    Ok(())
}

/// Write a configuration as pretty JSON
pub fn write_config<T: Serialize>(path: &Path, config: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(config).context("Failed to serialize config")?;
    write_atomic(path, &json)
}

/// Load a configuration; missing fields take their defaults
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    serde_json::from_slice(&data).context("Failed to deserialize config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeConfig;
    use crate::host::HostConfig;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bridge.json");

        let config = BridgeConfig {
            to_host_port: 9000,
            timeout_ms: 250,
            sequence_ids: false,
            ..BridgeConfig::default()
        };

        write_config(&path, &config).unwrap();
        let loaded: BridgeConfig = load_config(&path).unwrap();

        assert_eq!(loaded, config);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("host.json");
        fs::write(&path, br#"{"tick_delay_ms": 5}"#).unwrap();

        let loaded: HostConfig = load_config(&path).unwrap();
        assert_eq!(loaded.tick_delay_ms, 5);
        assert_eq!(loaded.listen, HostConfig::default().listen);
    }

    #[test]
    fn test_default_replay_spacing_matches_host_tick() {
        assert_eq!(
            BridgeConfig::default().replay_spacing_ms,
            HostConfig::default().tick_delay_ms
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let result: Result<BridgeConfig> = load_config(&temp.path().join("absent.json"));
        assert!(result.is_err());
    }
}
