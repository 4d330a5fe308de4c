use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PipedashError, Result};

/// Resolves the directory holding persisted dashboard records.
///
/// Uses the configured directory when given, otherwise the platform config
/// directory:
/// - Linux: `~/.config/pipedash/`
/// - macOS: `~/Library/Application Support/pipedash/`
pub fn data_dir(configured: Option<&Path>) -> Result<PathBuf> {
    let dir = match configured {
        Some(dir) => dir.to_path_buf(),
        None => dirs::config_dir()
            .ok_or_else(|| PipedashError::Storage("No config directory found".into()))?
            .join("pipedash"),
    };

    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Reads a JSON record, returning `None` when the file does not exist.
///
/// A record that exists but cannot be parsed is logged and treated as absent,
/// so a corrupted file never prevents the dashboard from starting.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    match serde_json::from_str(&content) {
        Ok(value) => {
            debug!("Loaded record from: {}", path.display());
            Ok(Some(value))
        }
        Err(e) => {
            warn!("Ignoring unreadable record {}: {e}", path.display());
            Ok(None)
        }
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)?;
    debug!("Saved record to: {}", path.display());
    Ok(())
}

pub fn remove(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_record_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let value: Option<Vec<u64>> = read_json(&temp_dir.path().join("nope.json")).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_corrupted_record_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pins.json");
        fs::write(&path, "{not json").unwrap();

        let value: Option<Vec<u64>> = read_json(&path).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pins.json");

        write_json(&path, &vec![3_u64, 1, 2]).unwrap();
        let value: Option<Vec<u64>> = read_json(&path).unwrap();
        assert_eq!(value, Some(vec![3, 1, 2]));

        remove(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_configured_data_dir_is_created() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");

        let dir = data_dir(Some(&nested)).unwrap();
        assert_eq!(dir, nested);
        assert!(nested.is_dir());
    }
}
