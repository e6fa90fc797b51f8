// loaded on startup and saved on quit so settings survive between sessions
use std::path::{Path, PathBuf};

use log::warn;

use crate::config::Config;
use crate::error::{Error, Result};

const CONDUCTR_DIR: &str = ".conductr";
const CONFIG_FILE: &str = "config.json";

// <project_dir>/.conductr/config.json
pub fn config_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(CONDUCTR_DIR).join(CONFIG_FILE)
}

/// None when there is no file yet or it cannot be read; a broken file is
/// logged and ignored rather than blocking startup.
pub fn load_config(project_dir: &Path) -> Option<Config> {
    let path = config_file_path(project_dir);
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str::<Config>(&data) {
        Ok(cfg) => Some(cfg.sanitized()),
        Err(e) => {
            warn!("ignoring unreadable config {}: {e}", path.display());
            None
        }
    }
}

// creates .conductr/ if it doesn't exist already
pub fn save_config(project_dir: &Path, config: &Config) -> Result<()> {
    let path = config_file_path(project_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config).map_err(|e| Error::Config(e.to_string()))?;
    std::fs::write(&path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(dir.path()).is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config { bpm: 132.0, looping: true, ..Config::default() };
        save_config(dir.path(), &cfg).unwrap();
        assert!(config_file_path(dir.path()).exists());
        assert_eq!(load_config(dir.path()), Some(cfg));
    }

    #[test]
    fn test_corrupt_config_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_config(dir.path()).is_none());
    }
}
