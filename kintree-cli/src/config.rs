//! Workspace configuration stored in `.kintree/config.json`.

use kintree_graph::LayoutConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_DIR: &str = ".kintree";
pub const CONFIG_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KintreeConfig {
    pub version: String,
    /// Document path, relative to the workspace directory.
    pub document: PathBuf,
    pub layout: LayoutConfig,
}

impl Default for KintreeConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            document: PathBuf::from("family.json"),
            layout: LayoutConfig::default(),
        }
    }
}

impl KintreeConfig {
    pub fn path(dir: &Path) -> PathBuf {
        dir.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Reads the config for `dir`, falling back to defaults when there
    /// is none.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = Self::path(dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, dir: &Path) -> Result<(), ConfigError> {
        fs::create_dir_all(dir.join(CONFIG_DIR))?;
        fs::write(Self::path(dir), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// The document path this config points at, resolved against `dir`.
    pub fn document_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = KintreeConfig::load(dir.path()).unwrap();
        assert_eq!(config, KintreeConfig::default());
        assert_eq!(config.layout.center_x, 800.0);
        assert_eq!(config.layout.vertical_spacing, 150.0);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let mut config = KintreeConfig::default();
        config.document = PathBuf::from("hakim.json");
        config.layout.horizontal_spacing = 240.0;
        config.save(dir.path()).unwrap();

        let loaded = KintreeConfig::load(dir.path()).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.document_path(dir.path()), dir.path().join("hakim.json"));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();
        fs::write(
            KintreeConfig::path(dir.path()),
            r#"{"layout": {"centerX": 0}}"#,
        )
        .unwrap();

        let config = KintreeConfig::load(dir.path()).unwrap();
        assert_eq!(config.layout.center_x, 0.0);
        assert_eq!(config.layout.center_y, 600.0);
        assert_eq!(config.document, PathBuf::from("family.json"));
    }
}
