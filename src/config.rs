//! Configuration loading and generation.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::module::CutMode;

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Enable debug logging to file
    pub debug: bool,

    /// Path to log directory
    pub log_path: PathBuf,

    /// EnvFilter directive for the log file
    pub log_level: String,

    /// Default cut point for module identification
    pub cp: f64,

    /// Default cut direction
    pub mode: CutMode,

    /// Default glob applied to source discovery
    pub glob: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            log_path: default_log_path(),
            log_level: "debug".to_string(),
            cp: 0.05,
            mode: CutMode::Similarity,
            glob: None,
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("coupling-lens")
}

/// Default log path: ~/.config/coupling-lens/logs
fn default_log_path() -> PathBuf {
    config_dir().join("logs")
}

/// Configuration service.
pub struct ConfigService;

impl ConfigService {
    /// Get the default configuration file path.
    pub fn default_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    /// Load configuration from file.
    ///
    /// If `path` is `None`, uses the default path.
    /// If the file doesn't exist, returns default configuration.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let path = path.map(PathBuf::from).unwrap_or_else(Self::default_path);
        let config_dir = path.parent();

        if !path.exists() {
            let mut config = Config::default();
            if let Some(dir) = config_dir {
                config.log_path = dir.join("logs");
            }
            return Ok(config);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        // Unset log_path follows the config file's directory
        if config.log_path == default_log_path()
            && let Some(dir) = config_dir
        {
            config.log_path = dir.join("logs");
        }

        Ok(config)
    }

    /// Generate default configuration file at the default path.
    pub fn generate_default() -> Result<()> {
        Self::generate_at(&Self::default_path())
    }

    /// Generate default configuration file at the specified path.
    pub fn generate_at(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, Self::default_config_content())
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Default configuration content with comments.
    fn default_config_content() -> String {
        r#"# coupling-lens configuration file

# Enable debug logging to file (default: false)
debug = false

# Path to log directory (default: ~/.config/coupling-lens/logs)
# log_path = "~/.config/coupling-lens/logs"

# Log filter directive, e.g. "info" or "coupling_lens=debug" (default: "debug")
log_level = "debug"

# Cut point used by `modules` when --cp is not given (default: 0.05)
cp = 0.05

# Cut direction: "similarity" keeps merges scoring >= cp, "distance" <= cp
mode = "similarity"

# Only analyse files matching this glob, relative to the source root
# glob = "**/*.java"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_path_ends_with_config_toml() {
        let path = ConfigService::default_path();
        assert!(path.ends_with("coupling-lens/config.toml"));
    }

    #[test]
    fn test_generate_at_creates_parent_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("nested").join("dir").join("config.toml");

        ConfigService::generate_at(&config_path).unwrap();

        assert!(config_path.exists());
    }

    #[test]
    fn test_generated_file_loads_as_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        ConfigService::generate_at(&config_path).unwrap();

        let config = ConfigService::load(Some(&config_path)).unwrap();
        assert!(!config.debug);
        assert_eq!(config.cp, 0.05);
        assert_eq!(config.mode, CutMode::Similarity);
        assert_eq!(config.log_level, "debug");
        assert!(config.glob.is_none());
        assert_eq!(config.log_path, dir.path().join("logs"));
    }

    #[test]
    fn test_load_returns_defaults_when_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("nonexistent.toml");

        let config = ConfigService::load(Some(&config_path)).unwrap();

        assert!(!config_path.exists());
        assert!(!config.debug);
        assert_eq!(config.cp, 0.05);
    }

    #[test]
    fn test_load_parses_analysis_settings() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(
            &config_path,
            "cp = 0.2\nmode = \"distance\"\nglob = \"core/**\"\n",
        )
        .unwrap();

        let config = ConfigService::load(Some(&config_path)).unwrap();
        assert_eq!(config.cp, 0.2);
        assert_eq!(config.mode, CutMode::Distance);
        assert_eq!(config.glob.as_deref(), Some("core/**"));
    }

    #[test]
    fn test_load_invalid_toml_returns_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("bad.toml");

        fs::write(&config_path, "not valid [[[").unwrap();

        assert!(ConfigService::load(Some(&config_path)).is_err());
    }

    #[test]
    fn test_load_rejects_unknown_mode() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(&config_path, "mode = \"sideways\"\n").unwrap();

        assert!(ConfigService::load(Some(&config_path)).is_err());
    }

    #[test]
    fn test_load_custom_log_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(
            &config_path,
            "debug = true\nlog_path = \"/tmp/lens-logs\"\n",
        )
        .unwrap();

        let config = ConfigService::load(Some(&config_path)).unwrap();
        assert!(config.debug);
        assert_eq!(config.log_path, PathBuf::from("/tmp/lens-logs"));
    }
}
