use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{CACHE_FILE_NAME, CACHE_RETENTION_DAYS, PERSIST_DEBOUNCE_MS};
use crate::types::Target;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Platform imports are resolved and measured for
    #[serde(default)]
    pub target: Target,

    /// Cache persistence configuration
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Bundler configuration
    #[serde(default)]
    pub bundler: BundlerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: Target::default(),
            persistence: PersistenceConfig::default(),
            bundler: BundlerConfig::default(),
        }
    }
}

/// Cache persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Delay between a cache update and the debounced write, in milliseconds
    pub debounce_ms: u64,
    /// Entries unused for this many days are dropped at the next write
    pub retention_days: u64,
    /// Directory for the persisted cache file; defaults to the platform cache dir
    pub cache_dir: Option<PathBuf>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: PERSIST_DEBOUNCE_MS,
            retention_days: CACHE_RETENTION_DAYS,
            cache_dir: None,
        }
    }
}

/// Bundler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundlerConfig {
    /// Explicit esbuild binary; wins over PATH discovery and auto-install
    pub esbuild_path: Option<PathBuf>,
    /// Directory esbuild is provisioned into
    pub tool_dir: Option<PathBuf>,
    /// Run `npm install` automatically when esbuild is missing
    pub auto_install: bool,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            esbuild_path: None,
            tool_dir: None,
            auto_install: true,
        }
    }
}

impl Config {
    /// Platform data directory (~/.cache/importcost on Linux)
    fn data_dir(&self) -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "importcost") {
            Ok(proj_dirs.cache_dir().to_path_buf())
        } else {
            let home = std::env::var("HOME").context("HOME is not set")?;
            Ok(PathBuf::from(home).join(".cache").join("importcost"))
        }
    }

    /// Path of the persisted size-cache file
    pub fn cache_file(&self) -> Result<PathBuf> {
        let dir = match &self.persistence.cache_dir {
            Some(dir) => dir.clone(),
            None => self.data_dir()?,
        };
        Ok(dir.join(CACHE_FILE_NAME))
    }

    /// Directory esbuild is provisioned into when not found on PATH
    pub fn tool_dir(&self) -> Result<PathBuf> {
        match &self.bundler.tool_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(self.data_dir()?.join("esbuild")),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.persistence.debounce_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.persistence.retention_days * 24 * 60 * 60)
    }
}

/// Load configuration from the platform config file and environment
pub fn load_config() -> Result<Config> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    if let Some(proj_dirs) = ProjectDirs::from("", "", "importcost") {
        let config_path = proj_dirs.config_dir().join("config.toml");
        if config_path.exists() {
            figment = figment.merge(Toml::file(config_path));
        }
    }

    figment = figment.merge(Env::prefixed("IMPORTCOST_").split("__"));
    figment.extract().context("invalid configuration")
}

/// Load configuration from an explicit TOML file, layered over the defaults
pub fn load_config_from(path: &Path) -> Result<Config> {
    anyhow::ensure!(
        path.exists(),
        "config file {} does not exist",
        path.display()
    );
    Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .extract()
        .with_context(|| format!("invalid configuration in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.target, Target::Browser);
        assert_eq!(config.persistence.debounce_ms, 30_000);
        assert_eq!(config.persistence.retention_days, 14);
        assert!(config.bundler.auto_install);
    }

    #[test]
    fn partial_config_file_layers_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "target = \"node\"\n\n[persistence]\ndebounce_ms = 5000\n",
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.target, Target::Node);
        assert_eq!(config.persistence.debounce_ms, 5000);
        // Untouched sections keep their defaults
        assert_eq!(config.persistence.retention_days, 14);
        assert!(config.bundler.auto_install);
    }

    #[test]
    fn explicit_directories_override_the_platform_defaults() {
        let mut config = Config::default();
        config.persistence.cache_dir = Some(PathBuf::from("/tmp/icache"));
        config.bundler.tool_dir = Some(PathBuf::from("/tmp/itools"));

        assert_eq!(
            config.cache_file().unwrap(),
            PathBuf::from("/tmp/icache/cache.bin")
        );
        assert_eq!(config.tool_dir().unwrap(), PathBuf::from("/tmp/itools"));
    }
}
