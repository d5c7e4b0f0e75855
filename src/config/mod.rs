use crate::models::AppConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::fs;

/// Name of the configuration file inside the config directory
pub const CONFIG_FILE_NAME: &str = "ppewatch.yaml";

/// Prefix for environment overrides, e.g. `PPEWATCH__API__BASE_URL`
pub const ENV_PREFIX: &str = "PPEWATCH";

/// Configuration manager for loading and saving the YAML configuration file.
///
/// Values are layered, later sources winning:
/// 1. Built-in defaults ([`AppConfig::default`])
/// 2. `ppewatch.yaml` in the config directory (optional)
/// 3. `PPEWATCH__<SECTION>__<KEY>` environment variables
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing `ppewatch.yaml` (e.g., ".")
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
        })
    }

    /// Load the configuration from file and process environment.
    ///
    /// # Returns
    /// The merged AppConfig; defaults when neither source sets anything
    pub fn load(&self) -> Result<AppConfig> {
        self.load_from(None)
    }

    /// Like [`ConfigManager::load`], but reads overrides from `env` instead of
    /// the process environment.
    pub fn load_with_env(&self, env: HashMap<String, String>) -> Result<AppConfig> {
        self.load_from(Some(env))
    }

    fn load_from(&self, env: Option<HashMap<String, String>>) -> Result<AppConfig> {
        if self.config_path.exists() {
            tracing::info!("Loading config from {}", self.config_path);
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                self.config_path
            );
        }

        let settings = Config::builder()
            .add_source(File::new(self.config_path.as_str(), FileFormat::Yaml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .with_context(|| format!("Failed to read config: {}", self.config_path))?;

        let config: AppConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse config: {}", self.config_path))?;

        tracing::debug!(
            "Config resolved: api={}, timeout={}s, notify_on_detect={}",
            config.api.base_url,
            config.api.timeout_secs,
            config.session.notify_on_detect
        );
        Ok(config)
    }

    /// Save the configuration file.
    ///
    /// # Arguments
    /// * `config` - The AppConfig to save
    pub fn save(&self, config: &AppConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Get the configuration file path.
    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();

        let config = manager.load_with_env(HashMap::new()).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_save_config() {
        let (manager, _temp_dir) = create_test_config_manager();

        let mut config = AppConfig::default();
        config.api.base_url = "http://detector:9000".to_string();
        config.session.notify_on_detect = false;
        manager.save(&config).unwrap();

        let loaded = manager.load_with_env(HashMap::new()).unwrap();
        assert_eq!(loaded.api.base_url, "http://detector:9000");
        assert!(!loaded.session.notify_on_detect);
        assert_eq!(loaded.api.timeout_secs, 30);
    }

    #[test]
    fn test_env_overrides_file() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::write(
            manager.config_path(),
            "api:\n  base_url: http://from-file:8000\n  timeout_secs: 10\n",
        )
        .unwrap();

        let env = HashMap::from([(
            "PPEWATCH__API__TIMEOUT_SECS".to_string(),
            "45".to_string(),
        )]);
        let loaded = manager.load_with_env(env).unwrap();

        assert_eq!(loaded.api.base_url, "http://from-file:8000");
        assert_eq!(loaded.api.timeout_secs, 45);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::write(manager.config_path(), "api: [not, a, map").unwrap();

        assert!(manager.load_with_env(HashMap::new()).is_err());
    }
}
