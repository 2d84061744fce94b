use crate::models::RunConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

/// File name of the run configuration inside the config directory
pub const RUN_CONFIG_FILE: &str = "copyrandom.yaml";

/// Prefix of environment variables overriding configuration keys
pub const ENV_PREFIX: &str = "COPYRANDOM";

/// Configuration manager for loading and saving the YAML run configuration.
///
/// Loading is layered: the YAML file first, then `COPYRANDOM__*` environment
/// variables, with `__` separating nested keys
/// (`COPYRANDOM__FOLDERS__CREATE=true`).
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    run_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager for `config_dir`, creating the directory if needed.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            run_config_path: config_dir.join(RUN_CONFIG_FILE),
            config_dir,
        })
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn run_config_path(&self) -> &Utf8Path {
        &self.run_config_path
    }

    /// Load the run configuration from the config directory.
    ///
    /// A missing file is not an error: defaults plus environment overrides are used.
    pub fn load_run_config(&self) -> Result<RunConfig> {
        if !self.run_config_path.exists() {
            tracing::warn!(
                "Run config file not found at {}, using defaults",
                self.run_config_path
            );
        }

        let config = load_layered(&self.run_config_path, false, environment())?;
        tracing::info!("Loaded run config from {}", self.run_config_path);
        Ok(config)
    }

    /// Load the run configuration from an explicit file, which must exist.
    pub fn load_run_config_from(&self, path: &Utf8Path) -> Result<RunConfig> {
        let config = load_layered(path, true, environment())?;
        tracing::info!("Loaded run config from {}", path);
        Ok(config)
    }

    /// Save the run configuration file.
    pub fn save_run_config(&self, config: &RunConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize run config to YAML")?;

        fs::write(&self.run_config_path, yaml_string)
            .with_context(|| format!("Failed to write run config: {}", self.run_config_path))?;

        tracing::info!("Saved run config to {}", self.run_config_path);
        Ok(())
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

fn load_layered(path: &Utf8Path, required: bool, env: Environment) -> Result<RunConfig> {
    let settings = Config::builder()
        .add_source(File::new(path.as_str(), FileFormat::Yaml).required(required))
        .add_source(env)
        .build()
        .with_context(|| format!("Failed to read run config: {}", path))?;

    settings
        .try_deserialize::<RunConfig>()
        .with_context(|| format!("Failed to parse run config: {}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileNameMode, Quota};
    use tempfile::TempDir;

    fn manager() -> (TempDir, ConfigManager) {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().join("conf")).unwrap();
        let manager = ConfigManager::new(&dir).unwrap();
        (temp_dir, manager)
    }

    fn env_with(vars: &[(&str, &str)]) -> Environment {
        let mut map = config::Map::new();
        for (key, value) in vars {
            map.insert(key.to_string(), value.to_string());
        }
        environment().source(Some(map))
    }

    #[test]
    fn test_new_creates_directory() {
        let (_temp_dir, manager) = manager();
        assert!(manager.config_dir().is_dir());
        assert_eq!(manager.run_config_path().file_name(), Some(RUN_CONFIG_FILE));
    }

    #[test]
    fn test_environment_overrides_file() {
        let (_temp_dir, manager) = manager();
        fs::write(
            manager.run_config_path(),
            "stall_timeout_secs: 5\nquota: 3\n",
        )
        .unwrap();

        let env = env_with(&[
            ("COPYRANDOM__STALL_TIMEOUT_SECS", "30"),
            ("COPYRANDOM__FOLDERS__CREATE", "true"),
        ]);
        let config = load_layered(manager.run_config_path(), true, env).unwrap();

        assert_eq!(config.stall_timeout_secs, 30.0);
        assert!(config.folders.create);
        assert_eq!(config.quota, Quota::Fixed(3));
    }

    #[test]
    fn test_missing_optional_file_uses_defaults() {
        let (_temp_dir, manager) = manager();
        let config = load_layered(manager.run_config_path(), false, env_with(&[])).unwrap();
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn test_missing_required_file_is_error() {
        let (_temp_dir, manager) = manager();
        let missing = manager.config_dir().join("nope.yaml");
        assert!(manager.load_run_config_from(&missing).is_err());
    }

    #[test]
    fn test_save_then_load_keeps_tagged_modes() {
        let (_temp_dir, manager) = manager();
        let config = RunConfig {
            quota: Quota::Random { min: 2, max: 7 },
            file_names: FileNameMode::Rename {
                template: "Track".to_string(),
            },
            ..Default::default()
        };
        manager.save_run_config(&config).unwrap();

        let loaded = load_layered(manager.run_config_path(), true, env_with(&[])).unwrap();
        assert_eq!(loaded.quota, config.quota);
        assert_eq!(loaded.file_names, config.file_names);
    }
}
