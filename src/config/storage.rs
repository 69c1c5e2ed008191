use crate::config::schema::AppConfig;
use crate::error::{CrewError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration file path based on platform
pub fn get_config_path() -> PathBuf {
    let config_dir = if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|p| p.join("com.quotecrew.app"))
            .unwrap_or_else(|| PathBuf::from("."))
    } else {
        dirs::config_dir()
            .map(|p| p.join("quotecrew"))
            .unwrap_or_else(|| PathBuf::from("."))
    };

    config_dir.join("config.toml")
}

/// Load configuration from `path` (or the platform default), creating a
/// default file if none exists.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(get_config_path);

    if !config_path.exists() {
        tracing::info!(
            "Config file not found at {:?}, creating default",
            config_path
        );
        return init_config(&config_path);
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        CrewError::Config(format!(
            "Failed to read config from {:?}: {}",
            config_path, e
        ))
    })?;

    let config: AppConfig = toml::from_str(&content)?;

    tracing::info!("Loaded config from {:?}", config_path);
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, config_path: &Path) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            CrewError::Config(format!(
                "Failed to create config directory {:?}: {}",
                parent, e
            ))
        })?;
    }

    let content = toml::to_string_pretty(config)?;

    fs::write(config_path, content).map_err(|e| {
        CrewError::Config(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::info!("Saved config to {:?}", config_path);
    Ok(())
}

/// Initialize default configuration and save to file
pub fn init_config(config_path: &Path) -> Result<AppConfig> {
    let config = AppConfig::default();
    save_config(&config, config_path)?;
    Ok(config)
}

/// Load `.env` (if present) and merge provider keys from the process
/// environment into `config`. This is the only place the environment is read.
pub fn apply_env(config: &mut AppConfig) {
    match dotenv::dotenv() {
        Ok(path) => tracing::info!("Loaded environment from {:?}", path),
        Err(e) => tracing::debug!("No .env file loaded: {}", e),
    }
    config.llm.merge_env(|key| std::env::var(key).ok());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path() {
        let path = get_config_path();
        assert!(path.ends_with("config.toml"));
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(!config.browser.chrome_path.as_os_str().is_empty());
        assert!(config.browser.headless);
        assert!(config.llm.providers.is_empty());
        assert_eq!(config.llm.fallback_limit, 1);
        assert_eq!(config.memory.max_items, 20);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = load_config(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(config.form.url, AppConfig::default().form.url);

        // Second load reads the file back
        let again = load_config(Some(&path)).unwrap();
        assert_eq!(again.form.steps, config.form.steps);
        assert_eq!(again.output.dir, config.output.dir);
    }

    #[test]
    fn test_load_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[llm\nfallback_limit = ").unwrap();

        let result = load_config(Some(&path));
        assert!(matches!(result, Err(CrewError::TomlDeserialize(_))));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[memory]\nmax_items = 4\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.memory.max_items, 4);
        assert_eq!(config.memory.keep_recent, 5);
        assert_eq!(config.browser.cdp_port, 9222);
    }
}
