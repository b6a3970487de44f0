use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    APP_NAME, CONFIG_FILE_NAME, DEFAULT_API_KEY_ENV, DEFAULT_GEMINI_BASE_URL,
    DEFAULT_GEMINI_MODEL, ENV_PREFIX, LOCAL_CONFIG_PATH, LOG_FILE_NAME,
};
use crate::models::GenerationConfig;
use crate::persona::Persona;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model and request settings
    #[serde(default)]
    pub model: ModelSettings,

    /// Where the provisioned API key comes from
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// UI configuration
    #[serde(default)]
    pub ui: UIConfig,

    /// Transcript export configuration
    #[serde(default)]
    pub export: ExportConfig,
}

/// Model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Gemini model name
    pub name: String,
    /// API root, without the `/models/...` suffix
    pub base_url: String,
    /// Temperature for generation
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_output_tokens: Option<u32>,
    /// Nucleus sampling
    pub top_p: Option<f32>,
    /// Per-request timeout; unset means no timeout
    pub request_timeout_secs: Option<u64>,
    /// Stream replies into the UI as they arrive
    pub stream: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            temperature: None,
            max_output_tokens: None,
            top_p: None,
            request_timeout_secs: None,
            stream: true,
        }
    }
}

impl ModelSettings {
    pub fn generation(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            top_p: self.top_p,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Secrets configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Environment variable holding a pre-provisioned API key
    pub api_key_env: String,
    /// Secrets file; defaults to `secrets.toml` in the config directory
    pub secrets_file: Option<PathBuf>,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            secrets_file: None,
        }
    }
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UIConfig {
    /// Persona active when a session starts
    pub default_persona: Persona,
    /// Show the settings sidebar by default
    pub show_sidebar: bool,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            default_persona: Persona::Default,
            show_sidebar: true,
        }
    }
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory transcripts are written to
    pub directory: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
        }
    }
}

/// Load configuration from multiple sources
pub fn load_config() -> Result<Config> {
    let global_config = get_config_dir()?.join(CONFIG_FILE_NAME);
    let local_config = PathBuf::from(LOCAL_CONFIG_PATH);

    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    if global_config.exists() {
        figment = figment.merge(Toml::file(&global_config));
    }

    if local_config.exists() {
        figment = figment.merge(Toml::file(&local_config));
    }

    extract(figment)
}

/// Load configuration from an explicit file, still honouring environment overrides
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!("Config file not found: {}", path.display());
    }

    let figment = Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(path));
    extract(figment)
}

fn extract(figment: Figment) -> Result<Config> {
    // BUDDY_MODEL__NAME=gemini-1.5-flash -> model.name
    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("Failed to load configuration")
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = if let Some(proj_dirs) = project_dirs() {
        proj_dirs.config_dir().to_path_buf()
    } else {
        // Fallback to home directory
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Could not determine home directory")?;
        PathBuf::from(home).join(".config").join(APP_NAME)
    };
    std::fs::create_dir_all(&config_dir)?;
    Ok(config_dir)
}

/// Path of the log file used while the terminal UI owns the screen
pub fn log_file_path() -> Result<PathBuf> {
    let dir = match project_dirs() {
        Some(proj_dirs) => proj_dirs.data_dir().to_path_buf(),
        None => get_config_dir()?,
    };
    Ok(dir.join(LOG_FILE_NAME))
}

/// Save configuration to file
pub fn save_config(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let path = if let Some(p) = path {
        p
    } else {
        get_config_dir()?.join(CONFIG_FILE_NAME)
    };

    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

/// Create a default configuration file if it doesn't exist
pub fn init_config() -> Result<PathBuf> {
    let config_file = get_config_dir()?.join(CONFIG_FILE_NAME);

    if !config_file.exists() {
        save_config(&Config::default(), Some(config_file.clone()))?;
        println!("Created default configuration at: {}", config_file.display());
    } else {
        println!("Configuration already exists at: {}", config_file.display());
    }

    Ok(config_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.model.name, "gemini-1.5-pro");
        assert_eq!(config.secrets.api_key_env, "GOOGLE_API_KEY");
        assert_eq!(config.ui.default_persona, Persona::Default);
        assert!(config.model.stream);
        assert_eq!(config.model.request_timeout(), None);
        assert!(config.model.generation().is_empty());
    }

    #[test]
    fn test_load_config_from_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[model]
name = "gemini-1.5-flash"
temperature = 0.3
request_timeout_secs = 30

[ui]
default_persona = "expert"
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.model.name, "gemini-1.5-flash");
        assert_eq!(config.model.temperature, Some(0.3));
        assert_eq!(config.model.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.model.base_url, DEFAULT_GEMINI_BASE_URL);
        assert_eq!(config.ui.default_persona, Persona::Expert);
        assert!(config.ui.show_sidebar);
    }

    #[test]
    fn test_load_config_from_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(load_config_from(&dir.path().join("nope.toml")).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.ui.default_persona = Persona::Concise;
        config.export.directory = PathBuf::from("exports");

        save_config(&config, Some(path.clone())).unwrap();
        let loaded = load_config_from(&path).unwrap();

        assert_eq!(loaded.ui.default_persona, Persona::Concise);
        assert_eq!(loaded.export.directory, PathBuf::from("exports"));
    }
}
