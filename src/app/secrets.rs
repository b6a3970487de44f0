use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::config::{get_config_dir, SecretsConfig};
use crate::constants::SECRETS_FILE_NAME;

/// Where a provisioned key was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    Env(String),
    File(PathBuf),
}

/// A pre-provisioned API key, checked once at startup
#[derive(Debug, Clone)]
pub struct ProvisionedKey {
    pub key: String,
    pub source: SecretSource,
}

/// Look up the provisioned API key: environment variable first, then the
/// secrets file. Blank values count as absent.
pub fn load_provisioned_key(config: &SecretsConfig) -> Result<Option<ProvisionedKey>> {
    if let Some(key) = key_from_env(&config.api_key_env) {
        info!(source = %config.api_key_env, "API key loaded from environment");
        return Ok(Some(ProvisionedKey {
            key,
            source: SecretSource::Env(config.api_key_env.clone()),
        }));
    }

    let path = match &config.secrets_file {
        Some(path) => path.clone(),
        None => get_config_dir()?.join(SECRETS_FILE_NAME),
    };

    if let Some(key) = key_from_file(&path, &config.api_key_env)? {
        info!(path = %path.display(), "API key loaded from secrets file");
        return Ok(Some(ProvisionedKey {
            key,
            source: SecretSource::File(path),
        }));
    }

    debug!("no provisioned API key found");
    Ok(None)
}

fn key_from_env(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read `name = "..."` from a TOML secrets file, if the file exists
fn key_from_file(path: &Path, name: &str) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read secrets file {}", path.display()))?;
    let table: toml::Table = toml::from_str(&content)
        .with_context(|| format!("Invalid secrets file {}", path.display()))?;

    Ok(table
        .get(name)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_key_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.toml");
        std::fs::write(&path, "GOOGLE_API_KEY = \"  ABC123 \"\nOTHER = 1\n").unwrap();

        assert_eq!(
            key_from_file(&path, "GOOGLE_API_KEY").unwrap(),
            Some("ABC123".to_string())
        );
        assert_eq!(key_from_file(&path, "OTHER").unwrap(), None);
        assert_eq!(key_from_file(&path, "MISSING").unwrap(), None);
    }

    #[test]
    fn test_key_from_missing_or_blank_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            key_from_file(&dir.path().join("absent.toml"), "GOOGLE_API_KEY").unwrap(),
            None
        );

        let path = dir.path().join("secrets.toml");
        std::fs::write(&path, "GOOGLE_API_KEY = \"\"\n").unwrap();
        assert_eq!(key_from_file(&path, "GOOGLE_API_KEY").unwrap(), None);
    }

    #[test]
    fn test_invalid_secrets_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();
        assert!(key_from_file(&path, "GOOGLE_API_KEY").is_err());
    }

    #[test]
    fn test_load_prefers_file_when_env_unset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.toml");
        std::fs::write(&path, "BUDDY_TEST_UNSET_KEY_VAR = \"from-file\"\n").unwrap();

        let config = SecretsConfig {
            api_key_env: "BUDDY_TEST_UNSET_KEY_VAR".to_string(),
            secrets_file: Some(path.clone()),
        };
        let key = load_provisioned_key(&config).unwrap().unwrap();
        assert_eq!(key.key, "from-file");
        assert_eq!(key.source, SecretSource::File(path));
    }

    #[test]
    fn test_load_without_any_source() {
        let dir = TempDir::new().unwrap();
        let config = SecretsConfig {
            api_key_env: "BUDDY_TEST_NEVER_SET_VAR".to_string(),
            secrets_file: Some(dir.path().join("secrets.toml")),
        };
        assert!(load_provisioned_key(&config).unwrap().is_none());
    }
}
