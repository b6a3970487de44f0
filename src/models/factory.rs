use anyhow::{Context, Result};
use std::sync::Arc;

use super::gemini::GeminiBackend;
use super::traits::ChatBackend;
use crate::app::Config;

/// Factory for creating chat backends from configuration
pub struct BackendFactory;

impl BackendFactory {
    /// Create the backend described by `config.model`
    pub fn create(config: &Config) -> Result<Arc<dyn ChatBackend>> {
        Self::create_with_model(config, &config.model.name)
    }

    /// Create a backend for `model_name`, taking every other setting from `config`
    pub fn create_with_model(config: &Config, model_name: &str) -> Result<Arc<dyn ChatBackend>> {
        let model_name = model_name.trim();
        if model_name.is_empty() {
            anyhow::bail!("Model name must not be empty (e.g. 'gemini-1.5-pro')");
        }
        // Accept the "models/<name>" form used in Google's own listings
        let model_name = model_name.strip_prefix("models/").unwrap_or(model_name);

        let backend = GeminiBackend::new(
            config.model.base_url.clone(),
            model_name,
            config.model.generation(),
            config.model.request_timeout(),
        )
        .context("Failed to build HTTP client for the Gemini API")?;

        Ok(Arc::new(backend))
    }
}
