// Gateway module for app - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod config;
mod secrets;

// Public re-exports - the ONLY way to access app functionality
pub use config::{
    get_config_dir, init_config, load_config, load_config_from, log_file_path, save_config,
    Config, ExportConfig, ModelSettings, SecretsConfig, UIConfig,
};
pub use secrets::{load_provisioned_key, ProvisionedKey, SecretSource};
