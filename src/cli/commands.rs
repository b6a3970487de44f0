use anyhow::Result;
use colored::Colorize;

use crate::{
    app::{get_config_dir, init_config, load_provisioned_key, Config, SecretSource},
    constants::CONFIG_FILE_NAME,
    persona::Persona,
    utils::mask_secret,
};

use super::Commands;

/// Handle CLI subcommands. Returns false when the chat UI should start.
pub fn handle_command(command: &Commands, config: &Config) -> Result<bool> {
    match command {
        Commands::Init => {
            println!("Initializing Buddy configuration...");
            init_config()?;
            println!("Configuration initialized successfully!");
            Ok(true)
        }
        Commands::Personas => {
            list_personas(config.ui.default_persona);
            Ok(true)
        }
        Commands::Version => {
            show_version();
            Ok(true)
        }
        Commands::Status => {
            show_status(config)?;
            Ok(true)
        }
        Commands::Chat => Ok(false), // Continue to chat interface
    }
}

/// List the persona presets
pub fn list_personas(default: Persona) {
    println!("Available personas:");
    for persona in Persona::ALL {
        let marker = if persona == default { " (default)" } else { "" };
        println!(
            "  • {:<9} {}{}",
            persona.id().green(),
            persona.description(),
            marker.dimmed()
        );
    }
}

/// Show version information
pub fn show_version() {
    println!("Buddy v{}", env!("CARGO_PKG_VERSION"));
    println!("   A persona-driven AI chat assistant powered by Google Gemini");
}

/// Show key and configuration status
fn show_status(config: &Config) -> Result<()> {
    println!("Buddy Status:");
    println!();

    match load_provisioned_key(&config.secrets)? {
        Some(key) => {
            let source = match &key.source {
                SecretSource::Env(var) => format!("environment variable {}", var),
                SecretSource::File(path) => format!("secrets file {}", path.display()),
            };
            println!(
                "  [OK] API key: {} (from {})",
                mask_secret(&key.key),
                source
            );
        }
        None => {
            println!(
                "  [WARNING] API key: not provisioned (set {} or enter one in the chat)",
                config.secrets.api_key_env
            );
        }
    }

    let config_path = get_config_dir()?.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        println!("  [OK] Configuration: {}", config_path.display());
    } else {
        println!("  [WARNING] Configuration: Not found (using defaults)");
    }

    println!("  • Model: {}", config.model.name.green());
    println!("  • Endpoint: {}", config.model.base_url);
    println!("  • Default persona: {}", config.ui.default_persona.label());
    println!("  • Export directory: {}", config.export.directory.display());

    println!();
    Ok(())
}
