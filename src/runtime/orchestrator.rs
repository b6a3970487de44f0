use anyhow::Result;
use colored::Colorize;
use tracing::warn;

use crate::{
    app::{load_config, load_config_from, load_provisioned_key, Config},
    cli::{handle_command, Cli},
    models::BackendFactory,
    persona::Persona,
    session::{event_channel, ChatSession},
    tui::{run_ui, App},
};

use super::non_interactive::{NonInteractiveRunner, RunOptions};

/// Main runtime orchestrator
pub struct Orchestrator {
    cli: Cli,
    config: Config,
}

impl Orchestrator {
    /// Create a new orchestrator from CLI args
    pub fn new(cli: Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => load_config_from(path)?,
            None => match load_config() {
                Ok(cfg) => cfg,
                Err(e) => {
                    eprintln!("⚠️  Failed to load config: {}. Using defaults.", e);
                    Config::default()
                }
            },
        };

        apply_overrides(&mut config, &cli);

        Ok(Self { cli, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The one-shot prompt, when running non-interactively
    pub fn prompt(&self) -> Option<String> {
        self.cli.prompt.clone()
    }

    fn persona(&self) -> Persona {
        self.cli.persona.unwrap_or(self.config.ui.default_persona)
    }

    /// Run the orchestrator in interactive mode
    pub async fn run(self) -> Result<()> {
        // Handle subcommands
        if let Some(command) = &self.cli.command {
            if handle_command(command, &self.config)? {
                return Ok(()); // Command handled, exit
            }
            // Continue to chat for Commands::Chat
        }

        let provisioned = load_provisioned_key(&self.config.secrets)?;
        let backend = BackendFactory::create(&self.config)?;

        println!(
            "🤖 Starting Buddy with model: {} ({} mode)",
            backend.name().green(),
            self.persona().label()
        );

        let (sink, events) = event_channel();
        let session = ChatSession::new(backend, self.persona(), sink)
            .with_provisioned_key(provisioned.map(|p| p.key));

        let app = App::new(session, events, &self.config, self.cli.api_key.clone());
        run_ui(app).await
    }

    /// Run a single prompt and print the result. Returns whether it failed.
    pub async fn run_prompt(self, prompt: String) -> Result<bool> {
        let provisioned = load_provisioned_key(&self.config.secrets)?;
        let backend = BackendFactory::create(&self.config)?;

        let options = RunOptions {
            persona: self.persona(),
            provisioned_key: provisioned.map(|p| p.key),
            user_key: self.cli.api_key.clone(),
            stream: self.config.model.stream,
            export_dir: self
                .cli
                .export
                .then(|| self.config.export.directory.clone()),
        };

        let runner = NonInteractiveRunner::new(backend, options, self.cli.output_format);
        let result = runner.execute(prompt).await?;
        print!("{}", runner.format_result(&result));

        if result.failed() {
            warn!("prompt finished with an error");
        }
        Ok(result.failed())
    }
}

/// Command-line flags win over every config source
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(model) = &cli.model {
        config.model.name = model.clone();
    }
    if let Some(dir) = &cli.export_dir {
        config.export.directory = dir.clone();
    }
    if cli.no_stream {
        config.model.stream = false;
    }
}
