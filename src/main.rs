use anyhow::Result;
use clap::Parser;

use buddy::{
    app::log_file_path,
    cli::{Cli, Commands},
    runtime::Orchestrator,
    utils::{init_file_logger, init_logger},
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let interactive =
        cli.prompt.is_none() && matches!(cli.command, None | Some(Commands::Chat));

    // The TUI owns the terminal, so its logs go to a file
    if interactive {
        let logged = log_file_path()
            .ok()
            .is_some_and(|path| init_file_logger(&path, cli.verbose).is_ok());
        if !logged && cli.verbose {
            eprintln!("⚠️  Could not open the log file; logging is disabled.");
        }
    } else {
        init_logger(cli.verbose);
    }

    let orchestrator = Orchestrator::new(cli)?;

    if let Some(prompt) = orchestrator.prompt() {
        if orchestrator.run_prompt(prompt).await? {
            std::process::exit(1);
        }
        return Ok(());
    }

    orchestrator.run().await
}
