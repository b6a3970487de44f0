use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::persona::Persona;

#[derive(Parser, Debug)]
#[command(name = "buddy")]
#[command(version)]
#[command(about = "Buddy, a persona-driven AI chat assistant powered by Google Gemini", long_about = None)]
pub struct Cli {
    /// Gemini model to use (e.g., gemini-1.5-pro, gemini-1.5-flash)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Persona to start with (default, expert, creative, concise)
    #[arg(long)]
    pub persona: Option<Persona>,

    /// API key to use when none is provisioned through secrets
    #[arg(long)]
    pub api_key: Option<String>,

    /// Non-interactive prompt to execute
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Output format for non-interactive mode
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, requires = "prompt")]
    pub output_format: OutputFormat,

    /// Write the transcript to the export directory after a non-interactive run
    #[arg(long, requires = "prompt")]
    pub export: bool,

    /// Directory for exported transcripts (overrides config)
    #[arg(long)]
    pub export_dir: Option<PathBuf>,

    /// Wait for complete replies instead of streaming them
    #[arg(long)]
    pub no_stream: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize configuration
    Init,
    /// List available personas
    Personas,
    /// Start a chat session (default)
    Chat,
    /// Show version information
    Version,
    /// Check API key and configuration status
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON structured output
    Json,
}
