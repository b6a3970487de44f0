use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::{
    cli::OutputFormat,
    constants::MISSING_KEY_PROMPT,
    models::{ChatBackend, StreamCallback},
    persona::Persona,
    session::{event_channel, ChatSession, SessionEvent, SessionPhase},
};

/// Result of a non-interactive run
#[derive(Debug, Serialize, Deserialize)]
pub struct NonInteractiveResult {
    /// The prompt that was executed
    pub prompt: String,
    /// The model's reply, or the `Error:` text that replaced it
    pub response: String,
    /// Whether the reply is an error message
    pub is_error: bool,
    /// Errors reported outside the transcript (e.g. session start)
    pub errors: Vec<String>,
    /// Where the transcript was written, if exported
    pub exported_to: Option<PathBuf>,
    /// Metadata about the execution
    pub metadata: ExecutionMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    /// Model used
    pub model: String,
    /// Persona the session was primed with
    pub persona: Persona,
    /// Execution time in milliseconds
    pub duration_ms: u128,
    /// Whether the reply was already printed while streaming
    #[serde(skip)]
    pub streamed: bool,
    /// Whether part of a failed reply was printed before the error
    #[serde(skip)]
    pub partial_output: bool,
}

impl NonInteractiveResult {
    pub fn failed(&self) -> bool {
        self.is_error || !self.errors.is_empty()
    }
}

/// Keys and switches for a single-prompt run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub persona: Persona,
    pub provisioned_key: Option<String>,
    pub user_key: Option<String>,
    /// Print deltas to stdout as they arrive (text output only)
    pub stream: bool,
    /// Export the transcript into this directory after the reply
    pub export_dir: Option<PathBuf>,
}

/// Non-interactive runner for executing single prompts
pub struct NonInteractiveRunner {
    backend: Arc<dyn ChatBackend>,
    options: RunOptions,
    output_format: OutputFormat,
}

impl NonInteractiveRunner {
    pub fn new(backend: Arc<dyn ChatBackend>, options: RunOptions, output_format: OutputFormat) -> Self {
        Self {
            backend,
            options,
            output_format,
        }
    }

    /// Execute a single prompt and return the result
    pub async fn execute(&self, prompt: String) -> Result<NonInteractiveResult> {
        let start_time = std::time::Instant::now();
        let (sink, mut events) = event_channel();

        let mut session = ChatSession::new(self.backend.clone(), self.options.persona, sink)
            .with_provisioned_key(self.options.provisioned_key.clone());

        let phase = match (&self.options.provisioned_key, &self.options.user_key) {
            (None, Some(key)) => session.submit_key(key).await,
            _ => session.start().await,
        };
        if phase == SessionPhase::NoKey {
            anyhow::bail!("{}", MISSING_KEY_PROMPT);
        }

        let streamed = self.options.stream && self.output_format == OutputFormat::Text;
        let printed = Arc::new(AtomicBool::new(false));
        let callback: Option<StreamCallback> = streamed.then(|| {
            let printed = printed.clone();
            Arc::new(move |delta: &str| {
                printed.store(true, Ordering::Relaxed);
                let mut stdout = std::io::stdout();
                let _ = stdout.write_all(delta.as_bytes());
                let _ = stdout.flush();
            }) as StreamCallback
        });

        let response = session.send(&prompt, callback).await?;
        let is_error = session
            .store()
            .last()
            .map(|m| m.is_error())
            .unwrap_or(false);

        let exported_to = match &self.options.export_dir {
            Some(dir) => Some(
                session
                    .export_to(dir, Local::now())
                    .context("Failed to export chat history")?,
            ),
            None => None,
        };

        let mut errors = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Error(msg) = event {
                errors.push(msg);
            }
        }

        let duration_ms = start_time.elapsed().as_millis();
        info!(duration_ms, is_error, "non-interactive prompt finished");

        Ok(NonInteractiveResult {
            prompt,
            // The error text itself is never streamed, only what came before it
            metadata: ExecutionMetadata {
                model: session.model_name().to_string(),
                persona: session.active_persona(),
                duration_ms,
                streamed: streamed && !is_error,
                partial_output: is_error && printed.load(Ordering::Relaxed),
            },
            response,
            is_error,
            errors,
            exported_to,
        })
    }

    /// Format the result for output
    pub fn format_result(&self, result: &NonInteractiveResult) -> String {
        match self.output_format {
            OutputFormat::Json => serde_json::to_string_pretty(result)
                .unwrap_or_else(|e| format!("{{\"error\": \"Failed to serialize result: {}\"}}", e)),
            OutputFormat::Text => {
                let mut output = String::new();

                if result.metadata.streamed {
                    // Reply already on stdout; just finish the line
                    output.push('\n');
                } else {
                    if result.metadata.partial_output {
                        output.push('\n');
                    }
                    output.push_str(&result.response);
                    output.push('\n');
                }

                for error in &result.errors {
                    output.push_str(&format!("{}\n", error));
                }

                if let Some(path) = &result.exported_to {
                    output.push_str(&format!("Chat history saved to {}\n", path.display()));
                }

                output
            }
        }
    }
}
