use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::events::{EventSink, SessionEvent};
use super::export::ChatExport;
use super::message::Message;
use super::store::SessionStore;
use crate::constants::GREETING;
use crate::models::{ChatBackend, ModelError, ModelSession, StreamCallback};
use crate::persona::Persona;
use crate::utils::BuddyError;

/// Shown in the transcript when a message is sent before any session opened
const NO_SESSION_DETAIL: &str =
    "no active model session. Re-enter your API key or reset the chat to try again.";

/// Where the session stands in its key/handle lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No operative API key; chat and persona actions are gated
    NoKey,
    /// A key is known but no model session is open
    KeyPending,
    /// A primed model session is open
    SessionActive,
}

/// Errors returned to the presentation layer. Model failures during a chat
/// turn are absorbed into the transcript instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("no API key available")]
    MissingKey,

    #[error("message is empty")]
    EmptyMessage,
}

/// Owns the conversation: message log, active persona and the model session
/// handle. Each presentation-layer interaction maps to one method here.
pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    store: SessionStore,
    persona: Persona,
    handle: Option<Box<dyn ModelSession>>,
    events: EventSink,
    /// Incremented every time a new handle is installed
    generation: u64,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn ChatBackend>, persona: Persona, events: EventSink) -> Self {
        Self {
            backend,
            store: SessionStore::new(),
            persona,
            handle: None,
            events,
            generation: 0,
        }
    }

    /// Record the pre-provisioned key found at startup
    pub fn with_provisioned_key(mut self, key: Option<String>) -> Self {
        self.store.set_provisioned_key(key);
        self
    }

    pub fn phase(&self) -> SessionPhase {
        match (self.store.get_active_key().is_some(), self.has_session()) {
            (false, _) => SessionPhase::NoKey,
            (true, false) => SessionPhase::KeyPending,
            (true, true) => SessionPhase::SessionActive,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn active_persona(&self) -> Persona {
        self.persona
    }

    pub fn has_session(&self) -> bool {
        self.handle.is_some()
    }

    pub fn has_provisioned_key(&self) -> bool {
        self.store.has_provisioned_key()
    }

    pub fn model_name(&self) -> &str {
        self.backend.name()
    }

    /// Number of handles opened so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Open a model session and prime it with the active persona.
    ///
    /// Returns `Ok(None)` for an empty key without contacting the backend.
    /// The priming exchange never reaches the message log.
    pub async fn init(&self, api_key: &str) -> Result<Option<Box<dyn ModelSession>>, ModelError> {
        if api_key.trim().is_empty() {
            return Ok(None);
        }

        let mut handle = self.backend.open_session(api_key).await?;
        handle
            .send_message(self.persona.instruction(), None)
            .await?;
        debug!(persona = %self.persona, "model session primed");

        Ok(Some(handle))
    }

    /// Replace the handle with a freshly primed one. Failures leave the
    /// handle absent and are reported as an `Error` event.
    async fn install(&mut self, api_key: &str) -> bool {
        self.handle = None;
        match self.init(api_key).await {
            Ok(Some(handle)) => {
                self.handle = Some(handle);
                self.generation += 1;
                info!(generation = self.generation, persona = %self.persona, "model session started");
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "failed to start model session");
                self.events
                    .emit(SessionEvent::Error(format!("Error starting chat: {}", e)));
                false
            }
        }
    }

    /// Startup hook: with a provisioned key, open the session and greet
    pub async fn start(&mut self) -> SessionPhase {
        if self.handle.is_none() && self.store.has_provisioned_key() {
            let key = self.store.get_active_key().unwrap_or_default().to_string();
            if self.install(&key).await {
                self.store.append(Message::assistant(GREETING));
            }
            self.events.emit(SessionEvent::Refresh);
        }
        self.phase()
    }

    /// Accept a key typed by the user and open a session with it
    pub async fn submit_key(&mut self, key: &str) -> SessionPhase {
        self.store.set_user_key(Some(key.to_string()));

        if self.store.has_provisioned_key() {
            self.events.emit(SessionEvent::Notice(
                "Using the API key from secrets; the typed key is ignored".to_string(),
            ));
            return self.phase();
        }

        let Some(active) = self.store.get_active_key().map(str::to_string) else {
            self.events.emit(SessionEvent::Refresh);
            return self.phase();
        };

        if self.install(&active).await {
            self.store.append(Message::assistant(GREETING));
        }
        self.events.emit(SessionEvent::Refresh);
        self.phase()
    }

    /// Change the persona, re-priming the open session.
    ///
    /// Selecting the active persona is a no-op. The new persona is committed
    /// before its instruction is sent and stays committed if the send fails.
    /// Returns whether the persona changed.
    pub async fn switch_persona(&mut self, persona: Persona) -> Result<bool, SessionError> {
        if self.store.get_active_key().is_none() {
            return Err(SessionError::MissingKey);
        }
        if persona == self.persona {
            return Ok(false);
        }

        self.persona = persona;
        info!(%persona, "persona switched");

        if let Some(handle) = self.handle.as_mut() {
            match handle.send_message(persona.instruction(), None).await {
                Ok(_) => {
                    self.store.append(Message::assistant(format!(
                        "Switched to {} mode!",
                        persona.label()
                    )));
                }
                Err(e) => {
                    // The model may still follow the previous persona
                    warn!(%persona, error = %e, "persona instruction was not delivered");
                    self.events
                        .emit(SessionEvent::Error(format!("Error changing mode: {}", e)));
                }
            }
        }

        self.events.emit(SessionEvent::Refresh);
        Ok(true)
    }

    /// Forward one user turn. Model failures become an `Error:` entry in the
    /// transcript; the returned text is whatever was appended for the reply.
    pub async fn send(
        &mut self,
        text: &str,
        stream_callback: Option<StreamCallback>,
    ) -> Result<String, SessionError> {
        if self.store.get_active_key().is_none() {
            return Err(SessionError::MissingKey);
        }
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        self.store.append(Message::user(text));

        let reply = match self.handle.as_mut() {
            Some(handle) => match handle.send_message(text, stream_callback).await {
                Ok(response) => Message::assistant(response.content),
                Err(e) => {
                    warn!(error = %e, "chat turn failed");
                    Message::error(e)
                }
            },
            None => {
                warn!("message sent without an open model session");
                Message::error(NO_SESSION_DETAIL)
            }
        };

        let content = reply.content.clone();
        self.store.append(reply);
        self.events.emit(SessionEvent::Refresh);

        Ok(content)
    }

    /// Clear the transcript and open a freshly primed session with the
    /// operative key. Any request still running on the old handle is abandoned.
    pub async fn reset(&mut self) -> SessionPhase {
        self.store.clear();
        self.handle = None;

        if let Some(key) = self.store.get_active_key().map(str::to_string) {
            self.install(&key).await;
        }

        info!(phase = ?self.phase(), "chat reset");
        self.events.emit(SessionEvent::Refresh);
        self.phase()
    }

    /// Snapshot the transcript for download
    pub fn export(&self, now: DateTime<Local>) -> ChatExport {
        ChatExport::new(self.store.messages(), now)
    }

    /// Write the transcript to `dir` and report where it went
    pub fn export_to(&self, dir: &Path, now: DateTime<Local>) -> Result<PathBuf, BuddyError> {
        let path = self.export(now).write_to_dir(dir, now)?;
        self.events.emit(SessionEvent::Notice(format!(
            "Chat history saved to {}",
            path.display()
        )));
        Ok(path)
    }
}
