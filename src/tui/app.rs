use chrono::Local;
use crossterm::event::KeyEvent;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{self, Receiver, Sender, UnboundedReceiver};
use tokio::sync::Mutex;
use tracing::{debug, error};

use super::input::{map_key, parse_command, Command, InputMode, KeyAction};
use crate::app::Config;
use crate::constants::{
    MISSING_KEY_PROMPT, SECRETS_LOADED_NOTICE, STREAM_CHANNEL_CAPACITY, UI_DEFAULT_VIEWPORT_HEIGHT,
};
use crate::models::StreamCallback;
use crate::persona::Persona;
use crate::session::{ChatSession, Message, SessionError, SessionEvent, SessionPhase};

/// A session call run off the UI thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Open the session from the provisioned key, else try the key from `--api-key`
    Start(Option<String>),
    SubmitKey(String),
    SwitchPersona(Persona),
    Send(String),
    Reset,
}

/// Messages from background operations to the UI loop
#[derive(Debug)]
pub enum UiSignal {
    Chunk(String),
    /// Operation finished, with an optional status line
    Done(Option<String>),
}

/// Run one operation against the session and describe the outcome
pub async fn perform(
    session: &mut ChatSession,
    op: Operation,
    stream: Option<StreamCallback>,
) -> Option<String> {
    match op {
        Operation::Start(key) => {
            let mut phase = session.start().await;
            if phase == SessionPhase::NoKey {
                if let Some(key) = key {
                    phase = session.submit_key(&key).await;
                }
            }
            match phase {
                SessionPhase::NoKey => Some(MISSING_KEY_PROMPT.to_string()),
                SessionPhase::SessionActive if session.has_provisioned_key() => {
                    Some(SECRETS_LOADED_NOTICE.to_string())
                }
                _ => None,
            }
        }
        Operation::SubmitKey(key) => match session.submit_key(&key).await {
            SessionPhase::NoKey => Some(MISSING_KEY_PROMPT.to_string()),
            SessionPhase::SessionActive if !session.has_provisioned_key() => {
                Some("Chat session started".to_string())
            }
            _ => None,
        },
        Operation::SwitchPersona(persona) => match session.switch_persona(persona).await {
            Ok(true) => None,
            Ok(false) => Some(format!("Already in {} mode", persona.label())),
            Err(SessionError::MissingKey) => Some(MISSING_KEY_PROMPT.to_string()),
            Err(e) => Some(e.to_string()),
        },
        Operation::Send(text) => match session.send(&text, stream).await {
            Ok(_) => None,
            Err(SessionError::MissingKey) => Some(MISSING_KEY_PROMPT.to_string()),
            Err(SessionError::EmptyMessage) => None,
        },
        Operation::Reset => {
            session.reset().await;
            Some("Chat reset".to_string())
        }
    }
}

/// Application state
pub struct App {
    session: Arc<Mutex<ChatSession>>,
    events: UnboundedReceiver<SessionEvent>,
    signal_tx: Sender<UiSignal>,
    signal_rx: Receiver<UiSignal>,
    /// Transcript snapshot taken after each operation
    pub messages: Vec<Message>,
    pub persona: Persona,
    pub phase: SessionPhase,
    pub has_provisioned_key: bool,
    pub model_name: String,
    /// User input buffer
    pub input: String,
    pub input_mode: InputMode,
    pub running: bool,
    /// Streamed text of the reply in flight
    pub current_response: String,
    /// Message shown while its turn is still running
    pub pending_user: Option<String>,
    pub is_busy: bool,
    /// Lines scrolled up from the bottom of the chat
    pub scroll_offset: u16,
    pub show_sidebar: bool,
    pub show_help: bool,
    pub status_message: Option<String>,
    pub sidebar_error: Option<String>,
    stream: bool,
    export_dir: PathBuf,
    initial_key: Option<String>,
}

impl App {
    pub fn new(
        session: ChatSession,
        events: UnboundedReceiver<SessionEvent>,
        config: &Config,
        initial_key: Option<String>,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let phase = session.phase();

        Self {
            messages: session.messages().to_vec(),
            persona: session.active_persona(),
            phase,
            has_provisioned_key: session.has_provisioned_key(),
            model_name: session.model_name().to_string(),
            session: Arc::new(Mutex::new(session)),
            events,
            signal_tx,
            signal_rx,
            input: String::new(),
            input_mode: if phase == SessionPhase::NoKey {
                InputMode::KeyEntry
            } else {
                InputMode::Insert
            },
            running: true,
            current_response: String::new(),
            pending_user: None,
            is_busy: false,
            scroll_offset: 0,
            show_sidebar: config.ui.show_sidebar,
            show_help: false,
            status_message: None,
            sidebar_error: None,
            stream: config.model.stream,
            export_dir: config.export.directory.clone(),
            initial_key,
        }
    }

    /// Kick off session startup
    pub fn begin(&mut self) {
        let key = self.initial_key.take();
        self.dispatch(Operation::Start(key));
    }

    /// Run an operation in the background. Only one runs at a time.
    pub fn dispatch(&mut self, op: Operation) {
        if self.is_busy {
            self.set_status("Please wait for the current request to finish");
            return;
        }

        debug!(?op, "dispatching session operation");
        self.is_busy = true;
        self.sidebar_error = None;
        self.current_response.clear();
        if let Operation::Send(text) = &op {
            self.pending_user = Some(text.clone());
            self.scroll_offset = 0;
        }

        let stream = if self.stream && matches!(op, Operation::Send(_)) {
            let chunk_tx = self.signal_tx.clone();
            let callback: StreamCallback = Arc::new(move |delta: &str| {
                let _ = chunk_tx.try_send(UiSignal::Chunk(delta.to_string()));
            });
            Some(callback)
        } else {
            None
        };

        let session = self.session.clone();
        let done_tx = self.signal_tx.clone();
        tokio::spawn(async move {
            let status = {
                let mut session = session.lock().await;
                perform(&mut session, op, stream).await
            };
            let _ = done_tx.send(UiSignal::Done(status)).await;
        });
    }

    /// Copy the session state into the view. Skipped while an operation holds
    /// the session; its completion triggers another sync.
    pub fn sync(&mut self) -> bool {
        let Ok(session) = self.session.try_lock() else {
            return false;
        };

        self.messages = session.messages().to_vec();
        self.persona = session.active_persona();
        self.phase = session.phase();
        self.has_provisioned_key = session.has_provisioned_key();
        drop(session);

        match (self.phase, self.input_mode) {
            (SessionPhase::NoKey, InputMode::Insert) => self.input_mode = InputMode::KeyEntry,
            (SessionPhase::KeyPending | SessionPhase::SessionActive, InputMode::KeyEntry) => {
                self.input_mode = InputMode::Insert
            }
            _ => {}
        }
        true
    }

    /// Apply everything the background side has sent since the last frame
    pub fn process_signals(&mut self) {
        while let Ok(signal) = self.signal_rx.try_recv() {
            self.apply_signal(signal);
        }
        while let Ok(event) = self.events.try_recv() {
            self.apply_event(event);
        }
    }

    fn apply_signal(&mut self, signal: UiSignal) {
        match signal {
            UiSignal::Chunk(delta) => self.current_response.push_str(&delta),
            UiSignal::Done(status) => {
                self.is_busy = false;
                self.pending_user = None;
                self.current_response.clear();
                self.sync();
                if let Some(status) = status {
                    self.set_status(status);
                }
            }
        }
    }

    fn apply_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Refresh => {
                self.sync();
            }
            SessionEvent::Notice(text) => self.set_status(text),
            SessionEvent::Error(text) => {
                error!("{}", text);
                self.sidebar_error = Some(text);
            }
        }
    }

    /// Handle one key press
    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.show_help {
            self.show_help = false;
            return;
        }

        match map_key(self.input_mode, key) {
            KeyAction::Quit => self.quit(),
            KeyAction::Submit => self.submit_input(),
            KeyAction::Insert(c) => self.input.push(c),
            KeyAction::Backspace => {
                self.input.pop();
            }
            KeyAction::Cancel => {
                if self.input_mode == InputMode::Command {
                    self.input.clear();
                }
                self.input_mode = InputMode::Normal;
            }
            KeyAction::EnterInsert => {
                self.input_mode = if self.phase == SessionPhase::NoKey {
                    InputMode::KeyEntry
                } else {
                    InputMode::Insert
                };
            }
            KeyAction::EnterCommand => {
                self.input.clear();
                self.input_mode = InputMode::Command;
            }
            KeyAction::SelectPersona(persona) => {
                self.dispatch(Operation::SwitchPersona(persona))
            }
            KeyAction::NextPersona => self.dispatch(Operation::SwitchPersona(self.persona.next())),
            KeyAction::PreviousPersona => {
                self.dispatch(Operation::SwitchPersona(self.persona.previous()))
            }
            KeyAction::Reset => self.dispatch(Operation::Reset),
            KeyAction::Export => self.export(),
            KeyAction::ToggleSidebar => self.toggle_sidebar(),
            KeyAction::ScrollUp(amount) => self.scroll_up(amount),
            KeyAction::ScrollDown(amount) => self.scroll_down(amount),
            KeyAction::None => {}
        }
    }

    fn submit_input(&mut self) {
        match self.input_mode {
            InputMode::Insert => {
                if self.input.trim().is_empty() || self.is_busy {
                    return;
                }
                let text = std::mem::take(&mut self.input);
                self.dispatch(Operation::Send(text));
            }
            InputMode::KeyEntry => {
                if self.input.trim().is_empty() {
                    self.set_status(MISSING_KEY_PROMPT);
                    return;
                }
                let key = std::mem::take(&mut self.input);
                self.dispatch(Operation::SubmitKey(key.trim().to_string()));
            }
            InputMode::Command => {
                let text = std::mem::take(&mut self.input);
                self.input_mode = InputMode::Normal;
                match parse_command(&text) {
                    Ok(command) => self.run_command(command),
                    Err(message) => self.set_status(message),
                }
            }
            InputMode::Normal => {}
        }
    }

    fn run_command(&mut self, command: Command) {
        match command {
            Command::Quit => self.quit(),
            Command::Reset => self.dispatch(Operation::Reset),
            Command::Export => self.export(),
            Command::Persona(persona) => self.dispatch(Operation::SwitchPersona(persona)),
            Command::Key(Some(key)) => self.dispatch(Operation::SubmitKey(key)),
            Command::Key(None) => {
                self.input.clear();
                self.input_mode = InputMode::KeyEntry;
            }
            Command::ToggleSidebar => self.toggle_sidebar(),
            Command::Help => self.show_help = true,
        }
    }

    /// Write the transcript to the export directory
    pub fn export(&mut self) {
        let session = self.session.clone();
        let result = match session.try_lock() {
            Ok(session) => session.export_to(&self.export_dir, Local::now()),
            Err(_) => {
                self.set_status("Please wait for the current request to finish");
                return;
            }
        };

        if let Err(e) = result {
            error!(error = %e, "export failed");
            self.sidebar_error = Some(format!("Export failed: {}", e));
        }
    }

    pub fn toggle_sidebar(&mut self) {
        self.show_sidebar = !self.show_sidebar;
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    /// Rough count of rendered chat lines, ignoring wrapping
    fn line_estimate(&self) -> u16 {
        let mut lines: usize = self
            .messages
            .iter()
            .map(|m| m.content.lines().count() + 2)
            .sum();
        if let Some(pending) = &self.pending_user {
            lines += pending.lines().count() + 2;
        }
        lines += self.current_response.lines().count();
        lines.min(u16::MAX as usize) as u16
    }

    pub fn scroll_up(&mut self, amount: u16) {
        let max_scroll = self.line_estimate().saturating_sub(UI_DEFAULT_VIEWPORT_HEIGHT);
        self.scroll_offset = self.scroll_offset.saturating_add(amount).min(max_scroll);
    }

    pub fn scroll_down(&mut self, amount: u16) {
        self.scroll_offset = self.scroll_offset.saturating_sub(amount);
    }

    pub fn quit(&mut self) {
        self.running = false;
    }
}
