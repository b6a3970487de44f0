pub mod app;
pub mod cli;
pub mod constants;
pub mod models;
pub mod persona;
pub mod runtime;
pub mod session;
pub mod tui;
pub mod utils;

pub use app::{load_config, Config};
pub use models::{BackendFactory, ChatBackend, ModelError, ModelSession};
pub use persona::Persona;
pub use session::{ChatSession, Message, SessionError, SessionPhase, SessionStore};
pub use tui::run_ui;
pub use utils::BuddyError;
