/// Session management module - Gateway

mod events;
mod export;
mod manager;
mod message;
mod store;

pub use events::{event_channel, EventSink, SessionEvent};
pub use export::{export_file_name, ChatExport};
pub use manager::{ChatSession, SessionError, SessionPhase};
pub use message::{Message, Role};
pub use store::SessionStore;
