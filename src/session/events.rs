use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Notification from the session core to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// State changed; redraw from the store
    Refresh,
    /// Informational status line
    Notice(String),
    /// Error shown outside the transcript (sidebar)
    Error(String),
}

/// Sending half handed to a session. A sink without a receiver drops events.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<SessionEvent>>,
}

impl EventSink {
    /// A sink that discards every event
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.tx {
            // Receiver gone means the UI has shut down
            let _ = tx.send(event);
        }
    }
}

/// Create a connected sink and its receiver
pub fn event_channel() -> (EventSink, UnboundedReceiver<SessionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx: Some(tx) }, rx)
}
