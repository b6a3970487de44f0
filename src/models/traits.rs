use async_trait::async_trait;

use super::types::{ModelError, ModelResponse, StreamCallback};

/// A provider that can open conversational sessions
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Open a new conversational session authenticated with `api_key`.
    ///
    /// Opening does not contact the provider; a bad key is only discovered
    /// on the first message.
    async fn open_session(&self, api_key: &str) -> Result<Box<dyn ModelSession>, ModelError>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// An open multi-turn conversation with the provider
#[async_trait]
pub trait ModelSession: Send + Sync {
    /// Send one user turn and wait for the reply.
    ///
    /// When `stream_callback` is given, text deltas are delivered to it as they
    /// arrive; the returned response still carries the full text. A failed
    /// turn is not recorded in the session history.
    async fn send_message(
        &mut self,
        text: &str,
        stream_callback: Option<StreamCallback>,
    ) -> Result<ModelResponse, ModelError>;

    /// Number of completed turns (user + model) held in the session history
    fn history_len(&self) -> usize;
}
