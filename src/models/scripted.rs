//! In-memory backend with scripted replies, for exercising session logic
//! without a network.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::traits::{ChatBackend, ModelSession};
use super::types::{ModelError, ModelResponse, StreamCallback};

/// A turn the scripted backend received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTurn {
    /// 1-based index of the session that sent it
    pub session: usize,
    pub text: String,
}

enum Reply {
    Ok(String),
    Err(ModelError),
    /// Stream some text, then fail
    Partial(String, ModelError),
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Reply>,
    sent: Vec<SentTurn>,
    sessions_opened: usize,
    open_error: Option<ModelError>,
}

#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply; unqueued turns get `reply to: <text>`
    pub fn push_ok(&self, text: &str) {
        self.script
            .lock()
            .unwrap()
            .replies
            .push_back(Reply::Ok(text.to_string()));
    }

    /// Queue a failing reply
    pub fn push_err(&self, err: ModelError) {
        self.script.lock().unwrap().replies.push_back(Reply::Err(err));
    }

    /// Queue a reply that streams `partial` before failing
    pub fn push_partial_err(&self, partial: &str, err: ModelError) {
        self.script
            .lock()
            .unwrap()
            .replies
            .push_back(Reply::Partial(partial.to_string(), err));
    }

    /// Make the next `open_session` call fail
    pub fn fail_open(&self, err: ModelError) {
        self.script.lock().unwrap().open_error = Some(err);
    }

    pub fn sent(&self) -> Vec<SentTurn> {
        self.script.lock().unwrap().sent.clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|t| t.text).collect()
    }

    pub fn sessions_opened(&self) -> usize {
        self.script.lock().unwrap().sessions_opened
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn open_session(&self, api_key: &str) -> Result<Box<dyn ModelSession>, ModelError> {
        let mut script = self.script.lock().unwrap();
        if let Some(err) = script.open_error.take() {
            return Err(err);
        }
        if api_key.is_empty() {
            return Err(ModelError::Auth("API key is empty".to_string()));
        }
        script.sessions_opened += 1;

        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            id: script.sessions_opened,
            history: 0,
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedSession {
    script: Arc<Mutex<Script>>,
    id: usize,
    history: usize,
}

#[async_trait]
impl ModelSession for ScriptedSession {
    async fn send_message(
        &mut self,
        text: &str,
        stream_callback: Option<StreamCallback>,
    ) -> Result<ModelResponse, ModelError> {
        let reply = {
            let mut script = self.script.lock().unwrap();
            script.sent.push(SentTurn {
                session: self.id,
                text: text.to_string(),
            });
            script
                .replies
                .pop_front()
                .unwrap_or_else(|| Reply::Ok(format!("reply to: {}", text)))
        };

        let content = match reply {
            Reply::Ok(content) => content,
            Reply::Err(err) => return Err(err),
            Reply::Partial(partial, err) => {
                if let Some(callback) = &stream_callback {
                    callback(&partial);
                }
                return Err(err);
            }
        };
        if let Some(callback) = stream_callback {
            let middle = content.len() / 2;
            let split = (0..=middle)
                .rev()
                .find(|i| content.is_char_boundary(*i))
                .unwrap_or(0);
            let (head, tail) = content.split_at(split);
            for delta in [head, tail] {
                if !delta.is_empty() {
                    callback(delta);
                }
            }
        }

        self.history += 2;
        Ok(ModelResponse {
            content,
            usage: None,
            model_name: "scripted".to_string(),
        })
    }

    fn history_len(&self) -> usize {
        self.history
    }
}
