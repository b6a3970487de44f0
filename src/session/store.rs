use super::message::Message;

/// Single source of truth for the UI-visible chat state
#[derive(Debug, Default)]
pub struct SessionStore {
    messages: Vec<Message>,
    provisioned_key: Option<String>,
    user_key: Option<String>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message to the end of the log
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Empty the log
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Key supplied by secrets (environment or secrets file)
    pub fn set_provisioned_key(&mut self, key: Option<String>) {
        self.provisioned_key = non_blank(key);
    }

    /// Key typed by the user; held in memory only
    pub fn set_user_key(&mut self, key: Option<String>) {
        self.user_key = non_blank(key);
    }

    pub fn has_provisioned_key(&self) -> bool {
        self.provisioned_key.is_some()
    }

    /// The operative API key: a provisioned key overrides a typed one
    pub fn get_active_key(&self) -> Option<&str> {
        self.provisioned_key
            .as_deref()
            .or(self.user_key.as_deref())
    }
}

fn non_blank(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}
