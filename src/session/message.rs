use serde::{Deserialize, Serialize};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the chat transcript. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Assistant entry produced from a failed model call
    pub fn error(detail: impl std::fmt::Display) -> Self {
        Self::assistant(format!("Error: {}", detail))
    }

    pub fn is_error(&self) -> bool {
        self.role == Role::Assistant && self.content.starts_with("Error:")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_shape() {
        let msg = Message::error("quota exceeded");
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content, "Error: quota exceeded");
        assert!(msg.is_error());
        assert!(!Message::user("Error: typed by the user").is_error());
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_string(&Message::user("Hello")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"Hello"}"#);
    }
}
