use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use super::message::Message;
use crate::constants::{EXPORT_FILE_PREFIX, EXPORT_FILE_STAMP_FORMAT, EXPORT_TIMESTAMP_FORMAT};
use crate::utils::BuddyError;

/// Downloadable snapshot of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatExport {
    pub timestamp: String,
    pub messages: Vec<Message>,
}

impl ChatExport {
    pub fn new(messages: &[Message], now: DateTime<Local>) -> Self {
        Self {
            timestamp: now.format(EXPORT_TIMESTAMP_FORMAT).to_string(),
            messages: messages.to_vec(),
        }
    }

    /// Pretty-printed JSON document
    pub fn to_json(&self) -> Result<String, BuddyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the export into `dir` under a timestamped file name
    pub fn write_to_dir(&self, dir: &Path, now: DateTime<Local>) -> Result<PathBuf, BuddyError> {
        std::fs::create_dir_all(dir).map_err(|e| {
            BuddyError::ExportError(format!("cannot create {}: {}", dir.display(), e))
        })?;

        let path = dir.join(export_file_name(now));
        std::fs::write(&path, self.to_json()?)?;
        info!(path = %path.display(), messages = self.messages.len(), "exported chat history");

        Ok(path)
    }
}

/// `chat_history_YYYYMMDD_HHMMSS.json`
pub fn export_file_name(now: DateTime<Local>) -> String {
    format!(
        "{}{}.json",
        EXPORT_FILE_PREFIX,
        now.format(EXPORT_FILE_STAMP_FORMAT)
    )
}
