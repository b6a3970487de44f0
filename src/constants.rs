/// Constants module to avoid magic strings in the codebase

// Gemini API
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";
pub const GEMINI_API_KEY_HEADER: &str = "x-goog-api-key";

// Secrets
pub const DEFAULT_API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const SECRETS_FILE_NAME: &str = "secrets.toml";

// Config
pub const APP_NAME: &str = "buddy";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const LOCAL_CONFIG_PATH: &str = ".buddy/config.toml";
pub const ENV_PREFIX: &str = "BUDDY_";
pub const LOG_FILE_NAME: &str = "buddy.log";

// Conversation text
pub const GREETING: &str = "Hi there! I'm Buddy, your AI assistant. How can I help you today?";
pub const MISSING_KEY_PROMPT: &str =
    "Please enter your Google AI Studio API key to start chatting.";
pub const SECRETS_LOADED_NOTICE: &str = "API key loaded from secrets!";
pub const HISTORY_LOST_NOTE: &str =
    "Note: Chat history will be lost when you close the app unless you export it.";

// Export
pub const EXPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const EXPORT_FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
pub const EXPORT_FILE_PREFIX: &str = "chat_history_";

// UI Configuration
pub const UI_REFRESH_INTERVAL_MS: u64 = 50;
pub const UI_SCROLL_LINES: u16 = 3;
pub const UI_PAGE_SCROLL_LINES: u16 = 10;
pub const UI_DEFAULT_VIEWPORT_HEIGHT: u16 = 20;
pub const STREAM_CHANNEL_CAPACITY: usize = 100;
