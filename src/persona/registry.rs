use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Line breaks and indentation are part of the prompt text sent to the model.
const DEFAULT_INSTRUCTION: &str = "You are a helpful, friendly assistant named Buddy. \n    \
You provide concise and accurate information. \n    \
If you don't know something, admit it rather than making up an answer.\n    \
Keep your responses short and to the point unless asked for detailed explanations.";

const EXPERT_INSTRUCTION: &str = "You are now in EXPERT mode. You are a knowledgeable expert who provides \n    \
detailed, technical, and accurate information. Structure your answers with clear \n    \
headings and include relevant technical details when appropriate. Cite your sources \n    \
of information when possible.";

const CREATIVE_INSTRUCTION: &str = "You are now in CREATIVE mode. You are an imaginative and artistic \n    \
assistant. Make your responses colorful, metaphorical, and engaging. Feel free to \n    \
use stories, analogies, and creative examples to illustrate your points.";

const CONCISE_INSTRUCTION: &str = "You are now in CONCISE mode. Provide extremely brief answers. \n    \
Use no more than 1-2 short sentences for any response. Focus only on the most \n    \
essential information.";

/// The four persona presets that shape the model's replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// Friendly general-purpose assistant
    #[default]
    Default,
    /// Detailed, technical answers with structure
    Expert,
    /// Imaginative, metaphor-rich answers
    Creative,
    /// One or two sentences, nothing more
    Concise,
}

impl Persona {
    /// Every persona, in selection order
    pub const ALL: [Persona; 4] = [
        Persona::Default,
        Persona::Expert,
        Persona::Creative,
        Persona::Concise,
    ];

    /// System instruction sent to the model when this persona becomes active
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Default => DEFAULT_INSTRUCTION,
            Self::Expert => EXPERT_INSTRUCTION,
            Self::Creative => CREATIVE_INSTRUCTION,
            Self::Concise => CONCISE_INSTRUCTION,
        }
    }

    /// Stable identifier used in config files and on the command line
    pub fn id(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Expert => "expert",
            Self::Creative => "creative",
            Self::Concise => "concise",
        }
    }

    /// Button-style label
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::Expert => "Expert",
            Self::Creative => "Creative",
            Self::Concise => "Concise",
        }
    }

    /// Upper-case label used in status lines and switch notices
    pub fn label(&self) -> String {
        self.id().to_uppercase()
    }

    /// One-line summary for listings
    pub fn description(&self) -> &'static str {
        match self {
            Self::Default => "Helpful and friendly, short answers",
            Self::Expert => "Detailed technical answers with headings and sources",
            Self::Creative => "Colorful, metaphorical and story-driven",
            Self::Concise => "One or two sentences at most",
        }
    }

    /// Function key that selects this persona in the terminal UI
    pub fn hotkey(&self) -> u8 {
        match self {
            Self::Default => 1,
            Self::Expert => 2,
            Self::Creative => 3,
            Self::Concise => 4,
        }
    }

    /// Persona bound to a function key, if any
    pub fn from_hotkey(key: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.hotkey() == key)
    }

    /// Cycle to the next persona
    pub fn next(&self) -> Self {
        match self {
            Self::Default => Self::Expert,
            Self::Expert => Self::Creative,
            Self::Creative => Self::Concise,
            Self::Concise => Self::Default,
        }
    }

    /// Cycle to the previous persona
    pub fn previous(&self) -> Self {
        match self {
            Self::Default => Self::Concise,
            Self::Concise => Self::Creative,
            Self::Creative => Self::Expert,
            Self::Expert => Self::Default,
        }
    }

    /// Accent color for the status label
    pub fn color(&self) -> Color {
        match self {
            Self::Default => Color::Green,
            Self::Expert => Color::Blue,
            Self::Creative => Color::Magenta,
            Self::Concise => Color::Yellow,
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Persona {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" | "buddy" => Ok(Self::Default),
            "expert" => Ok(Self::Expert),
            "creative" => Ok(Self::Creative),
            "concise" | "brief" => Ok(Self::Concise),
            other => Err(format!(
                "unknown persona '{}' (expected one of: default, expert, creative, concise)",
                other
            )),
        }
    }
}
