use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::constants::{UI_PAGE_SCROLL_LINES, UI_SCROLL_LINES};
use crate::persona::Persona;

/// What the input line is currently used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Viewing chat; single-key shortcuts
    Normal,
    /// Typing a chat message
    Insert,
    /// Typing a `:` command
    Command,
    /// Typing an API key (masked)
    KeyEntry,
}

/// Result of interpreting one key press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Submit,
    Insert(char),
    Backspace,
    /// Leave the current input mode
    Cancel,
    EnterInsert,
    EnterCommand,
    SelectPersona(Persona),
    NextPersona,
    PreviousPersona,
    Reset,
    Export,
    ToggleSidebar,
    ScrollUp(u16),
    ScrollDown(u16),
    None,
}

/// Map a key press to an action. Global shortcuts win over mode bindings.
pub fn map_key(mode: InputMode, key: KeyEvent) -> KeyAction {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('c') if ctrl => return KeyAction::Quit,
        KeyCode::Char('r') if ctrl => return KeyAction::Reset,
        KeyCode::Char('s') if ctrl => return KeyAction::Export,
        KeyCode::Char('p') if ctrl => return KeyAction::PreviousPersona,
        KeyCode::F(n) => {
            return Persona::from_hotkey(n)
                .map(KeyAction::SelectPersona)
                .unwrap_or(KeyAction::None)
        }
        KeyCode::BackTab => return KeyAction::NextPersona,
        KeyCode::Tab => return KeyAction::ToggleSidebar,
        KeyCode::PageUp => return KeyAction::ScrollUp(UI_PAGE_SCROLL_LINES),
        KeyCode::PageDown => return KeyAction::ScrollDown(UI_PAGE_SCROLL_LINES),
        _ => {}
    }

    match mode {
        InputMode::Normal => match key.code {
            KeyCode::Char('q') => KeyAction::Quit,
            KeyCode::Char('i') | KeyCode::Enter => KeyAction::EnterInsert,
            KeyCode::Char(':') => KeyAction::EnterCommand,
            KeyCode::Up | KeyCode::Char('k') => KeyAction::ScrollUp(UI_SCROLL_LINES),
            KeyCode::Down | KeyCode::Char('j') => KeyAction::ScrollDown(UI_SCROLL_LINES),
            _ => KeyAction::None,
        },
        InputMode::Insert | InputMode::Command | InputMode::KeyEntry => match key.code {
            KeyCode::Enter => KeyAction::Submit,
            KeyCode::Esc => KeyAction::Cancel,
            KeyCode::Backspace => KeyAction::Backspace,
            KeyCode::Up => KeyAction::ScrollUp(1),
            KeyCode::Down => KeyAction::ScrollDown(1),
            KeyCode::Char(c) if !ctrl => KeyAction::Insert(c),
            _ => KeyAction::None,
        },
    }
}

/// A `:` command typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Reset,
    Export,
    Persona(Persona),
    /// Enter a key, inline or via the masked prompt
    Key(Option<String>),
    ToggleSidebar,
    Help,
}

/// Commands shown in the help panel
pub const COMMAND_HELP: &[(&str, &str)] = &[
    (":persona <name>", "Switch persona (default, expert, creative, concise)"),
    (":reset", "Clear the chat and start a fresh session"),
    (":export", "Save the chat history as JSON"),
    (":key [value]", "Enter a Google AI Studio API key"),
    (":sidebar / :sb", "Toggle the settings sidebar"),
    (":help / :h", "Show this help"),
    (":quit / :q", "Quit"),
];

/// Key bindings shown in the help panel
pub const KEY_HELP: &[(&str, &str)] = &[
    ("Enter", "Send message"),
    ("F1-F4", "Default / Expert / Creative / Concise persona"),
    ("Shift+Tab", "Next persona"),
    ("Ctrl+P", "Previous persona"),
    ("Ctrl+R", "Reset chat"),
    ("Ctrl+S", "Export chat history"),
    ("Tab", "Toggle sidebar"),
    ("PgUp/PgDn", "Scroll"),
    ("Esc", "Normal mode (then : for commands, i to type)"),
    ("Ctrl+C", "Quit"),
];

/// Parse the text of a `:` command (with or without the leading colon)
pub fn parse_command(input: &str) -> Result<Command, String> {
    let input = input.trim().trim_start_matches(':');
    let mut parts = input.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    let rest: Vec<&str> = parts.collect();

    match name.as_str() {
        "quit" | "q" | "exit" => Ok(Command::Quit),
        "reset" | "clear" => Ok(Command::Reset),
        "export" | "download" | "save" => Ok(Command::Export),
        "persona" | "mode" => match rest.first() {
            Some(name) => name.parse().map(Command::Persona),
            None => Err("Usage: :persona <default|expert|creative|concise>".to_string()),
        },
        "key" => Ok(Command::Key(rest.first().map(|k| k.to_string()))),
        "sidebar" | "sb" => Ok(Command::ToggleSidebar),
        "help" | "h" => Ok(Command::Help),
        "" => Err("Empty command".to_string()),
        other => Err(format!("Unknown command: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn test_global_shortcuts() {
        for mode in [InputMode::Normal, InputMode::Insert, InputMode::KeyEntry] {
            assert_eq!(map_key(mode, ctrl('c')), KeyAction::Quit);
            assert_eq!(map_key(mode, ctrl('r')), KeyAction::Reset);
            assert_eq!(map_key(mode, ctrl('s')), KeyAction::Export);
            assert_eq!(
                map_key(mode, key(KeyCode::F(2))),
                KeyAction::SelectPersona(Persona::Expert)
            );
            assert_eq!(map_key(mode, key(KeyCode::BackTab)), KeyAction::NextPersona);
            assert_eq!(map_key(mode, ctrl('p')), KeyAction::PreviousPersona);
        }
        assert_eq!(map_key(InputMode::Insert, key(KeyCode::F(9))), KeyAction::None);
    }

    #[test]
    fn test_insert_mode_typing() {
        assert_eq!(
            map_key(InputMode::Insert, key(KeyCode::Char('q'))),
            KeyAction::Insert('q')
        );
        assert_eq!(map_key(InputMode::Insert, key(KeyCode::Enter)), KeyAction::Submit);
        assert_eq!(map_key(InputMode::Insert, key(KeyCode::Esc)), KeyAction::Cancel);
        assert_eq!(
            map_key(InputMode::KeyEntry, key(KeyCode::Backspace)),
            KeyAction::Backspace
        );
    }

    #[test]
    fn test_normal_mode_bindings() {
        assert_eq!(map_key(InputMode::Normal, key(KeyCode::Char('q'))), KeyAction::Quit);
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Char(':'))),
            KeyAction::EnterCommand
        );
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Char('i'))),
            KeyAction::EnterInsert
        );
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(":q"), Ok(Command::Quit));
        assert_eq!(parse_command("reset"), Ok(Command::Reset));
        assert_eq!(parse_command(":export"), Ok(Command::Export));
        assert_eq!(
            parse_command(":persona Creative"),
            Ok(Command::Persona(Persona::Creative))
        );
        assert_eq!(parse_command(":mode concise"), Ok(Command::Persona(Persona::Concise)));
        assert_eq!(parse_command(":key"), Ok(Command::Key(None)));
        assert_eq!(
            parse_command(":key ABC123"),
            Ok(Command::Key(Some("ABC123".to_string())))
        );
        assert!(parse_command(":persona").is_err());
        assert!(parse_command(":persona pirate").is_err());
        assert!(parse_command(":frobnicate").is_err());
        assert!(parse_command(":").is_err());
    }
}
