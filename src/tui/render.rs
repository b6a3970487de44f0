use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use super::app::App;
use super::input::{InputMode, COMMAND_HELP, KEY_HELP};
use super::markdown::render_markdown;
use crate::constants::{HISTORY_LOST_NOTE, MISSING_KEY_PROMPT, SECRETS_LOADED_NOTICE};
use crate::persona::Persona;
use crate::session::{Message, Role, SessionPhase};

/// Render the main UI
pub fn render_ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Header
            Constraint::Min(8),    // Main content
            Constraint::Length(3), // Input
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_header(frame, chunks[0], app);

    if app.show_sidebar {
        let content = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(34), Constraint::Min(20)])
            .split(chunks[1]);
        render_sidebar(frame, content[0], app);
        render_chat(frame, content[1], app);
    } else {
        render_chat(frame, chunks[1], app);
    }

    render_input(frame, chunks[2], app);
    render_status_bar(frame, chunks[3], app);

    if app.show_help {
        render_help(frame, app);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "Buddy AI",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | Persona: "),
        Span::styled(
            app.persona.display_name(),
            Style::default()
                .fg(app.persona.color())
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | Model: "),
        Span::styled(app.model_name.as_str(), Style::default().fg(Color::Green)),
    ]))
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray)),
    )
    .alignment(Alignment::Center);

    frame.render_widget(header, area);
}

/// Settings panel: key status, persona picker, errors
fn render_sidebar(frame: &mut Frame, area: Rect, app: &App) {
    let muted = Style::default().fg(Color::DarkGray);
    let mut lines = vec![Line::styled(
        "API key",
        Style::default().add_modifier(Modifier::BOLD),
    )];

    let (key_text, key_color) = match (app.phase, app.has_provisioned_key) {
        (SessionPhase::NoKey, _) => (MISSING_KEY_PROMPT, Color::Yellow),
        (_, true) => (SECRETS_LOADED_NOTICE, Color::Green),
        (SessionPhase::SessionActive, false) => ("Key entered for this session", Color::Green),
        (SessionPhase::KeyPending, false) => ("Key entered, no session open", Color::Yellow),
    };
    lines.push(Line::styled(key_text, Style::default().fg(key_color)));
    lines.push(Line::default());

    lines.push(Line::styled(
        "Persona",
        Style::default().add_modifier(Modifier::BOLD),
    ));
    for persona in Persona::ALL {
        lines.push(persona_line(persona, persona == app.persona));
    }
    lines.push(Line::styled(
        format!("Current mode: {}", app.persona.display_name()),
        Style::default().fg(app.persona.color()),
    ));
    lines.push(Line::styled(
        app.persona.description(),
        muted.add_modifier(Modifier::ITALIC),
    ));
    lines.push(Line::default());

    if let Some(error) = &app.sidebar_error {
        lines.push(Line::styled(
            error.clone(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
        lines.push(Line::default());
    }

    lines.push(Line::styled("Ctrl+R reset  Ctrl+S export", muted));
    lines.push(Line::styled(":help for more", muted));
    lines.push(Line::default());
    lines.push(Line::styled(HISTORY_LOST_NOTE, muted));

    let sidebar = Paragraph::new(lines)
        .block(
            Block::default()
                .title(" Settings ")
                .borders(Borders::RIGHT)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .wrap(Wrap { trim: true });

    frame.render_widget(sidebar, area);
}

fn persona_line(persona: Persona, active: bool) -> Line<'static> {
    let marker = if active { "▸" } else { " " };
    let style = if active {
        Style::default()
            .fg(persona.color())
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };

    Line::from(vec![
        Span::styled(format!(" {} ", marker), style),
        Span::styled(
            format!("F{} ", persona.hotkey()),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(persona.display_name(), style),
    ])
}

fn role_header(role: Role) -> Line<'static> {
    let (label, color) = match role {
        Role::User => ("You", Color::Blue),
        Role::Assistant => ("Buddy", Color::Green),
    };
    Line::styled(
        format!("[{}]", label),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )
}

fn message_lines(message: &Message) -> Vec<Line<'static>> {
    let mut lines = vec![role_header(message.role)];
    match message.role {
        Role::User => lines.extend(message.content.lines().map(|l| Line::raw(l.to_string()))),
        Role::Assistant if message.is_error() => lines.extend(
            message
                .content
                .lines()
                .map(|l| Line::styled(l.to_string(), Style::default().fg(Color::Red))),
        ),
        Role::Assistant => lines.extend(render_markdown(&message.content)),
    }
    lines.push(Line::default());
    lines
}

/// Rows a set of lines occupies once wrapped to `width`
fn wrapped_height(lines: &[Line<'_>], width: u16) -> u16 {
    let width = width.max(1) as usize;
    let rows: usize = lines.iter().map(|l| l.width().max(1).div_ceil(width)).sum();
    rows.min(u16::MAX as usize) as u16
}

fn render_chat(frame: &mut Frame, area: Rect, app: &App) {
    let mut lines: Vec<Line<'static>> = app.messages.iter().flat_map(message_lines).collect();

    if let Some(pending) = &app.pending_user {
        lines.extend(message_lines(&Message::user(pending.clone())));
    }

    if app.is_busy && app.pending_user.is_some() {
        lines.push(role_header(Role::Assistant));
        if app.current_response.is_empty() {
            lines.push(Line::styled(
                "Thinking...",
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            ));
        } else {
            lines.extend(
                app.current_response
                    .lines()
                    .map(|l| Line::raw(l.to_string())),
            );
            lines.push(Line::styled(
                "▋",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::SLOW_BLINK),
            ));
        }
    }

    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    let total = wrapped_height(&lines, inner_width);
    let scroll = total
        .saturating_sub(inner_height)
        .saturating_sub(app.scroll_offset);

    let title = format!(" Chat [{}] ", app.persona.label());
    let chat = Paragraph::new(lines)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(app.persona.color())),
        )
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(frame: &mut Frame, area: Rect, app: &App) {
    let (title, shown, color) = match app.input_mode {
        InputMode::Insert => (
            " Message (Enter to send, Esc for normal mode) ",
            app.input.clone(),
            Color::White,
        ),
        InputMode::Normal => (
            " Normal (i to type, : for commands, q to quit) ",
            app.input.clone(),
            Color::DarkGray,
        ),
        InputMode::Command => (" Command ", format!(":{}", app.input), Color::Yellow),
        InputMode::KeyEntry => (
            " Google AI Studio API key ",
            "*".repeat(app.input.chars().count()),
            Color::Magenta,
        ),
    };

    let (visible, cursor) = input_tail(&shown, area.width.saturating_sub(2));
    let input = Paragraph::new(visible)
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(title),
        );
    frame.render_widget(input, area);

    if app.input_mode != InputMode::Normal && !app.show_help {
        let x = area.x.saturating_add(1).saturating_add(cursor);
        frame.set_cursor_position((x, area.y.saturating_add(1)));
    }
}

/// The end of `text` that fits in `width` columns with room for the cursor,
/// and the cursor column within it
fn input_tail(text: &str, width: u16) -> (String, u16) {
    let room = usize::from(width.saturating_sub(1));
    let count = text.chars().count();
    let tail: String = text.chars().skip(count.saturating_sub(room)).collect();
    let cursor = u16::try_from(tail.chars().count()).unwrap_or(u16::MAX);
    (tail, cursor)
}

fn render_status_bar(frame: &mut Frame, area: Rect, app: &App) {
    let (mode, mode_color) = match app.input_mode {
        InputMode::Insert => ("INSERT", Color::Green),
        InputMode::Normal => ("NORMAL", Color::Blue),
        InputMode::Command => ("COMMAND", Color::Yellow),
        InputMode::KeyEntry => ("API KEY", Color::Magenta),
    };

    let status = if let Some(status) = &app.status_message {
        status.clone()
    } else if app.is_busy {
        "Working...".to_string()
    } else {
        "Ready".to_string()
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", mode),
            Style::default()
                .bg(mode_color)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(
            format!(" {} ", app.persona.label()),
            Style::default()
                .bg(app.persona.color())
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::raw(status),
        Span::raw(" | "),
        Span::styled("Ctrl+C: quit", Style::default().fg(Color::DarkGray)),
    ]);

    frame.render_widget(
        Paragraph::new(line).style(Style::default().bg(Color::Black)),
        area,
    );
}

fn render_help(frame: &mut Frame, app: &App) {
    let key_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let heading = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);

    let mut lines = vec![Line::styled("Keys", heading)];
    for (key, desc) in KEY_HELP {
        lines.push(Line::from(vec![
            Span::styled(format!("  {:<18}", key), key_style),
            Span::raw(*desc),
        ]));
    }
    lines.push(Line::default());
    lines.push(Line::styled("Commands", heading));
    for (cmd, desc) in COMMAND_HELP {
        lines.push(Line::from(vec![
            Span::styled(format!("  {:<18}", cmd), key_style),
            Span::raw(*desc),
        ]));
    }

    let area = centered(frame.area(), 72, lines.len() as u16 + 2);
    let help = Paragraph::new(lines).block(
        Block::default()
            .title(" Help (any key to close) ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(app.persona.color())),
    );

    frame.render_widget(Clear, area);
    frame.render_widget(help, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
