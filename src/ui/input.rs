/// Keyboard input: drains pending terminal events once per frame and maps
/// fresh key presses to session commands.
///
/// Key repeat and release events are ignored; every command is
/// edge-triggered.

use std::time::Duration;

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Command {
    Run,
    Stop,
    Reset,
    Quit,
}

impl Command {
    pub fn from_key(key: &KeyEvent) -> Option<Command> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
        {
            return Some(Command::Quit);
        }
        match key.code {
            KeyCode::Char(' ') | KeyCode::Enter => Some(Command::Run),
            KeyCode::Char('s') | KeyCode::Char('S') => Some(Command::Stop),
            KeyCode::Char('r') | KeyCode::Char('R') => Some(Command::Reset),
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(Command::Quit),
            _ => None,
        }
    }
}

pub struct InputState {
    commands: Vec<Command>,
}

impl InputState {
    pub fn new() -> Self {
        InputState { commands: Vec::with_capacity(4) }
    }

    /// Read every pending terminal event without blocking.
    /// Call once per frame.
    pub fn drain_events(&mut self) -> &[Command] {
        self.commands.clear();
        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                if let Some(cmd) = Command::from_key(&key) {
                    self.commands.push(cmd);
                }
            }
        }
        &self.commands
    }
}
