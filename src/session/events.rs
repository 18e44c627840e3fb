// ABOUTME: Key handling for the monitoring loop: decides which key events end the session

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuitKey(char);

impl Default for QuitKey {
    fn default() -> Self {
        Self('q')
    }
}

impl QuitKey {
    pub const fn new(key: char) -> Self {
        Self(key)
    }

    pub const fn key(self) -> char {
        self.0
    }

    /// The configured key, `Esc`, or `Ctrl-C` (raw mode swallows SIGINT).
    pub fn is_quit(self, key_event: &KeyEvent) -> bool {
        if key_event.kind == KeyEventKind::Release {
            return false;
        }

        match key_event.code {
            KeyCode::Char('c') if key_event.modifiers.contains(KeyModifiers::CONTROL) => true,
            KeyCode::Char(c) => {
                !key_event.modifiers.contains(KeyModifiers::CONTROL)
                    && c.eq_ignore_ascii_case(&self.0)
            }
            KeyCode::Esc => true,
            _ => false,
        }
    }
}
