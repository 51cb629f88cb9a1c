// Single-line input widget used by the upload and comment forms.
// Cursor handling follows the ratatui user_input example.

use crossterm::event::KeyCode;
use ratatui::{
    style::{Style, Stylize},
    text::Text,
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::theme::Palette;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum InputMode {
    Normal,
    Editing,
}

/// TextBox holds the state of the widget
#[derive(Debug, Clone)]
pub struct TextBox {
    /// Title of the box (displayed before text)
    title: String,
    /// Current value of the input box
    input: String,
    /// Position of cursor in the editor area, in chars.
    cursor_position: usize,
    /// Longest accepted input, in chars.
    max_chars: usize,
    pub input_mode: InputMode,
}

impl TextBox {
    pub fn new(title: &str, max_chars: usize) -> Self {
        Self {
            title: title.to_owned(),
            input: String::new(),
            cursor_position: 0,
            max_chars,
            input_mode: InputMode::Normal,
        }
    }

    pub fn move_cursor_left(&mut self) {
        let cursor_moved_left = self.cursor_position.saturating_sub(1);
        self.cursor_position = self.clamp_cursor(cursor_moved_left);
    }

    pub fn move_cursor_right(&mut self) {
        let cursor_moved_right = self.cursor_position.saturating_add(1);
        self.cursor_position = self.clamp_cursor(cursor_moved_right);
    }

    /// Inserts at the cursor. Input past `max_chars` is dropped.
    pub fn enter_char(&mut self, new_char: char) {
        if self.char_count() >= self.max_chars {
            return;
        }
        let index = self.byte_index();
        self.input.insert(index, new_char);
        self.move_cursor_right();
    }

    pub fn delete_char(&mut self) {
        if self.cursor_position == 0 {
            return;
        }
        // Rebuild from chars so multi-byte input never splits on a byte boundary.
        let current_index = self.cursor_position;
        let before_char_to_delete = self.input.chars().take(current_index - 1);
        let after_char_to_delete = self.input.chars().skip(current_index);
        self.input = before_char_to_delete.chain(after_char_to_delete).collect();
        self.move_cursor_left();
    }

    /// Applies an editing key. Returns false when the key is not an editing key.
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char(input_char) => self.enter_char(input_char),
            KeyCode::Backspace => self.delete_char(),
            KeyCode::Left => self.move_cursor_left(),
            KeyCode::Right => self.move_cursor_right(),
            _ => return false,
        }
        true
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor_position = 0;
    }

    pub fn set_input(&mut self, input: &str) {
        self.input = input.chars().take(self.max_chars).collect();
        self.cursor_position = self.char_count();
    }

    pub fn set_input_mode(&mut self, input_mode: InputMode) {
        self.input_mode = input_mode;
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn trimmed(&self) -> &str {
        self.input.trim()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn cursor_position(&self) -> usize {
        self.cursor_position
    }

    fn char_count(&self) -> usize {
        self.input.chars().count()
    }

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .map(|(index, _)| index)
            .nth(self.cursor_position)
            .unwrap_or(self.input.len())
    }

    fn clamp_cursor(&self, new_cursor_pos: usize) -> usize {
        new_cursor_pos.clamp(0, self.char_count())
    }

    pub fn get_widget(&self, palette: Palette) -> Paragraph<'_> {
        let text = Text::from(format!(" {}: {}", self.title, self.input));
        let block = Block::default().borders(Borders::ALL);
        let paragraph = match self.input_mode {
            InputMode::Normal => Paragraph::new(text).style(Style::new().fg(palette.fg)),
            InputMode::Editing => Paragraph::new(text.bold()).style(Style::new().fg(palette.accent)),
        };
        paragraph.left_aligned().wrap(Wrap { trim: false }).block(block)
    }
}
