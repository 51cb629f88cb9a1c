use std::collections::VecDeque;

use ratatui::{
    prelude::*,
    widgets::{
        block::{Position, Title},
        Block, Borders, Clear, Paragraph, Wrap,
    },
};

use super::centered_rect;
use crate::theme::Palette;

/// Blocking messages shown one at a time until dismissed.
#[derive(Debug, Default)]
pub struct NoticeQueue {
    pending: VecDeque<String>,
}

impl NoticeQueue {
    /// Queues a message unless the same one is already waiting.
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.pending.contains(&message) {
            self.pending.push_back(message);
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.pending.front().map(String::as_str)
    }

    pub fn dismiss(&mut self) -> Option<String> {
        self.pending.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn render(&self, frame: &mut Frame, palette: Palette) {
        let Some(message) = self.current() else {
            return;
        };
        let area = centered_rect(frame.size(), 50, 20);
        let instructions = Title::from(Line::from(vec![" OK ".into(), "<Enter> ".bold()]));
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::new().fg(palette.accent))
            .title(" Notice ".bold())
            .title(
                instructions
                    .alignment(Alignment::Center)
                    .position(Position::Bottom),
            );

        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(message.to_owned())
                .style(Style::new().fg(palette.fg).bg(palette.bg))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .block(block),
            area,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_show_in_order_without_duplicates() {
        let mut notices = NoticeQueue::default();
        notices.push("Failed to load songs. Please try again.");
        notices.push("Failed to load songs. Please try again.");
        notices.push("Please fill in all fields");

        assert_eq!(
            notices.dismiss().as_deref(),
            Some("Failed to load songs. Please try again.")
        );
        assert_eq!(notices.current(), Some("Please fill in all fields"));
        notices.dismiss();
        assert!(notices.is_empty());
        assert_eq!(notices.dismiss(), None);
    }
}
