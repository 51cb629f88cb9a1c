use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    prelude::*,
    widgets::{
        block::{Position, Title},
        Block, Borders, Clear, List, ListItem, Paragraph,
    },
};

use super::centered_rect;
use crate::app::Action;
use crate::error::{AppError, AppResult};
use crate::gateway::Gateway;
use crate::relative_time::format_relative;
use crate::song::{Comment, NewComment, Song, CONTENT_MAX_CHARS, NAME_MAX_CHARS};
use crate::text_box::{InputMode, TextBox};
use crate::theme::Palette;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommentField {
    Author,
    Content,
}

/// Comment popup for one song: the thread, newest first, and the new-comment form.
#[derive(Debug)]
pub struct CommentThread {
    card_index: usize,
    song_id: String,
    song_title: String,
    comments: Vec<Comment>,
    pub author_box: TextBox,
    pub content_box: TextBox,
    focus: CommentField,
}

impl CommentThread {
    pub fn new(card_index: usize, song: &Song) -> Self {
        let mut thread = Self {
            card_index,
            song_id: song.id.clone(),
            song_title: song.title.clone(),
            comments: Vec::new(),
            author_box: TextBox::new("Your name", NAME_MAX_CHARS),
            content_box: TextBox::new("Comment", CONTENT_MAX_CHARS),
            focus: CommentField::Author,
        };
        thread.author_box.set_input_mode(InputMode::Editing);
        thread
    }

    /// Index of the card that opened this thread.
    pub fn card_index(&self) -> usize {
        self.card_index
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// Fetches the thread. On failure the previously loaded comments stay.
    pub async fn load(&mut self, gateway: &dyn Gateway) -> AppResult<()> {
        match gateway.list_comments(&self.song_id).await {
            Ok(comments) => {
                self.comments = comments;
                Ok(())
            }
            Err(err) => {
                tracing::error!("Error fetching comments for {}: {}", self.song_id, err);
                Err(err)
            }
        }
    }

    pub fn validate(&self) -> AppResult<NewComment> {
        let author_name = self.author_box.trimmed();
        let content = self.content_box.trimmed();
        if author_name.is_empty() || content.is_empty() {
            return Err(AppError::validation("Please fill in all fields"));
        }
        if author_name.chars().count() > NAME_MAX_CHARS
            || content.chars().count() > CONTENT_MAX_CHARS
        {
            return Err(AppError::validation(format!(
                "Names are limited to {NAME_MAX_CHARS} characters and comments to {CONTENT_MAX_CHARS}"
            )));
        }
        Ok(NewComment {
            song_id: self.song_id.clone(),
            author_name: author_name.to_owned(),
            content: content.to_owned(),
        })
    }

    /// Validates and inserts the comment, then clears the form.
    /// The caller re-fetches the thread and bumps the card's counter.
    pub async fn submit(&mut self, gateway: &dyn Gateway) -> AppResult<Comment> {
        let new_comment = self.validate()?;
        let comment = gateway.insert_comment(&new_comment).await.map_err(|err| {
            tracing::error!("Error adding comment to {}: {}", self.song_id, err);
            err
        })?;
        self.author_box.clear_input();
        self.content_box.clear_input();
        Ok(comment)
    }

    pub fn handle_key(&mut self, key_event: KeyEvent) -> Option<Action> {
        match key_event.code {
            KeyCode::Esc => Some(Action::CloseComments),
            KeyCode::Enter => Some(Action::SubmitComment),
            KeyCode::Tab | KeyCode::BackTab => {
                self.switch_focus();
                None
            }
            code => {
                self.focused_box().handle_key(code);
                None
            }
        }
    }

    fn switch_focus(&mut self) {
        self.focus = match self.focus {
            CommentField::Author => CommentField::Content,
            CommentField::Content => CommentField::Author,
        };
        let (author_mode, content_mode) = match self.focus {
            CommentField::Author => (InputMode::Editing, InputMode::Normal),
            CommentField::Content => (InputMode::Normal, InputMode::Editing),
        };
        self.author_box.set_input_mode(author_mode);
        self.content_box.set_input_mode(content_mode);
    }

    fn focused_box(&mut self) -> &mut TextBox {
        match self.focus {
            CommentField::Author => &mut self.author_box,
            CommentField::Content => &mut self.content_box,
        }
    }

    pub fn render(&self, frame: &mut Frame, palette: Palette) {
        let area = centered_rect(frame.size(), 70, 80);
        let instructions = Title::from(Line::from(vec![
            " Close ".into(),
            "<Esc>".fg(palette.accent).bold(),
            " Next Field ".into(),
            "<Tab>".fg(palette.accent).bold(),
            " Post Comment ".into(),
            "<Enter> ".fg(palette.accent).bold(),
        ]));
        let block = Block::default()
            .borders(Borders::ALL)
            .style(Style::new().fg(palette.fg).bg(palette.bg))
            .title(Title::from(format!(" Comments: {} ", self.song_title).bold()).alignment(Alignment::Center))
            .title(
                instructions
                    .alignment(Alignment::Center)
                    .position(Position::Bottom),
            );

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),
                Constraint::Length(3),
                Constraint::Length(5),
            ])
            .split(block.inner(area));

        frame.render_widget(Clear, area);
        frame.render_widget(block, area);

        if self.comments.is_empty() {
            frame.render_widget(
                Paragraph::new("No comments yet. Be the first to comment!")
                    .style(Style::new().fg(palette.muted))
                    .alignment(Alignment::Center),
                layout[0],
            );
        } else {
            let now = Utc::now();
            let items: Vec<ListItem> = self
                .comments
                .iter()
                .map(|comment| {
                    ListItem::new(vec![
                        Line::from(vec![
                            comment.author_name.clone().fg(palette.accent).bold(),
                            "  ".into(),
                            format_relative(comment.created_at, now).fg(palette.muted),
                        ]),
                        Line::from(comment.content.clone().fg(palette.fg)),
                        Line::default(),
                    ])
                })
                .collect();
            frame.render_widget(List::new(items), layout[0]);
        }

        frame.render_widget(self.author_box.get_widget(palette), layout[1]);
        frame.render_widget(self.content_box.get_widget(palette), layout[2]);
    }
}
