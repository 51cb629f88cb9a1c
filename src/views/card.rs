use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

use crate::error::{AppError, AppResult};
use crate::gateway::Gateway;
use crate::song::{NewReaction, Song};
use crate::theme::Palette;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeState {
    NotLiked,
    Liked,
}

/// One feed item: the song plus its like and comment counters.
#[derive(Debug, Clone)]
pub struct SongCard {
    pub song: Song,
    likes: u64,
    comment_count: u64,
    like_state: LikeState,
}

impl SongCard {
    pub fn new(song: Song) -> Self {
        Self {
            song,
            likes: 0,
            comment_count: 0,
            like_state: LikeState::NotLiked,
        }
    }

    pub fn likes(&self) -> u64 {
        self.likes
    }

    pub fn comment_count(&self) -> u64 {
        self.comment_count
    }

    pub fn like_state(&self) -> LikeState {
        self.like_state
    }

    /// Fetches like count, comment count and like-state concurrently.
    /// Each successful read is applied even if another one failed; the first failure is returned.
    pub async fn mount(&mut self, gateway: &dyn Gateway, session_id: &str) -> AppResult<()> {
        let song_id = self.song.id.as_str();
        let (likes, comments, existing) = tokio::join!(
            gateway.count_reactions(song_id),
            gateway.count_comments(song_id),
            gateway.find_reaction(song_id, session_id),
        );

        let mut first_error: Option<AppError> = None;
        match likes {
            Ok(likes) => self.likes = likes,
            Err(err) => {
                tracing::error!("Error fetching likes for {}: {}", self.song.id, err);
                first_error.get_or_insert(err);
            }
        }
        match comments {
            Ok(count) => self.comment_count = count,
            Err(err) => {
                tracing::error!("Error fetching comment count for {}: {}", self.song.id, err);
                first_error.get_or_insert(err);
            }
        }
        match existing {
            Ok(reaction) => {
                self.like_state = if reaction.is_some() {
                    LikeState::Liked
                } else {
                    LikeState::NotLiked
                }
            }
            Err(err) => {
                tracing::error!("Error checking like status for {}: {}", self.song.id, err);
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Likes or unlikes the song for this session. Counters move optimistically by one;
    /// on failure nothing changes.
    pub async fn toggle_like(&mut self, gateway: &dyn Gateway, session_id: &str) -> AppResult<()> {
        match self.like_state {
            LikeState::Liked => {
                gateway.delete_reaction(&self.song.id, session_id).await?;
                self.likes = self.likes.saturating_sub(1);
                self.like_state = LikeState::NotLiked;
            }
            LikeState::NotLiked => {
                let existing = gateway.find_reaction(&self.song.id, session_id).await?;
                if existing.is_none() {
                    gateway
                        .insert_reaction(&NewReaction::new(&self.song.id, session_id))
                        .await?;
                    self.likes += 1;
                }
                self.like_state = LikeState::Liked;
            }
        }
        Ok(())
    }

    pub fn comment_added(&mut self) {
        self.comment_count += 1;
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, palette: Palette, selected: bool) {
        let border_style = if selected {
            Style::new().fg(palette.accent).bold()
        } else {
            Style::new().fg(palette.muted)
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(format!(" {} ", self.song.title).bold());

        let heart = match self.like_state {
            LikeState::Liked => format!("♥ {}", self.likes).fg(palette.liked).bold(),
            LikeState::NotLiked => format!("♡ {}", self.likes).fg(palette.fg),
        };
        let lines = vec![
            Line::from(vec![
                "by ".fg(palette.muted),
                self.song.author_name.clone().fg(palette.accent).underlined(),
            ]),
            Line::from(vec!["▶ ".fg(palette.fg), self.song.audio_url.clone().fg(palette.muted)]),
            Line::from(vec![
                heart,
                "   ".into(),
                format!("💬 {}", self.comment_count).fg(palette.fg),
            ]),
        ];

        frame.render_widget(
            Paragraph::new(lines)
                .style(Style::new().bg(palette.bg))
                .block(block),
            area,
        );
    }
}
