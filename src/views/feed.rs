use crossterm::event::{KeyCode, KeyEvent};
use futures::future::join_all;
use ratatui::{prelude::*, widgets::Paragraph};

use super::card::SongCard;
use crate::app::Action;
use crate::error::{AppError, AppResult};
use crate::gateway::Gateway;
use crate::router::{profile_path, Route};
use crate::theme::Palette;

const CARD_HEIGHT: u16 = 5;

/// Why a list load failed: the song list itself, or one of the cards' counters.
#[derive(Debug)]
pub enum LoadError {
    Songs(AppError),
    Details(AppError),
}

impl LoadError {
    pub fn notice(&self) -> String {
        match self {
            Self::Songs(err) => err.notice("load songs"),
            Self::Details(err) => err.notice("load song details"),
        }
    }
}

/// The song list behind both the feed and a profile page.
#[derive(Debug)]
pub struct SongList {
    route: Route,
    cards: Vec<SongCard>,
    selected: usize,
    loading: bool,
}

impl SongList {
    pub fn new(route: Route) -> Self {
        Self {
            route,
            cards: Vec::new(),
            selected: 0,
            loading: true,
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn cards(&self) -> &[SongCard] {
        &self.cards
    }

    pub fn card_mut(&mut self, index: usize) -> Option<&mut SongCard> {
        self.cards.get_mut(index)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn selected(&self) -> Option<usize> {
        (!self.cards.is_empty()).then_some(self.selected)
    }

    /// Fetches the songs for this route and mounts every card concurrently.
    /// If the list itself cannot be fetched the previous cards stay.
    pub async fn load(&mut self, gateway: &dyn Gateway, session_id: &str) -> Result<(), LoadError> {
        let songs = match &self.route {
            Route::Feed => gateway.list_songs().await,
            Route::Profile { author_name } => gateway.list_songs_by_author(author_name).await,
        };
        self.loading = false;
        let songs = songs.map_err(|err| {
            tracing::error!("Error fetching songs for {:?}: {}", self.route, err);
            LoadError::Songs(err)
        })?;

        let mut cards: Vec<SongCard> = songs.into_iter().map(SongCard::new).collect();
        let mounted = join_all(cards.iter_mut().map(|card| card.mount(gateway, session_id))).await;
        self.cards = cards;
        self.selected = self.selected.min(self.cards.len().saturating_sub(1));
        tracing::debug!("Loaded {} songs for {:?}", self.cards.len(), self.route);

        mounted
            .into_iter()
            .collect::<AppResult<()>>()
            .map_err(LoadError::Details)
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.cards.len() {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn handle_key(&mut self, key_event: KeyEvent) -> Option<Action> {
        match key_event.code {
            KeyCode::Down | KeyCode::Char('j') => {
                self.select_next();
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.select_previous();
                None
            }
            KeyCode::Char('l') => self.selected().map(Action::ToggleLike),
            KeyCode::Char('c') | KeyCode::Enter => self.selected().map(Action::OpenComments),
            KeyCode::Char('p') => self.selected().map(Action::PlayAudio),
            KeyCode::Char('o') => self
                .selected()
                .map(|index| Action::Navigate(profile_path(&self.cards[index].song.author_name))),
            _ => None,
        }
    }

    fn heading(&self) -> Vec<Line<'static>> {
        match &self.route {
            Route::Feed => vec![Line::from("Discover Music".bold())],
            Route::Profile { author_name } => {
                let count = self.cards.len();
                let noun = if count == 1 { "song" } else { "songs" };
                vec![
                    Line::from(author_name.clone().bold()),
                    Line::from(format!("{count} {noun}")),
                ]
            }
        }
    }

    fn placeholder(&self) -> Option<&'static str> {
        match (&self.route, self.loading, self.cards.is_empty()) {
            (Route::Feed, true, _) => Some("Loading songs..."),
            (Route::Profile { .. }, true, _) => Some("Loading profile..."),
            (Route::Feed, false, true) => Some("No songs yet. Be the first to upload!"),
            (Route::Profile { .. }, false, true) => Some("No songs uploaded yet."),
            (_, false, false) => None,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, palette: Palette) {
        let heading = self.heading();
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(heading.len() as u16 + 1),
                Constraint::Min(0),
            ])
            .split(area);
        frame.render_widget(
            Paragraph::new(heading).style(Style::new().fg(palette.fg)),
            layout[0],
        );

        if let Some(placeholder) = self.placeholder() {
            frame.render_widget(
                Paragraph::new(placeholder)
                    .style(Style::new().fg(palette.muted))
                    .alignment(Alignment::Center),
                layout[1],
            );
            return;
        }

        let visible = usize::from((layout[1].height / CARD_HEIGHT).max(1));
        let offset = (self.selected + 1).saturating_sub(visible);
        let slots = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Length(CARD_HEIGHT); visible])
            .split(layout[1]);

        for (slot, (index, card)) in slots
            .iter()
            .zip(self.cards.iter().enumerate().skip(offset))
        {
            card.render(frame, *slot, palette, index == self.selected);
        }
    }
}
