use ratatui::style::Color;
use tokio::sync::watch;

use crate::error::AppResult;
use crate::storage::LocalStorage;

pub const THEME_KEY: &str = "toka_theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Colors applied to every widget for the active theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub fg: Color,
    pub bg: Color,
    pub muted: Color,
    pub accent: Color,
    pub liked: Color,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            Self::Light => Palette {
                fg: Color::Black,
                bg: Color::White,
                muted: Color::DarkGray,
                accent: Color::Blue,
                liked: Color::Red,
            },
            Self::Dark => Palette {
                fg: Color::White,
                bg: Color::Black,
                muted: Color::Gray,
                accent: Color::Yellow,
                liked: Color::LightRed,
            },
        }
    }
}

/// Reactive cell holding the current theme, persisted on every change.
#[derive(Debug)]
pub struct ThemeState {
    cell: watch::Sender<Theme>,
}

impl ThemeState {
    /// Reads the saved preference, defaulting to light.
    pub fn load(storage: &LocalStorage) -> Self {
        let theme = storage
            .get_item(THEME_KEY)
            .and_then(Theme::parse)
            .unwrap_or_default();
        let (cell, _) = watch::channel(theme);
        Self { cell }
    }

    pub fn get(&self) -> Theme {
        *self.cell.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Theme> {
        self.cell.subscribe()
    }

    pub fn toggle(&self, storage: &mut LocalStorage) -> AppResult<Theme> {
        let theme = self.get().toggled();
        storage.set_item(THEME_KEY, theme.as_str())?;
        self.cell.send_replace(theme);
        Ok(theme)
    }
}
