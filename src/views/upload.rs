use std::path::Path;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    prelude::*,
    widgets::{
        block::{Position, Title},
        Block, Borders, Clear,
    },
};

use super::centered_rect;
use crate::app::Action;
use crate::error::{AppError, AppResult};
use crate::gateway::Gateway;
use crate::song::{NewSong, Song, NAME_MAX_CHARS, TITLE_MAX_CHARS};
use crate::text_box::{InputMode, TextBox};
use crate::theme::Palette;

pub const ALLOWED_MEDIA_TYPES: [&str; 3] = ["audio/mpeg", "audio/mp3", "audio/wav"];
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

const PATH_MAX_CHARS: usize = 4096;

/// An audio file picked from disk.
#[derive(Debug, Clone)]
pub struct AudioFile {
    pub name: String,
    pub media_type: String,
    pub size: u64,
    pub bytes: Vec<u8>,
}

pub fn validate_audio_file(media_type: &str, size: u64) -> AppResult<()> {
    if !ALLOWED_MEDIA_TYPES.contains(&media_type) {
        return Err(AppError::validation("Please upload an MP3 or WAV file"));
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(AppError::validation("File size must be less than 50MB"));
    }
    Ok(())
}

pub fn validate_upload(title: &str, author_name: &str, has_file: bool) -> AppResult<()> {
    let (title, author_name) = (title.trim(), author_name.trim());
    if !has_file || title.is_empty() || author_name.is_empty() {
        return Err(AppError::validation(
            "Please fill in all fields and select an audio file",
        ));
    }
    if title.chars().count() > TITLE_MAX_CHARS || author_name.chars().count() > NAME_MAX_CHARS {
        return Err(AppError::validation(format!(
            "Titles are limited to {TITLE_MAX_CHARS} characters and names to {NAME_MAX_CHARS}"
        )));
    }
    Ok(())
}

/// Reads an audio file after checking its media type and size, so rejected files are never loaded.
pub async fn read_audio_file(path: &Path) -> AppResult<AudioFile> {
    let media_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_owned();
    let size = tokio::fs::metadata(path).await?.len();
    validate_audio_file(&media_type, size)?;

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let bytes = tokio::fs::read(path).await?;
    Ok(AudioFile {
        name,
        media_type,
        size,
        bytes,
    })
}

/// Stores the blob, then the song row pointing at its public URL.
/// A blob whose row insert fails is left behind.
pub async fn upload_song(
    gateway: &dyn Gateway,
    file: AudioFile,
    title: &str,
    author_name: &str,
) -> AppResult<Song> {
    let audio_url = gateway.upload_audio_blob(file.bytes, &file.name).await?;
    let song = gateway
        .insert_song(&NewSong {
            title: title.trim().to_owned(),
            author_name: author_name.trim().to_owned(),
            audio_url,
        })
        .await?;
    tracing::info!("Uploaded \"{}\" by {}", song.title, song.author_name);
    Ok(song)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadField {
    Title,
    Author,
    File,
}

/// The upload popup with its title, author and file path fields.
#[derive(Debug)]
pub struct UploadForm {
    pub title_box: TextBox,
    pub author_box: TextBox,
    pub file_box: TextBox,
    focus: UploadField,
}

impl Default for UploadForm {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadForm {
    pub fn new() -> Self {
        let mut form = Self {
            title_box: TextBox::new("Song title", TITLE_MAX_CHARS),
            author_box: TextBox::new("Artist name", NAME_MAX_CHARS),
            file_box: TextBox::new("Audio file (MP3 or WAV, max 50MB)", PATH_MAX_CHARS),
            focus: UploadField::Title,
        };
        form.apply_focus();
        form
    }

    pub async fn submit(&mut self, gateway: &dyn Gateway) -> AppResult<Song> {
        let path = self.file_box.trimmed();
        validate_upload(
            self.title_box.input(),
            self.author_box.input(),
            !path.is_empty(),
        )?;
        let file = read_audio_file(Path::new(path)).await?;
        let song = upload_song(gateway, file, self.title_box.input(), self.author_box.input())
            .await
            .map_err(|err| {
                tracing::error!("Error uploading song: {}", err);
                err
            })?;

        self.title_box.clear_input();
        self.author_box.clear_input();
        self.file_box.clear_input();
        Ok(song)
    }

    pub fn handle_key(&mut self, key_event: KeyEvent) -> Option<Action> {
        match key_event.code {
            KeyCode::Esc => Some(Action::CloseUpload),
            KeyCode::Enter => Some(Action::SubmitUpload),
            KeyCode::Tab => {
                self.focus = match self.focus {
                    UploadField::Title => UploadField::Author,
                    UploadField::Author => UploadField::File,
                    UploadField::File => UploadField::Title,
                };
                self.apply_focus();
                None
            }
            KeyCode::BackTab => {
                self.focus = match self.focus {
                    UploadField::Title => UploadField::File,
                    UploadField::Author => UploadField::Title,
                    UploadField::File => UploadField::Author,
                };
                self.apply_focus();
                None
            }
            code => {
                match self.focus {
                    UploadField::Title => self.title_box.handle_key(code),
                    UploadField::Author => self.author_box.handle_key(code),
                    UploadField::File => self.file_box.handle_key(code),
                };
                None
            }
        }
    }

    fn apply_focus(&mut self) {
        let mode = |field| {
            if self.focus == field {
                InputMode::Editing
            } else {
                InputMode::Normal
            }
        };
        let (title, author, file) = (
            mode(UploadField::Title),
            mode(UploadField::Author),
            mode(UploadField::File),
        );
        self.title_box.set_input_mode(title);
        self.author_box.set_input_mode(author);
        self.file_box.set_input_mode(file);
    }

    pub fn render(&self, frame: &mut Frame, palette: Palette) {
        let area = centered_rect(frame.size(), 60, 50);
        let instructions = Title::from(Line::from(vec![
            " Cancel ".into(),
            "<Esc>".fg(palette.accent).bold(),
            " Next Field ".into(),
            "<Tab>".fg(palette.accent).bold(),
            " Upload Song ".into(),
            "<Enter> ".fg(palette.accent).bold(),
        ]));
        let block = Block::default()
            .borders(Borders::ALL)
            .style(Style::new().fg(palette.fg).bg(palette.bg))
            .title(Title::from(" Upload a Song ".bold()).alignment(Alignment::Center))
            .title(
                instructions
                    .alignment(Alignment::Center)
                    .position(Position::Bottom),
            );

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(block.inner(area));

        frame.render_widget(Clear, area);
        frame.render_widget(block, area);
        frame.render_widget(self.title_box.get_widget(palette), layout[0]);
        frame.render_widget(self.author_box.get_widget(palette), layout[1]);
        frame.render_widget(self.file_box.get_widget(palette), layout[2]);
    }
}
