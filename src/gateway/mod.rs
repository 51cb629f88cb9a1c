//! Remote Data Gateway: the only code that talks to the store.
//!
//! Every list call returns an empty `Vec` when nothing matches; transport and
//! store failures come back as errors so callers can keep their prior state.

#[cfg(test)]
pub mod flaky;
pub mod rest;
pub mod sqlite;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::config::{Backend, Config};
use crate::error::{AppError, AppResult};
use crate::session::random_base36;
use crate::song::{Comment, NewComment, NewReaction, NewSong, Reaction, Song};

pub use rest::RestGateway;
pub use sqlite::SqliteGateway;

pub const SONGS_TABLE: &str = "songs";
pub const COMMENTS_TABLE: &str = "comments";
pub const REACTIONS_TABLE: &str = "reactions";
pub const AUDIO_BUCKET: &str = "songs";

#[async_trait]
pub trait Gateway: Send + Sync {
    /// All songs, newest first.
    async fn list_songs(&self) -> AppResult<Vec<Song>>;

    /// Songs whose author string equals `author_name` exactly, newest first.
    async fn list_songs_by_author(&self, author_name: &str) -> AppResult<Vec<Song>>;

    /// Comments on a song, newest first.
    async fn list_comments(&self, song_id: &str) -> AppResult<Vec<Comment>>;

    async fn insert_comment(&self, comment: &NewComment) -> AppResult<Comment>;

    async fn count_comments(&self, song_id: &str) -> AppResult<u64>;

    async fn count_reactions(&self, song_id: &str) -> AppResult<u64>;

    async fn find_reaction(&self, song_id: &str, session_id: &str)
        -> AppResult<Option<Reaction>>;

    async fn insert_reaction(&self, reaction: &NewReaction) -> AppResult<Reaction>;

    async fn delete_reaction(&self, song_id: &str, session_id: &str) -> AppResult<()>;

    /// Stores the audio bytes under a collision-free name and returns their public URL.
    async fn upload_audio_blob(&self, bytes: Vec<u8>, filename: &str) -> AppResult<String>;

    async fn insert_song(&self, song: &NewSong) -> AppResult<Song>;
}

/// Builds the gateway selected by the config.
pub async fn connect(config: &Config) -> AppResult<Arc<dyn Gateway>> {
    match config.store.backend {
        Backend::Rest => {
            let url = config
                .store
                .url
                .as_deref()
                .ok_or_else(|| AppError::Config("store.url is not set".into()))?;
            let anon_key = config
                .store
                .anon_key
                .as_deref()
                .ok_or_else(|| AppError::Config("store.anon_key is not set".into()))?;
            tracing::info!("Using hosted store at {}", url);
            Ok(Arc::new(RestGateway::new(url, anon_key, &config.store.bucket)?))
        }
        Backend::Sqlite => {
            let gateway =
                SqliteGateway::connect(config.sqlite_path(), config.blob_dir()).await?;
            Ok(Arc::new(gateway))
        }
    }
}

/// `<epoch-ms>_<random>.<ext>`, keeping the extension of the picked file.
pub fn blob_path(filename: &str) -> String {
    let stem = format!("{}_{}", Utc::now().timestamp_millis(), random_base36(9));
    match Path::new(filename).extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}
