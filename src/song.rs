// Records owned by the remote store. The client only keeps transient copies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TITLE_MAX_CHARS: usize = 100;
pub const NAME_MAX_CHARS: usize = 50;
pub const CONTENT_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Song {
    pub id: String,
    pub title: String,
    /// Used verbatim as the profile routing key.
    pub author_name: String,
    pub audio_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: String,
    pub song_id: String,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reaction {
    pub id: String,
    pub song_id: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSong {
    pub title: String,
    pub author_name: String,
    pub audio_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewComment {
    pub song_id: String,
    pub author_name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewReaction {
    pub song_id: String,
    pub session_id: String,
}

impl NewReaction {
    pub fn new(song_id: &str, session_id: &str) -> Self {
        Self {
            song_id: song_id.to_owned(),
            session_id: session_id.to_owned(),
        }
    }
}
