//! Self-hosted store: a SQLite database for records and a directory for audio blobs.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use super::{blob_path, Gateway};
use crate::error::AppResult;
use crate::song::{Comment, NewComment, NewReaction, NewSong, Reaction, Song};

// No unique index on (song_id, session_id): the hosted store exposes none either.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS songs (
        id          TEXT PRIMARY KEY NOT NULL,
        title       TEXT NOT NULL,
        author_name TEXT NOT NULL,
        audio_url   TEXT NOT NULL,
        created_at  TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_songs_author ON songs(author_name)",
    "CREATE TABLE IF NOT EXISTS comments (
        id          TEXT PRIMARY KEY NOT NULL,
        song_id     TEXT NOT NULL REFERENCES songs(id) ON DELETE CASCADE,
        author_name TEXT NOT NULL,
        content     TEXT NOT NULL,
        created_at  TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_comments_song ON comments(song_id)",
    "CREATE TABLE IF NOT EXISTS reactions (
        id          TEXT PRIMARY KEY NOT NULL,
        song_id     TEXT NOT NULL REFERENCES songs(id) ON DELETE CASCADE,
        session_id  TEXT NOT NULL,
        created_at  TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_reactions_song_session ON reactions(song_id, session_id)",
];

#[derive(Debug, Clone)]
pub struct SqliteGateway {
    pool: SqlitePool,
    blob_dir: PathBuf,
}

impl SqliteGateway {
    pub async fn connect(db_path: &Path, blob_dir: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        tracing::info!("Opened local store {}", db_path.display());

        Self::with_pool(pool, blob_dir).await
    }

    /// Throwaway store living only as long as the gateway.
    pub async fn in_memory(blob_dir: &Path) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        // A memory database is per connection, so keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool, blob_dir).await
    }

    async fn with_pool(pool: SqlitePool, blob_dir: &Path) -> AppResult<Self> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        std::fs::create_dir_all(blob_dir)?;
        Ok(Self {
            pool,
            blob_dir: blob_dir.to_path_buf(),
        })
    }

    pub fn blob_dir(&self) -> &Path {
        &self.blob_dir
    }
}

/// Fixed-width UTC text so that string order matches time order.
fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[async_trait]
impl Gateway for SqliteGateway {
    async fn list_songs(&self) -> AppResult<Vec<Song>> {
        let songs = sqlx::query_as::<_, Song>(
            "SELECT id, title, author_name, audio_url, created_at FROM songs
             ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(songs)
    }

    async fn list_songs_by_author(&self, author_name: &str) -> AppResult<Vec<Song>> {
        let songs = sqlx::query_as::<_, Song>(
            "SELECT id, title, author_name, audio_url, created_at FROM songs
             WHERE author_name = ?1
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(author_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(songs)
    }

    async fn list_comments(&self, song_id: &str) -> AppResult<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            "SELECT id, song_id, author_name, content, created_at FROM comments
             WHERE song_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(song_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn insert_comment(&self, comment: &NewComment) -> AppResult<Comment> {
        let inserted = Comment {
            id: new_id(),
            song_id: comment.song_id.clone(),
            author_name: comment.author_name.clone(),
            content: comment.content.clone(),
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO comments (id, song_id, author_name, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&inserted.id)
        .bind(&inserted.song_id)
        .bind(&inserted.author_name)
        .bind(&inserted.content)
        .bind(timestamp(inserted.created_at))
        .execute(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn count_comments(&self, song_id: &str) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE song_id = ?1")
            .bind(song_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_reactions(&self, song_id: &str) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reactions WHERE song_id = ?1")
            .bind(song_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn find_reaction(
        &self,
        song_id: &str,
        session_id: &str,
    ) -> AppResult<Option<Reaction>> {
        let reaction = sqlx::query_as::<_, Reaction>(
            "SELECT id, song_id, session_id, created_at FROM reactions
             WHERE song_id = ?1 AND session_id = ?2
             LIMIT 1",
        )
        .bind(song_id)
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(reaction)
    }

    async fn insert_reaction(&self, reaction: &NewReaction) -> AppResult<Reaction> {
        let inserted = Reaction {
            id: new_id(),
            song_id: reaction.song_id.clone(),
            session_id: reaction.session_id.clone(),
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO reactions (id, song_id, session_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&inserted.id)
        .bind(&inserted.song_id)
        .bind(&inserted.session_id)
        .bind(timestamp(inserted.created_at))
        .execute(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn delete_reaction(&self, song_id: &str, session_id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM reactions WHERE song_id = ?1 AND session_id = ?2")
            .bind(song_id)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upload_audio_blob(&self, bytes: Vec<u8>, filename: &str) -> AppResult<String> {
        let path = self.blob_dir.join(blob_path(filename));
        tokio::fs::write(&path, &bytes).await?;
        tracing::info!("Stored {} ({} bytes) at {}", filename, bytes.len(), path.display());
        Ok(format!("file://{}", path.display()))
    }

    async fn insert_song(&self, song: &NewSong) -> AppResult<Song> {
        let inserted = Song {
            id: new_id(),
            title: song.title.clone(),
            author_name: song.author_name.clone(),
            audio_url: song.audio_url.clone(),
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO songs (id, title, author_name, audio_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&inserted.id)
        .bind(&inserted.title)
        .bind(&inserted.author_name)
        .bind(&inserted.audio_url)
        .bind(timestamp(inserted.created_at))
        .execute(&self.pool)
        .await?;
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn gateway() -> (SqliteGateway, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let gateway = SqliteGateway::in_memory(&tmp.path().join("blobs"))
            .await
            .unwrap();
        (gateway, tmp)
    }

    async fn song(gateway: &SqliteGateway, title: &str, author: &str) -> Song {
        gateway
            .insert_song(&NewSong {
                title: title.into(),
                author_name: author.into(),
                audio_url: format!("file:///{title}.mp3"),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        let (gateway, _tmp) = gateway().await;
        assert!(gateway.list_songs().await.unwrap().is_empty());
        assert!(gateway.list_songs_by_author("nobody").await.unwrap().is_empty());
        assert!(gateway.list_comments("missing").await.unwrap().is_empty());
        assert_eq!(gateway.count_reactions("missing").await.unwrap(), 0);
        assert!(gateway
            .find_reaction("missing", "session_1_x")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn songs_come_back_newest_first() {
        let (gateway, _tmp) = gateway().await;
        let first = song(&gateway, "First", "Ana").await;
        let second = song(&gateway, "Second", "Ana").await;

        let songs = gateway.list_songs().await.unwrap();
        assert_eq!(songs[0].id, second.id);
        assert_eq!(songs[1].id, first.id);
        assert_eq!(songs[0].created_at, second.created_at);
    }

    #[tokio::test]
    async fn comments_are_counted_and_ordered() {
        let (gateway, _tmp) = gateway().await;
        let song = song(&gateway, "Tune", "Ana").await;
        for content in ["one", "two"] {
            gateway
                .insert_comment(&NewComment {
                    song_id: song.id.clone(),
                    author_name: "Bo".into(),
                    content: content.into(),
                })
                .await
                .unwrap();
        }

        let comments = gateway.list_comments(&song.id).await.unwrap();
        let contents: Vec<&str> = comments.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["two", "one"]);
        assert_eq!(gateway.count_comments(&song.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn reactions_insert_find_and_delete() {
        let (gateway, _tmp) = gateway().await;
        let song = song(&gateway, "Tune", "Ana").await;
        let reaction = NewReaction::new(&song.id, "session_1_abc");

        gateway.insert_reaction(&reaction).await.unwrap();
        assert_eq!(gateway.count_reactions(&song.id).await.unwrap(), 1);
        let found = gateway
            .find_reaction(&song.id, "session_1_abc")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.session_id, "session_1_abc");
        assert!(gateway
            .find_reaction(&song.id, "session_2_other")
            .await
            .unwrap()
            .is_none());

        gateway
            .delete_reaction(&song.id, "session_1_abc")
            .await
            .unwrap();
        assert_eq!(gateway.count_reactions(&song.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reaction_for_unknown_song_is_an_error() {
        let (gateway, _tmp) = gateway().await;
        let result = gateway
            .insert_reaction(&NewReaction::new("missing", "session_1_abc"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn uploaded_blob_lands_in_blob_dir() {
        let (gateway, _tmp) = gateway().await;
        let url = gateway
            .upload_audio_blob(b"ID3".to_vec(), "demo.mp3")
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with(".mp3"));

        let stored: Vec<_> = std::fs::read_dir(gateway.blob_dir()).unwrap().collect();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn file_backed_store_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("store/toka.db");
        let blob_dir = tmp.path().join("blobs");
        {
            let gateway = SqliteGateway::connect(&db_path, &blob_dir).await.unwrap();
            song(&gateway, "Kept", "Ana").await;
        }
        let reopened = SqliteGateway::connect(&db_path, &blob_dir).await.unwrap();
        assert_eq!(reopened.list_songs().await.unwrap().len(), 1);
    }
}
