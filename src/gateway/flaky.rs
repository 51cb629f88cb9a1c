//! Test gateway that forwards to a real one but fails the operations it is told to.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use super::Gateway;
use crate::error::{AppError, AppResult};
use crate::song::{Comment, NewComment, NewReaction, NewSong, Reaction, Song};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListSongs,
    ListSongsByAuthor,
    ListComments,
    InsertComment,
    CountComments,
    CountReactions,
    FindReaction,
    InsertReaction,
    DeleteReaction,
    UploadAudioBlob,
    InsertSong,
}

pub struct FlakyGateway<G> {
    inner: G,
    failing: Mutex<HashSet<Op>>,
}

impl<G: Gateway> FlakyGateway<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    pub fn fail(&self, op: Op) {
        self.failing.lock().unwrap().insert(op);
    }

    fn check(&self, op: Op) -> AppResult<()> {
        if self.failing.lock().unwrap().contains(&op) {
            return Err(AppError::Store {
                status: 503,
                message: format!("{op:?} unavailable"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<G: Gateway> Gateway for FlakyGateway<G> {
    async fn list_songs(&self) -> AppResult<Vec<Song>> {
        self.check(Op::ListSongs)?;
        self.inner.list_songs().await
    }

    async fn list_songs_by_author(&self, author_name: &str) -> AppResult<Vec<Song>> {
        self.check(Op::ListSongsByAuthor)?;
        self.inner.list_songs_by_author(author_name).await
    }

    async fn list_comments(&self, song_id: &str) -> AppResult<Vec<Comment>> {
        self.check(Op::ListComments)?;
        self.inner.list_comments(song_id).await
    }

    async fn insert_comment(&self, comment: &NewComment) -> AppResult<Comment> {
        self.check(Op::InsertComment)?;
        self.inner.insert_comment(comment).await
    }

    async fn count_comments(&self, song_id: &str) -> AppResult<u64> {
        self.check(Op::CountComments)?;
        self.inner.count_comments(song_id).await
    }

    async fn count_reactions(&self, song_id: &str) -> AppResult<u64> {
        self.check(Op::CountReactions)?;
        self.inner.count_reactions(song_id).await
    }

    async fn find_reaction(
        &self,
        song_id: &str,
        session_id: &str,
    ) -> AppResult<Option<Reaction>> {
        self.check(Op::FindReaction)?;
        self.inner.find_reaction(song_id, session_id).await
    }

    async fn insert_reaction(&self, reaction: &NewReaction) -> AppResult<Reaction> {
        self.check(Op::InsertReaction)?;
        self.inner.insert_reaction(reaction).await
    }

    async fn delete_reaction(&self, song_id: &str, session_id: &str) -> AppResult<()> {
        self.check(Op::DeleteReaction)?;
        self.inner.delete_reaction(song_id, session_id).await
    }

    async fn upload_audio_blob(&self, bytes: Vec<u8>, filename: &str) -> AppResult<String> {
        self.check(Op::UploadAudioBlob)?;
        self.inner.upload_audio_blob(bytes, filename).await
    }

    async fn insert_song(&self, song: &NewSong) -> AppResult<Song> {
        self.check(Op::InsertSong)?;
        self.inner.insert_song(song).await
    }
}
