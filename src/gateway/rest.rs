//! Hosted store client speaking the PostgREST query API and the storage object API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{blob_path, Gateway, AUDIO_BUCKET, COMMENTS_TABLE, REACTIONS_TABLE, SONGS_TABLE};
use crate::error::{AppError, AppResult};
use crate::song::{Comment, NewComment, NewReaction, NewSong, Reaction, Song};

const NEWEST_FIRST: &str = "created_at.desc";

#[derive(Debug, Clone)]
pub struct RestGateway {
    client: Client,
    base_url: String,
    bucket: String,
}

impl RestGateway {
    pub fn new(base_url: &str, anon_key: &str, bucket: &str) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(anon_key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {anon_key}"))?);

        let client = Client::builder().default_headers(headers).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            bucket: if bucket.is_empty() {
                AUDIO_BUCKET.to_owned()
            } else {
                bucket.to_owned()
            },
        })
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    pub fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path)
    }

    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        )
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, &str)],
        limit: Option<usize>,
    ) -> AppResult<Vec<T>> {
        let mut request = self
            .client
            .get(self.table_url(table))
            .query(&[("select", "*"), ("order", NEWEST_FIRST)])
            .query(&eq_filters(filters));
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit.to_string())]);
        }
        let rows = send(request).await?.json::<Vec<T>>().await?;
        Ok(rows)
    }

    async fn count(&self, table: &str, filters: &[(&str, &str)]) -> AppResult<u64> {
        let request = self
            .client
            .head(self.table_url(table))
            .header("Prefer", "count=exact")
            .query(&[("select", "id")])
            .query(&eq_filters(filters));
        let response = send(request).await?;
        response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| AppError::Store {
                status: response.status().as_u16(),
                message: format!("missing row count for {table}"),
            })
    }

    async fn insert<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> AppResult<T> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(body);
        let response = send(request).await?;
        let status = response.status().as_u16();
        response
            .json::<Vec<T>>()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Store {
                status,
                message: format!("insert into {table} returned no row"),
            })
    }

    async fn delete(&self, table: &str, filters: &[(&str, &str)]) -> AppResult<()> {
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&eq_filters(filters));
        send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl Gateway for RestGateway {
    async fn list_songs(&self) -> AppResult<Vec<Song>> {
        self.select(SONGS_TABLE, &[], None).await
    }

    async fn list_songs_by_author(&self, author_name: &str) -> AppResult<Vec<Song>> {
        self.select(SONGS_TABLE, &[("author_name", author_name)], None)
            .await
    }

    async fn list_comments(&self, song_id: &str) -> AppResult<Vec<Comment>> {
        self.select(COMMENTS_TABLE, &[("song_id", song_id)], None)
            .await
    }

    async fn insert_comment(&self, comment: &NewComment) -> AppResult<Comment> {
        self.insert(COMMENTS_TABLE, comment).await
    }

    async fn count_comments(&self, song_id: &str) -> AppResult<u64> {
        self.count(COMMENTS_TABLE, &[("song_id", song_id)]).await
    }

    async fn count_reactions(&self, song_id: &str) -> AppResult<u64> {
        self.count(REACTIONS_TABLE, &[("song_id", song_id)]).await
    }

    async fn find_reaction(
        &self,
        song_id: &str,
        session_id: &str,
    ) -> AppResult<Option<Reaction>> {
        let rows = self
            .select(
                REACTIONS_TABLE,
                &[("song_id", song_id), ("session_id", session_id)],
                Some(1),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_reaction(&self, reaction: &NewReaction) -> AppResult<Reaction> {
        self.insert(REACTIONS_TABLE, reaction).await
    }

    async fn delete_reaction(&self, song_id: &str, session_id: &str) -> AppResult<()> {
        self.delete(
            REACTIONS_TABLE,
            &[("song_id", song_id), ("session_id", session_id)],
        )
        .await
    }

    async fn upload_audio_blob(&self, bytes: Vec<u8>, filename: &str) -> AppResult<String> {
        let path = blob_path(filename);
        let content_type = mime_guess::from_path(filename).first_or_octet_stream();
        tracing::info!("Uploading {} ({} bytes) as {}", filename, bytes.len(), path);

        let request = self
            .client
            .post(self.object_url(&path))
            .header(CONTENT_TYPE, content_type.as_ref())
            .header("x-upsert", "false")
            .body(bytes);
        send(request).await?;
        Ok(self.public_url(&path))
    }

    async fn insert_song(&self, song: &NewSong) -> AppResult<Song> {
        self.insert(SONGS_TABLE, song).await
    }
}

fn header_value(value: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|err| AppError::Config(format!("invalid anon key: {err}")))
}

fn eq_filters(filters: &[(&str, &str)]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|(column, value)| ((*column).to_owned(), format!("eq.{value}")))
        .collect()
}

/// Sends the request, turning non-success statuses into store errors.
async fn send(request: RequestBuilder) -> AppResult<Response> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    tracing::error!("Store request failed with {}: {}", status, message);
    Err(AppError::Store {
        status: status.as_u16(),
        message,
    })
}

/// Total from a `Content-Range` header such as `0-9/42` or `*/0`.
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> RestGateway {
        RestGateway::new("https://demo.supabase.co/", "anon-key", "songs").unwrap()
    }

    #[test]
    fn urls_follow_store_layout() {
        let gateway = gateway();
        assert_eq!(
            gateway.table_url("songs"),
            "https://demo.supabase.co/rest/v1/songs"
        );
        assert_eq!(
            gateway.object_url("1_abc.mp3"),
            "https://demo.supabase.co/storage/v1/object/songs/1_abc.mp3"
        );
        assert_eq!(
            gateway.public_url("1_abc.mp3"),
            "https://demo.supabase.co/storage/v1/object/public/songs/1_abc.mp3"
        );
    }

    #[test]
    fn empty_bucket_falls_back_to_songs() {
        let gateway = RestGateway::new("https://demo.supabase.co", "k", "").unwrap();
        assert!(gateway.public_url("x.wav").contains("/public/songs/"));
    }

    #[test]
    fn invalid_key_is_a_config_error() {
        let err = RestGateway::new("https://demo.supabase.co", "bad\nkey", "songs").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn filters_use_exact_match() {
        let filters = eq_filters(&[("author_name", "Jane Doe"), ("song_id", "42")]);
        assert_eq!(
            filters,
            vec![
                ("author_name".to_string(), "eq.Jane Doe".to_string()),
                ("song_id".to_string(), "eq.42".to_string()),
            ]
        );
    }

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_content_range("0-9/42"), Some(42));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("*/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }
}
