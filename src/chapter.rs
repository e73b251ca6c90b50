use super::MangadexError;
use crate::client::{ApiResponse, Collection, DexClient, Entity, Relationship};
use crate::endpoints;
use crate::query::ChapterFeedParams;
use getset::Getters;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct ChapterService {
    client: DexClient,
}

#[derive(Debug, Clone, Deserialize, Getters)]
#[getset(get = "pub")]
pub struct Chapter {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    attributes: ChapterAttributes,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
#[getset(get = "pub")]
pub struct ChapterAttributes {
    title: Option<String>,
    volume: Option<String>,
    chapter: Option<String>,
    #[serde(default)]
    pages: u32,
    translated_language: String,
    uploader: Option<String>,
    external_url: Option<String>,
    #[serde(default)]
    version: u32,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    updated_at: String,
    #[serde(default)]
    publish_at: String,
    #[serde(default)]
    readable_at: String,
}

impl Chapter {
    pub fn title(&self) -> &str {
        self.attributes.title.as_deref().unwrap_or_default()
    }

    /// Chapter number as printed, `-` for oneshots.
    pub fn number(&self) -> &str {
        self.attributes.chapter.as_deref().unwrap_or("-")
    }

    /// Id of the scanlation group, when the relationship was returned.
    pub fn group_id(&self) -> Option<&str> {
        self.relationships
            .iter()
            .find(|r| r.kind() == "scanlation_group")
            .map(|r| r.id().as_str())
    }
}

/// Chapter ids of a manga the user has read.
#[derive(Debug, Clone, Deserialize, Getters)]
#[getset(get = "pub")]
pub struct ReadMarkers {
    result: String,
    data: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadMarkersUpdate<'a> {
    chapter_ids_read: &'a [String],
    chapter_ids_unread: &'a [String],
}

impl ChapterService {
    pub(crate) fn new(client: DexClient) -> Self {
        Self { client }
    }

    /// Chapters of a manga.
    pub async fn feed(
        &self,
        manga_id: &str,
        params: &ChapterFeedParams,
    ) -> Result<Collection<Chapter>, MangadexError> {
        self.feed_with_token(&CancellationToken::new(), manga_id, params)
            .await
    }

    #[instrument(skip(self, token))]
    pub async fn feed_with_token(
        &self,
        token: &CancellationToken,
        manga_id: &str,
        params: &ChapterFeedParams,
    ) -> Result<Collection<Chapter>, MangadexError> {
        let mut url = self.client.endpoint(endpoints::manga_feed(manga_id))?;
        url.query_pairs_mut().extend_pairs(params.to_query());
        self.client
            .request_and_decode_with_token(token, Method::GET, url, None)
            .await
    }

    pub async fn get(&self, id: &str, includes: &[&str]) -> Result<Chapter, MangadexError> {
        self.get_with_token(&CancellationToken::new(), id, includes)
            .await
    }

    #[instrument(skip(self, token))]
    pub async fn get_with_token(
        &self,
        token: &CancellationToken,
        id: &str,
        includes: &[&str],
    ) -> Result<Chapter, MangadexError> {
        let mut url = self.client.endpoint(endpoints::chapter(id))?;
        url.query_pairs_mut()
            .extend_pairs(includes.iter().map(|i| ("includes[]", *i)));
        let chapter: Entity<Chapter> = self
            .client
            .request_and_decode_with_token(token, Method::GET, url, None)
            .await?;
        Ok(chapter.into_data())
    }

    /// Needs an access token.
    pub async fn read_markers(&self, manga_id: &str) -> Result<ReadMarkers, MangadexError> {
        self.read_markers_with_token(&CancellationToken::new(), manga_id)
            .await
    }

    #[instrument(skip(self, token))]
    pub async fn read_markers_with_token(
        &self,
        token: &CancellationToken,
        manga_id: &str,
    ) -> Result<ReadMarkers, MangadexError> {
        let url = self.client.endpoint(endpoints::manga_read_markers(manga_id))?;
        self.client
            .request_and_decode_with_token(token, Method::GET, url, None)
            .await
    }

    /// Mark chapters of a manga as read or unread. Needs an access token.
    pub async fn set_read_markers(
        &self,
        manga_id: &str,
        read: &[String],
        unread: &[String],
    ) -> Result<ApiResponse, MangadexError> {
        self.set_read_markers_with_token(&CancellationToken::new(), manga_id, read, unread)
            .await
    }

    #[instrument(skip(self, token))]
    pub async fn set_read_markers_with_token(
        &self,
        token: &CancellationToken,
        manga_id: &str,
        read: &[String],
        unread: &[String],
    ) -> Result<ApiResponse, MangadexError> {
        let url = self.client.endpoint(endpoints::manga_read_markers(manga_id))?;
        let body = serde_json::to_vec(&ReadMarkersUpdate {
            chapter_ids_read: read,
            chapter_ids_unread: unread,
        })?;
        self.client
            .request_and_decode_with_token(token, Method::POST, url, Some(body))
            .await
    }
}
