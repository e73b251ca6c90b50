use super::MangadexError;
use crate::client::{ApiResponse, Collection, DexClient, Entity, Relationship};
use crate::endpoints;
use crate::query::{MangaListParams, MangaQuery};
use crate::vocab::{ContentRating, Demographic, PublicationStatus};
use getset::Getters;
use reqwest::Method;
use serde::Deserialize;
use serde::Deserializer;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Language code to text.
pub type LocalizedString = HashMap<String, String>;

#[derive(Debug, Clone)]
pub struct MangaService {
    client: DexClient,
}

#[derive(Debug, Clone, Deserialize, Getters)]
#[getset(get = "pub")]
pub struct Manga {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    attributes: MangaAttributes,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
#[getset(get = "pub")]
pub struct MangaAttributes {
    #[serde(deserialize_with = "deserialize_localized")]
    title: LocalizedString,
    #[serde(default)]
    alt_titles: Vec<LocalizedString>,
    #[serde(default, deserialize_with = "deserialize_localized")]
    description: LocalizedString,
    #[serde(default)]
    is_locked: bool,
    #[serde(default, deserialize_with = "deserialize_localized")]
    links: LocalizedString,
    original_language: String,
    last_volume: Option<String>,
    last_chapter: Option<String>,
    publication_demographic: Option<Demographic>,
    status: Option<PublicationStatus>,
    year: Option<u32>,
    content_rating: Option<ContentRating>,
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(default)]
    state: String,
    #[serde(default)]
    version: u32,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    updated_at: String,
}

#[derive(Debug, Clone, Deserialize, Getters)]
#[getset(get = "pub")]
pub struct Tag {
    id: String,
    attributes: TagAttributes,
}

#[derive(Debug, Clone, Deserialize, Getters)]
#[getset(get = "pub")]
pub struct TagAttributes {
    #[serde(deserialize_with = "deserialize_localized")]
    name: LocalizedString,
    #[serde(default)]
    group: String,
}

impl Manga {
    /// Title in `language`, falling back to the alternative titles.
    pub fn title(&self, language: &str) -> Option<&str> {
        self.attributes
            .title
            .get(language)
            .or_else(|| {
                self.attributes
                    .alt_titles
                    .iter()
                    .find_map(|t| t.get(language))
            })
            .map(String::as_str)
    }

    pub fn description(&self, language: &str) -> Option<&str> {
        self.attributes.description.get(language).map(String::as_str)
    }
}

#[derive(Debug, Deserialize, Getters)]
#[getset(get = "pub")]
pub struct Volume {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    volume: Option<f32>,
    count: usize,
    #[serde(deserialize_with = "deserialize_chapters")]
    chapters: HashMap<String, ChapterAggregate>,
}

#[derive(Debug, Deserialize, Getters, PartialEq, PartialOrd)]
#[getset(get = "pub")]
pub struct ChapterAggregate {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    chapter: Option<f32>,
    id: String,
    count: usize,
    others: Vec<String>,
}

fn deserialize_number_from_string<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: String = Deserialize::deserialize(deserializer)?;
    let num = raw.parse::<f32>().ok();
    Ok(num)
}

// The API sends an empty array instead of an empty object for several maps.
#[derive(Deserialize)]
#[serde(untagged)]
enum MapOrEmpty<T> {
    Map(HashMap<String, T>),
    #[allow(dead_code)]
    Empty([EmptyType; 0]),
}

#[derive(Deserialize)]
struct EmptyType;

impl<T> MapOrEmpty<T> {
    fn into_map(self) -> HashMap<String, T> {
        match self {
            MapOrEmpty::Map(map) => map,
            MapOrEmpty::Empty(_) => HashMap::new(),
        }
    }
}

fn deserialize_localized<'de, D>(deserializer: D) -> Result<LocalizedString, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<MapOrEmpty<String>> = Deserialize::deserialize(deserializer)?;
    Ok(raw.map(MapOrEmpty::into_map).unwrap_or_default())
}

fn deserialize_chapters<'de, D>(
    deserializer: D,
) -> Result<HashMap<String, ChapterAggregate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: MapOrEmpty<ChapterAggregate> = Deserialize::deserialize(deserializer)?;
    Ok(raw.into_map())
}

pub trait GetChapters<'a> {
    fn get_chapters(&self) -> Vec<&'a ChapterAggregate>;
}

impl<'a, T> GetChapters<'a> for T
where
    T: IntoIterator<Item = &'a Volume> + Clone,
{
    fn get_chapters(&self) -> Vec<&'a ChapterAggregate> {
        let mut chapters: Vec<&ChapterAggregate> = self
            .clone()
            .into_iter()
            .flat_map(|v| v.chapters().values())
            .collect();
        chapters.sort_by(|x, y| match (x.chapter, y.chapter) {
            (None, None) => std::cmp::Ordering::Equal,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(c1), Some(c2)) => c1.total_cmp(&c2),
        });
        chapters
    }
}

impl MangaService {
    pub(crate) fn new(client: DexClient) -> Self {
        Self { client }
    }

    /// Search manga.
    pub async fn list(&self, params: &MangaListParams) -> Result<Collection<Manga>, MangadexError> {
        self.list_with_token(&CancellationToken::new(), params).await
    }

    #[instrument(skip(self, token))]
    pub async fn list_with_token(
        &self,
        token: &CancellationToken,
        params: &MangaListParams,
    ) -> Result<Collection<Manga>, MangadexError> {
        let mut url = self.client.endpoint(endpoints::manga_list())?;
        url.query_pairs_mut().extend_pairs(params.to_query());
        self.client
            .request_and_decode_with_token(token, Method::GET, url, None)
            .await
    }

    pub async fn get(&self, id: &str, includes: &[&str]) -> Result<Manga, MangadexError> {
        self.get_with_token(&CancellationToken::new(), id, includes)
            .await
    }

    #[instrument(skip(self, token))]
    pub async fn get_with_token(
        &self,
        token: &CancellationToken,
        id: &str,
        includes: &[&str],
    ) -> Result<Manga, MangadexError> {
        let mut url = self.client.endpoint(endpoints::manga(id))?;
        url.query_pairs_mut()
            .extend_pairs(includes.iter().map(|i| ("includes[]", *i)));
        let manga: Entity<Manga> = self
            .client
            .request_and_decode_with_token(token, Method::GET, url, None)
            .await?;
        Ok(manga.into_data())
    }

    /// Volumes of a manga with one entry per chapter number.
    pub async fn aggregate(&self, query: &MangaQuery) -> Result<Vec<Volume>, MangadexError> {
        self.aggregate_with_token(&CancellationToken::new(), query)
            .await
    }

    #[instrument(skip(self, token))]
    pub async fn aggregate_with_token(
        &self,
        token: &CancellationToken,
        query: &MangaQuery,
    ) -> Result<Vec<Volume>, MangadexError> {
        #[derive(Debug, Deserialize)]
        struct ResponseBody {
            #[serde(deserialize_with = "deserialize_volumes")]
            volumes: HashMap<String, Volume>,
        }

        fn deserialize_volumes<'de, D>(deserializer: D) -> Result<HashMap<String, Volume>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw: MapOrEmpty<Volume> = Deserialize::deserialize(deserializer)?;
            Ok(raw.into_map())
        }

        let mut url = self.client.endpoint(endpoints::manga_aggregate(query.id()))?;
        url.query_pairs_mut().extend_pairs(query.to_query());
        let response: ResponseBody = self
            .client
            .request_and_decode_with_token(token, Method::GET, url, None)
            .await?;
        Ok(response.volumes.into_values().collect())
    }

    /// Whether the logged in user follows `id`. Needs an access token.
    pub async fn is_followed(&self, id: &str) -> Result<bool, MangadexError> {
        self.is_followed_with_token(&CancellationToken::new(), id)
            .await
    }

    /// A 404 from the follows endpoint means "not followed".
    #[instrument(skip(self, token))]
    pub async fn is_followed_with_token(
        &self,
        token: &CancellationToken,
        id: &str,
    ) -> Result<bool, MangadexError> {
        let url = self.client.endpoint(endpoints::user_follows_manga(id))?;
        match self
            .client
            .request_and_decode_with_token::<ApiResponse>(token, Method::GET, url, None)
            .await
        {
            Ok(_) => Ok(true),
            Err(MangadexError::ResponseError { status: 404, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Follow (`true`) or unfollow (`false`) a manga. Needs an access token.
    pub async fn set_follow(&self, id: &str, follow: bool) -> Result<ApiResponse, MangadexError> {
        self.set_follow_with_token(&CancellationToken::new(), id, follow)
            .await
    }

    #[instrument(skip(self, token))]
    pub async fn set_follow_with_token(
        &self,
        token: &CancellationToken,
        id: &str,
        follow: bool,
    ) -> Result<ApiResponse, MangadexError> {
        let url = self.client.endpoint(endpoints::manga_follow(id))?;
        let method = if follow { Method::POST } else { Method::DELETE };
        self.client
            .request_and_decode_with_token(token, method, url, None)
            .await
    }
}
