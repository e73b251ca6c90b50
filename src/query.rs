use super::MangadexError;
use crate::vocab::{ContentRating, Demographic, Order, PublicationStatus, TagMode};
use reqwest::IntoUrl;

/// Query parameters of the manga search endpoint.
///
/// Unset fields are left out of the request. Array parameters are sent with the
/// `name[]` convention the API expects.
#[derive(Debug, Clone, Default)]
pub struct MangaListParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub title: Option<String>,
    pub author_or_artist: Option<String>,
    pub authors: Vec<String>,
    pub artists: Vec<String>,
    pub year: Option<u32>,
    pub included_tags: Vec<String>,
    pub included_tags_mode: Option<TagMode>,
    pub excluded_tags: Vec<String>,
    pub excluded_tags_mode: Option<TagMode>,
    pub status: Vec<PublicationStatus>,
    pub original_language: Vec<String>,
    pub excluded_original_language: Vec<String>,
    pub available_translated_language: Vec<String>,
    pub publication_demographic: Vec<Demographic>,
    pub ids: Vec<String>,
    pub content_rating: Vec<ContentRating>,
    /// `YYYY-MM-DDTHH:MM:SS`, no timezone.
    pub created_at_since: Option<String>,
    pub updated_at_since: Option<String>,
    pub order: Vec<(String, Order)>,
    pub includes: Vec<String>,
    pub has_available_chapters: Option<bool>,
    pub group: Option<String>,
}

/// Query parameters of the manga feed endpoint.
#[derive(Debug, Clone, Default)]
pub struct ChapterFeedParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub translated_language: Vec<String>,
    pub original_language: Vec<String>,
    pub excluded_original_language: Vec<String>,
    pub content_rating: Vec<ContentRating>,
    pub excluded_groups: Vec<String>,
    pub excluded_uploaders: Vec<String>,
    pub include_future_updates: Option<bool>,
    pub created_at_since: Option<String>,
    pub updated_at_since: Option<String>,
    pub publish_at_since: Option<String>,
    pub order: Vec<(String, Order)>,
    pub includes: Vec<String>,
    pub include_empty_pages: Option<bool>,
    pub include_future_publish_at: Option<bool>,
    pub include_external_url: Option<bool>,
}

/// Aggregate (volumes and chapters) of one manga.
#[derive(Debug)]
pub struct MangaQuery {
    pub(crate) id: String,
    pub(crate) groups: Vec<String>,
    pub(crate) translated_language: Vec<String>,
}

#[derive(Debug, Default)]
struct Pairs(Vec<(String, String)>);

impl Pairs {
    fn one(&mut self, key: &str, value: Option<impl ToString>) -> &mut Self {
        if let Some(value) = value {
            self.0.push((key.to_string(), value.to_string()));
        }
        self
    }

    fn many<T: ToString>(&mut self, key: &str, values: &[T]) -> &mut Self {
        for value in values {
            self.0.push((format!("{key}[]"), value.to_string()));
        }
        self
    }

    fn flag(&mut self, key: &str, value: Option<bool>) -> &mut Self {
        self.one(key, value.map(|v| if v { "1" } else { "0" }))
    }

    fn order(&mut self, order: &[(String, Order)]) -> &mut Self {
        for (field, direction) in order {
            self.0.push((format!("order[{field}]"), direction.to_string()));
        }
        self
    }
}

impl MangaListParams {
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut pairs = Pairs::default();
        pairs
            .one("limit", self.limit)
            .one("offset", self.offset)
            .one("title", self.title.as_ref())
            .one("authorOrArtist", self.author_or_artist.as_ref())
            .many("authors", &self.authors)
            .many("artists", &self.artists)
            .one("year", self.year)
            .many("includedTags", &self.included_tags)
            .one("includedTagsMode", self.included_tags_mode)
            .many("excludedTags", &self.excluded_tags)
            .one("excludedTagsMode", self.excluded_tags_mode)
            .many("status", &self.status)
            .many("originalLanguage", &self.original_language)
            .many("excludedOriginalLanguage", &self.excluded_original_language)
            .many("availableTranslatedLanguage", &self.available_translated_language)
            .many("publicationDemographic", &self.publication_demographic)
            .many("ids", &self.ids)
            .many("contentRating", &self.content_rating)
            .one("createdAtSince", self.created_at_since.as_ref())
            .one("updatedAtSince", self.updated_at_since.as_ref())
            .order(&self.order)
            .many("includes", &self.includes)
            .one("hasAvailableChapters", self.has_available_chapters)
            .one("group", self.group.as_ref());
        pairs.0
    }
}

impl ChapterFeedParams {
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut pairs = Pairs::default();
        pairs
            .one("limit", self.limit)
            .one("offset", self.offset)
            .many("translatedLanguage", &self.translated_language)
            .many("originalLanguage", &self.original_language)
            .many("excludedOriginalLanguage", &self.excluded_original_language)
            .many("contentRating", &self.content_rating)
            .many("excludedGroups", &self.excluded_groups)
            .many("excludedUploaders", &self.excluded_uploaders)
            .flag("includeFutureUpdates", self.include_future_updates)
            .one("createdAtSince", self.created_at_since.as_ref())
            .one("updatedAtSince", self.updated_at_since.as_ref())
            .one("publishAtSince", self.publish_at_since.as_ref())
            .order(&self.order)
            .many("includes", &self.includes)
            .flag("includeEmptyPages", self.include_empty_pages)
            .flag("includeFuturePublishAt", self.include_future_publish_at)
            .flag("includeExternalUrl", self.include_external_url);
        pairs.0
    }
}

impl MangaQuery {
    pub fn new(id: impl ToString) -> Self {
        Self {
            id: id.to_string(),
            groups: Vec::new(),
            translated_language: Vec::new(),
        }
    }

    pub fn from_url(url: impl IntoUrl + Clone + ToString) -> Result<Self, MangadexError> {
        Ok(Self::new(manga_id_from_url(url)?))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn group(mut self, group: impl ToString) -> Self {
        self.groups.push(group.to_string());
        self
    }

    pub fn language(mut self, language: impl ToString) -> Self {
        self.translated_language.push(language.to_string());
        self
    }

    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut pairs = Pairs::default();
        pairs
            .many("groups", &self.groups)
            .many("translatedLanguage", &self.translated_language);
        pairs.0
    }
}

/// Extract the id from a `https://mangadex.org/title/{id}/...` link.
pub fn manga_id_from_url(url: impl IntoUrl + Clone + ToString) -> Result<String, MangadexError> {
    id_from_url(url, "title")
}

/// Extract the id from a `https://mangadex.org/chapter/{id}/...` link.
pub fn chapter_id_from_url(
    url: impl IntoUrl + Clone + ToString,
) -> Result<String, MangadexError> {
    id_from_url(url, "chapter")
}

fn id_from_url(url: impl IntoUrl + Clone + ToString, kind: &str) -> Result<String, MangadexError> {
    let url = url
        .clone()
        .into_url()
        .map_err(|_e| MangadexError::UrlParseError(url.to_string()))?;
    if !url.domain().is_some_and(|x| x == "mangadex.org") {
        return Err(MangadexError::UrlParseError(url.to_string()));
    }
    let mut segments = url
        .path_segments()
        .ok_or_else(|| MangadexError::UrlParseError(url.to_string()))?;
    match (segments.next(), segments.next()) {
        (Some(k), Some(id)) if k == kind && !id.is_empty() => Ok(id.to_string()),
        _ => Err(MangadexError::UrlParseError(url.to_string())),
    }
}
