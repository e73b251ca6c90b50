mod at_home;
mod chapter;
mod client;
mod config;
pub mod endpoints;
mod manga;
mod query;
mod service;
pub mod vocab;

pub use at_home::{
    AtHomeServerResponse, AtHomeService, ChapterPages, PageSession, Quality, TelemetryReport,
};
pub use chapter::{Chapter, ChapterAttributes, ChapterService, ReadMarkers};
pub use client::{ApiError, ApiResponse, Collection, DexClient, Entity, Relationship};
pub use config::{ClientConfig, ClientConfigBuilder, ClientConfigBuilderError};
pub use manga::{
    ChapterAggregate, GetChapters, LocalizedString, Manga, MangaAttributes, MangaService, Tag,
    TagAttributes, Volume,
};
pub use query::{chapter_id_from_url, manga_id_from_url, ChapterFeedParams, MangaListParams, MangaQuery};
pub use service::{ChapterDownloadRequest, ChapterDownloader};

#[derive(Debug, thiserror::Error)]
pub enum MangadexError {
    #[error(transparent)]
    RequestError(#[from] reqwest::Error),
    #[error(transparent)]
    DeserializeError(#[from] serde_json::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("invalid url '{0}'")]
    UrlParseError(String),
    #[error("mangadex api responded with status {status}{}", describe(.errors))]
    ResponseError { status: u16, errors: Vec<ApiError> },
    #[error("'{url}' responded with status {status}")]
    StatusError { url: String, status: u16 },
    #[error("request cancelled")]
    Cancelled,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

fn describe(errors: &[ApiError]) -> String {
    match errors.first() {
        Some(e) => format!(": {}", e.title()),
        None => String::new(),
    }
}
