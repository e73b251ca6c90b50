use super::MangadexError;
use crate::at_home::AtHomeService;
use crate::chapter::ChapterService;
use crate::config::ClientConfig;
use crate::manga::MangaService;
use getset::Getters;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::instrument;

/// Authenticated transport for the central mangadex API.
///
/// Cloning is cheap, all clones share one connection pool and one access token.
#[derive(Debug, Clone)]
pub struct DexClient {
    http: reqwest::Client,
    api_base: Url,
    report_url: Url,
    config: Arc<ClientConfig>,
    token: Arc<RwLock<Option<String>>>,
}

/// Bare `{"result": ...}` acknowledgement returned by mutating endpoints.
#[derive(Debug, Clone, Deserialize, Getters)]
#[getset(get = "pub")]
pub struct ApiResponse {
    result: String,
}

/// Paginated list of entities.
#[derive(Debug, Clone, Deserialize, Getters)]
#[getset(get = "pub")]
pub struct Collection<T> {
    result: String,
    data: Vec<T>,
    #[serde(default)]
    limit: u32,
    #[serde(default)]
    offset: u32,
    #[serde(default)]
    total: u32,
}

/// Single entity wrapped in the usual response envelope.
#[derive(Debug, Clone, Deserialize, Getters)]
#[getset(get = "pub")]
pub struct Entity<T> {
    result: String,
    data: T,
}

impl<T> Entity<T> {
    pub fn into_data(self) -> T {
        self.data
    }
}

#[derive(Debug, Clone, Deserialize, Getters)]
#[getset(get = "pub")]
pub struct Relationship {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    related: Option<String>,
    attributes: Option<serde_json::Value>,
}

/// One entry of the `errors` array the API sends with a non-2xx status.
#[derive(Debug, Clone, Deserialize, Getters)]
#[getset(get = "pub")]
pub struct ApiError {
    id: String,
    status: u16,
    title: String,
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ApiError>,
}

impl DexClient {
    pub fn new() -> Result<Self, MangadexError> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, MangadexError> {
        let mut api_base = Url::parse(config.api_base())
            .map_err(|_e| MangadexError::UrlParseError(config.api_base().clone()))?;
        if !api_base.path().ends_with('/') {
            let path = format!("{}/", api_base.path());
            api_base.set_path(&path);
        }
        let report_url = Url::parse(config.report_url())
            .map_err(|_e| MangadexError::UrlParseError(config.report_url().clone()))?;
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent().as_str())
            .build()?;

        Ok(Self {
            http,
            api_base,
            report_url,
            config: Arc::new(config),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Attach `token` as a bearer token to every following API request.
    pub async fn set_access_token(&self, token: impl ToString) {
        *self.token.write().await = Some(token.to_string());
    }

    pub async fn clear_access_token(&self) {
        *self.token.write().await = None;
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    pub fn at_home(&self) -> AtHomeService {
        AtHomeService::new(self.clone())
    }

    pub fn manga(&self) -> MangaService {
        MangaService::new(self.clone())
    }

    pub fn chapter(&self) -> ChapterService {
        ChapterService::new(self.clone())
    }

    /// Unauthenticated handle on the shared connection pool.
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn report_url(&self) -> &Url {
        &self.report_url
    }

    pub(crate) fn endpoint<I, S>(&self, segments: I) -> Result<Url, MangadexError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_e| MangadexError::UrlParseError(self.api_base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send one request to the central API and decode the JSON answer.
    ///
    /// Non-2xx answers become [`MangadexError::ResponseError`] carrying whatever
    /// error entries the body held.
    #[instrument(skip(self, url, body), fields(url = %url))]
    pub async fn request_and_decode<T>(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<T, MangadexError>
    where
        T: DeserializeOwned,
    {
        let mut request = self
            .http
            .request(method, url)
            .timeout(*self.config.request_timeout());
        if let Some(token) = self.token.read().await.as_deref() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(status = status.as_u16(), len = bytes.len());

        if !status.is_success() {
            let errors = serde_json::from_slice::<ErrorBody>(&bytes)
                .map(|b| b.errors)
                .unwrap_or_default();
            return Err(MangadexError::ResponseError {
                status: status.as_u16(),
                errors,
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// [`request_and_decode`](Self::request_and_decode) that gives up as soon
    /// as `token` is cancelled.
    pub async fn request_and_decode_with_token<T>(
        &self,
        token: &CancellationToken,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<T, MangadexError>
    where
        T: DeserializeOwned,
    {
        tokio::select! {
            _ = token.cancelled() => Err(MangadexError::Cancelled),
            res = self.request_and_decode(method, url, body) => res,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::ClientConfigBuilder;

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = DexClient::new().unwrap();
        let url = client.endpoint(["at-home", "server", "a b/c"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.mangadex.org/at-home/server/a%20b%2Fc"
        );
    }

    #[test]
    fn test_api_base_without_trailing_slash() {
        let config = ClientConfigBuilder::default()
            .api_base("http://127.0.0.1:3000/api")
            .build()
            .unwrap();
        let client = DexClient::with_config(config).unwrap();
        let url = client.endpoint(["manga", "x"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:3000/api/manga/x");
    }

    #[test]
    fn test_invalid_api_base() {
        let config = ClientConfigBuilder::default()
            .api_base("not a url")
            .build()
            .unwrap();
        assert!(matches!(
            DexClient::with_config(config),
            Err(MangadexError::UrlParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_access_token() {
        let client = DexClient::new().unwrap();
        assert!(!client.is_authenticated().await);
        client.clone().set_access_token("secret").await;
        assert!(client.is_authenticated().await);
        client.clear_access_token().await;
        assert!(!client.is_authenticated().await);
    }

    #[test]
    fn test_error_body_message() {
        let body = br#"{"result":"error","errors":[{"id":"1","status":404,"title":"Not found","detail":null}]}"#;
        let errors = serde_json::from_slice::<ErrorBody>(body).unwrap().errors;
        let err = MangadexError::ResponseError {
            status: 404,
            errors,
        };
        assert_eq!(
            err.to_string(),
            "mangadex api responded with status 404: Not found"
        );
    }
}
