use super::MangadexError;
use crate::client::DexClient;
use crate::endpoints;
use bytes::{Bytes, BytesMut};
use getset::{CopyGetters, Getters};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::instrument;

/// Resolves chapters to a MangaDex@Home delivery node.
#[derive(Debug, Clone)]
pub struct AtHomeService {
    client: DexClient,
}

/// Which image set of a chapter to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Quality {
    #[default]
    #[serde(rename = "data")]
    Standard,
    DataSaver,
}

impl Quality {
    /// Path segment the delivery node serves this image set under.
    pub fn segment(&self) -> &'static str {
        match self {
            Quality::Standard => "data",
            Quality::DataSaver => "data-saver",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

impl FromStr for Quality {
    type Err = MangadexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data" | "standard" => Ok(Quality::Standard),
            "data-saver" | "dataSaver" => Ok(Quality::DataSaver),
            other => Err(MangadexError::InvalidArgument(format!(
                "unknown quality '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
#[getset(get = "pub")]
pub struct AtHomeServerResponse {
    result: String,
    base_url: String,
    chapter: ChapterPages,
}

#[derive(Debug, Clone, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
#[getset(get = "pub")]
pub struct ChapterPages {
    hash: String,
    data: Vec<String>,
    data_saver: Vec<String>,
}

impl ChapterPages {
    pub fn pages(&self, quality: Quality) -> &[String] {
        match quality {
            Quality::Standard => &self.data,
            Quality::DataSaver => &self.data_saver,
        }
    }
}

impl AtHomeService {
    pub(crate) fn new(client: DexClient) -> Self {
        Self { client }
    }

    /// Ask the API which delivery node serves `chapter_id`.
    ///
    /// `force_port_443` requests a node reachable on port 443, for clients behind
    /// firewalls that block other ports.
    pub async fn resolve(
        &self,
        chapter_id: &str,
        quality: Quality,
        force_port_443: bool,
    ) -> Result<PageSession, MangadexError> {
        self.resolve_with_token(&CancellationToken::new(), chapter_id, quality, force_port_443)
            .await
    }

    #[instrument(skip(self, token))]
    pub async fn resolve_with_token(
        &self,
        token: &CancellationToken,
        chapter_id: &str,
        quality: Quality,
        force_port_443: bool,
    ) -> Result<PageSession, MangadexError> {
        if chapter_id.trim().is_empty() {
            return Err(MangadexError::InvalidArgument(
                "chapter id must not be empty".to_string(),
            ));
        }

        let mut url = self.client.endpoint(endpoints::at_home_server(chapter_id))?;
        url.query_pairs_mut()
            .append_pair(endpoints::FORCE_PORT_443, &force_port_443.to_string());

        let response: AtHomeServerResponse = self
            .client
            .request_and_decode_with_token(token, Method::GET, url, None)
            .await?;
        debug!(base_url = %response.base_url, hash = %response.chapter.hash, "resolved delivery node");

        let reporter = Reporter {
            http: self.client.http().clone(),
            url: self.client.report_url().clone(),
            timeout: *self.client.config().report_timeout(),
        };
        Ok(PageSession::new(
            self.client.http().clone(),
            reporter,
            response,
            quality,
        ))
    }
}

/// Pages of one chapter on the delivery node it was resolved to.
///
/// The page list is fixed when the session is created. Every fetch carries its
/// own report state, so concurrent fetches on one session are fine.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct PageSession {
    http: reqwest::Client,
    reporter: Reporter,
    #[getset(get = "pub")]
    base_url: String,
    #[getset(get_copy = "pub")]
    quality: Quality,
    #[getset(get = "pub")]
    hash: String,
    #[getset(get = "pub")]
    pages: Vec<String>,
}

impl PageSession {
    fn new(
        http: reqwest::Client,
        reporter: Reporter,
        response: AtHomeServerResponse,
        quality: Quality,
    ) -> Self {
        let AtHomeServerResponse {
            base_url, chapter, ..
        } = response;
        let pages = chapter.pages(quality).to_vec();
        Self {
            http,
            reporter,
            base_url,
            quality,
            hash: chapter.hash,
            pages,
        }
    }

    /// Location of `filename` on the delivery node:
    /// `{base_url}/{quality segment}/{hash}/{filename}`.
    pub fn page_url(&self, filename: &str) -> String {
        [
            self.base_url.as_str(),
            self.quality.segment(),
            self.hash.as_str(),
            filename,
        ]
        .join("/")
    }

    /// [`page_url`](Self::page_url) of every page, in reading order.
    pub fn page_urls(&self) -> Vec<String> {
        self.pages.iter().map(|p| self.page_url(p)).collect()
    }

    /// [`fetch_page_with_token`](Self::fetch_page_with_token) without a
    /// cancellation token. Dropping the future still cancels the download.
    pub async fn fetch_page(&self, filename: &str) -> Result<Bytes, MangadexError> {
        self.fetch_page_with_token(filename, &CancellationToken::new())
            .await
    }

    /// Download one page from the delivery node.
    ///
    /// Exactly one telemetry report is scheduled per call, whatever the outcome,
    /// including when the returned future is dropped before it completes.
    /// The report runs detached and is not bound to `token`.
    #[instrument(skip(self, token))]
    pub async fn fetch_page_with_token(
        &self,
        filename: &str,
        token: &CancellationToken,
    ) -> Result<Bytes, MangadexError> {
        let url = self.page_url(filename);
        let mut pending = PendingReport::new(self.reporter.clone(), &url);

        let outcome = tokio::select! {
            _ = token.cancelled() => Err(MangadexError::Cancelled),
            res = download(&self.http, &url, &mut pending.report) => res,
        };

        let report = &pending.report;
        debug!(success = report.success, bytes = report.bytes, cached = report.cached);
        outcome
    }
}

/// Report state of one fetch. Sent when dropped, so a fetch abandoned halfway
/// is reported too.
struct PendingReport {
    reporter: Reporter,
    report: TelemetryReport,
    start: Instant,
}

impl PendingReport {
    fn new(reporter: Reporter, url: &str) -> Self {
        Self {
            reporter,
            report: TelemetryReport::new(url),
            start: Instant::now(),
        }
    }
}

impl Drop for PendingReport {
    fn drop(&mut self) {
        let report = std::mem::take(&mut self.report);
        self.reporter.dispatch(report, self.start);
    }
}

async fn download(
    http: &reqwest::Client,
    url: &str,
    report: &mut TelemetryReport,
) -> Result<Bytes, MangadexError> {
    let mut response = http.get(url).send().await?;
    let status = response.status();
    report.cached = response
        .headers()
        .get(endpoints::X_CACHE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with(endpoints::CACHE_HIT_PREFIX));

    let mut body = BytesMut::new();
    while let Some(chunk) = response.chunk().await? {
        body.extend_from_slice(&chunk);
        report.bytes = body.len();
    }

    report.success = status == StatusCode::OK;
    if !report.success {
        return Err(MangadexError::StatusError {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(body.freeze())
}

/// Outcome of one page fetch, as posted to the MangaDex@Home stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters, CopyGetters)]
pub struct TelemetryReport {
    #[getset(get = "pub")]
    url: String,
    #[getset(get_copy = "pub")]
    success: bool,
    #[getset(get_copy = "pub")]
    bytes: usize,
    /// Milliseconds between the start of the fetch and sending the report.
    #[getset(get_copy = "pub")]
    duration: u64,
    #[getset(get_copy = "pub")]
    cached: bool,
}

impl TelemetryReport {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            bytes: 0,
            duration: 0,
            cached: false,
        }
    }
}

#[derive(Debug, Clone)]
struct Reporter {
    http: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl Reporter {
    /// Send `report` in the background. Failures are only traced.
    fn dispatch(&self, mut report: TelemetryReport, start: Instant) {
        let Ok(runtime) = Handle::try_current() else {
            debug!(url = %report.url, "no runtime left, telemetry report dropped");
            return;
        };
        let reporter = self.clone();
        runtime.spawn(async move {
            report.duration = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            if let Err(e) = reporter.send(&report).await {
                debug!(error = %e, url = %report.url, "telemetry report dropped");
            }
        });
    }

    async fn send(&self, report: &TelemetryReport) -> Result<(), MangadexError> {
        let body = serde_json::to_vec(report)?;
        self.http
            .post(self.url.clone())
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
