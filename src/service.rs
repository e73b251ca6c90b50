use super::MangadexError;
use crate::at_home::{PageSession, Quality};
use crate::client::DexClient;
use crate::query::chapter_id_from_url;
use futures::Future;
use reqwest::IntoUrl;
use std::fmt::Debug;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::pin::Pin;
use tower::Service;
use tracing::debug;
use tracing::debug_span;
use tracing::instrument;
use tracing::Instrument;

/// Downloads whole chapters through MangaDex@Home.
#[derive(Debug, Clone)]
pub struct ChapterDownloader {
    client: DexClient,
}

#[derive(Debug)]
pub struct ChapterDownloadRequest {
    pub(crate) id: String,
    pub(crate) quality: Quality,
    pub(crate) force_port_443: bool,
    pub(crate) path: PathBuf,
}

impl ChapterDownloadRequest {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            quality: Quality::DataSaver,
            force_port_443: false,
            path: PathBuf::from("."),
        }
    }

    pub fn from_url(url: impl IntoUrl + Clone + ToString) -> Result<Self, MangadexError> {
        Ok(Self::new(&chapter_id_from_url(url)?))
    }

    pub fn data_saver(mut self, data_saver: bool) -> Self {
        self.quality = if data_saver {
            Quality::DataSaver
        } else {
            Quality::Standard
        };
        self
    }

    pub fn quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn force_port_443(mut self, force_port_443: bool) -> Self {
        self.force_port_443 = force_port_443;
        self
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = path.as_ref().to_path_buf();
        self
    }
}

impl ChapterDownloader {
    pub fn new(client: DexClient) -> Self {
        Self { client }
    }
}

impl Service<ChapterDownloadRequest> for ChapterDownloader {
    type Response = ();
    type Error = MangadexError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ChapterDownloadRequest) -> Self::Future {
        let span = debug_span!("chapter_downloader");
        let at_home = self.client.at_home();
        let fut = async move {
            debug!(?req);
            let session = at_home
                .resolve(&req.id, req.quality, req.force_port_443)
                .await?;
            download_chapter(&session, &req.path).await?;
            Ok(())
        };

        Box::pin(fut.instrument(span))
    }
}

#[instrument(skip(session))]
async fn download_chapter(
    session: &PageSession,
    path: impl AsRef<Path> + Debug,
) -> Result<(), MangadexError> {
    async fn download_one(
        session: &PageSession,
        filename: &str,
        file: PathBuf,
    ) -> Result<(), MangadexError> {
        debug!("Download {}", file.display());
        let bytes = session.fetch_page(filename).await?;
        fs::write(file, &bytes)?;
        Ok(())
    }

    let path = path.as_ref();
    fs::create_dir_all(path)?;
    let width = session.pages().len().checked_ilog10().unwrap_or(0) + 1;
    let mut futures = Vec::new();
    for (i, x) in session.pages().iter().enumerate() {
        futures.push(download_one(
            session,
            x,
            path.join(page_file_name(i, x, width as usize)),
        ));
    }
    if let Some(e) = futures::future::join_all(futures)
        .await
        .into_iter()
        .find(|x| x.is_err())
    {
        e
    } else {
        Ok(())
    }
}

fn page_file_name(index: usize, filename: &str, width: usize) -> String {
    let ext = Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "jpg".to_string());
    format!("page_{index:0width$}.{ext}")
}
