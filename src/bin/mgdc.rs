use std::path::PathBuf;

use clap::{ArgAction, Parser};
use mangadex::{ChapterDownloadRequest, ChapterDownloader, DexClient};
use tower::{Service, ServiceExt};

#[derive(Debug, Parser)]
#[command(
    name = "mdgc",
    version,
    author,
    about = "CLI tool to download chapter from mangadex"
)]
struct Arguments {
    #[arg(help = "Chapter id or url")]
    chapter: String,
    #[arg(short, long, default_value = ".", help = "destination folder")]
    path: PathBuf,
    #[arg(
        short = 'r',
        long = "raw",
        action=ArgAction::SetFalse,
        default_value_t = true,
        help = "download uncompressed images"
    )]
    data_saver: bool,
    #[arg(long, help = "only use delivery nodes listening on port 443")]
    force_port_443: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Arguments::parse();
    let req = if args.chapter.contains("mangadex.org") {
        ChapterDownloadRequest::from_url(&args.chapter)?
    } else {
        ChapterDownloadRequest::new(&args.chapter)
    };
    let req = req
        .path(&args.path)
        .data_saver(args.data_saver)
        .force_port_443(args.force_port_443);

    let mut download_service = ChapterDownloader::new(DexClient::new()?);
    download_service.ready().await?.call(req).await?;
    Ok(())
}
