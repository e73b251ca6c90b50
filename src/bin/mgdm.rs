use std::fs;
use std::io::{self, Write};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser};
use mangadex::{
    ChapterAggregate, ChapterDownloadRequest, ChapterDownloader, DexClient, GetChapters,
    MangaQuery, Quality, Volume,
};
use tower::{Service, ServiceBuilder, ServiceExt};
use tracing::{info, warn};
use zip::{write::FileOptions, ZipWriter};

#[derive(Debug, Parser)]
#[command(
    name = "mgdm",
    version,
    author,
    about = "Download a manga, or part of it, through MangaDex@Home"
)]
struct Cli {
    #[arg(help = "manga id or mangadex.org title link")]
    manga: String,
    #[arg(short, long, default_value = "en", help = "translation language")]
    language: String,
    #[arg(short, long = "group", help = "only chapters of this scanlation group")]
    groups: Vec<String>,
    #[command(flatten)]
    pick: PickArgs,
    #[arg(short = 'p', long = "path", default_value = ".", help = "destination folder")]
    out_dir: PathBuf,
    #[arg(short, long, help = "download original images instead of data-saver ones")]
    raw: bool,
    #[arg(long, help = "only use delivery nodes listening on port 443")]
    force_port_443: bool,
    #[arg(long, default_value_t = 2, help = "seconds to wait between chapters")]
    delay: u64,
    #[arg(long = "make-cbz", help = "pack the chapters into manga.cbz")]
    cbz: bool,
}

#[derive(Debug, Args)]
struct PickArgs {
    #[arg(
        short,
        long,
        conflicts_with_all = ["volumes", "min_chapter", "max_chapter", "min_volume", "max_volume"]
    )]
    chapters: Vec<f32>,
    #[arg(
        short,
        long,
        conflicts_with_all = ["min_chapter", "max_chapter", "min_volume", "max_volume"]
    )]
    volumes: Vec<f32>,
    #[arg(long, conflicts_with_all = ["min_volume", "max_volume"])]
    min_chapter: Option<f32>,
    #[arg(long, conflicts_with_all = ["min_volume", "max_volume"])]
    max_chapter: Option<f32>,
    #[arg(long)]
    min_volume: Option<f32>,
    #[arg(long)]
    max_volume: Option<f32>,
}

/// Which chapters of the aggregate to download. Unnumbered chapters and
/// volumes count as -1 in ranges.
#[derive(Debug, Clone, PartialEq)]
enum Selection {
    Chapters(Vec<f32>),
    Volumes(Vec<f32>),
    ChapterRange(RangeInclusive<f32>),
    VolumeRange(RangeInclusive<f32>),
}

impl From<&PickArgs> for Selection {
    fn from(pick: &PickArgs) -> Self {
        fn range(min: Option<f32>, max: Option<f32>) -> RangeInclusive<f32> {
            min.unwrap_or(f32::NEG_INFINITY)..=max.unwrap_or(f32::INFINITY)
        }

        if !pick.chapters.is_empty() {
            Selection::Chapters(pick.chapters.clone())
        } else if !pick.volumes.is_empty() {
            Selection::Volumes(pick.volumes.clone())
        } else if pick.min_chapter.is_some() || pick.max_chapter.is_some() {
            Selection::ChapterRange(range(pick.min_chapter, pick.max_chapter))
        } else {
            Selection::VolumeRange(range(pick.min_volume, pick.max_volume))
        }
    }
}

impl Selection {
    fn pick<'a>(&self, volumes: &'a [Volume]) -> Vec<&'a ChapterAggregate> {
        let number = |n: &Option<f32>| n.unwrap_or(-1.0);
        match self {
            Selection::Volumes(wanted) => GetChapters::get_chapters(
                &volumes
                    .iter()
                    .filter(|v| v.volume().is_some_and(|n| wanted.contains(&n))),
            ),
            Selection::VolumeRange(range) => GetChapters::get_chapters(
                &volumes
                    .iter()
                    .filter(|v| range.contains(&number(v.volume()))),
            ),
            Selection::Chapters(wanted) => GetChapters::get_chapters(&volumes)
                .into_iter()
                .filter(|c| c.chapter().is_some_and(|n| wanted.contains(&n)))
                .collect(),
            Selection::ChapterRange(range) => GetChapters::get_chapters(&volumes)
                .into_iter()
                .filter(|c| range.contains(&number(c.chapter())))
                .collect(),
        }
    }
}

/// Zero padding wide enough for the highest chapter number.
fn number_width(chapters: &[&ChapterAggregate]) -> usize {
    chapters
        .iter()
        .filter_map(|c| *c.chapter())
        .fold(0.0_f32, f32::max)
        .max(1.0)
        .log10()
        .floor() as usize
        + 1
}

fn chapter_dir_name(chapter: &ChapterAggregate, width: usize) -> String {
    match chapter.chapter() {
        Some(n) => format!("chapter_{n:0width$}"),
        None => "chapter_none".to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let client = DexClient::new()?;

    let manga = if cli.manga.contains("mangadex.org") {
        MangaQuery::from_url(&cli.manga)?
    } else {
        MangaQuery::new(&cli.manga)
    };
    let query = cli
        .groups
        .iter()
        .fold(manga.language(&cli.language), |query, group| query.group(group));

    let volumes = client.manga().aggregate(&query).await?;
    let selection = Selection::from(&cli.pick);
    let chapters = selection.pick(&volumes);
    if chapters.is_empty() {
        warn!(?selection, "nothing to download");
        return Ok(());
    }

    let quality = if cli.raw {
        Quality::Standard
    } else {
        Quality::DataSaver
    };
    let width = number_width(&chapters);
    let mut downloader = ServiceBuilder::new()
        .rate_limit(1, Duration::from_secs(cli.delay.max(1)))
        .service(ChapterDownloader::new(client));

    let mut chapter_dirs = Vec::with_capacity(chapters.len());
    for chapter in chapters {
        let dir = cli.out_dir.join(chapter_dir_name(chapter, width));
        info!(id = %chapter.id(), dir = %dir.display(), "downloading chapter");
        let request = ChapterDownloadRequest::new(chapter.id())
            .quality(quality)
            .force_port_443(cli.force_port_443)
            .path(&dir);
        downloader.ready().await?.call(request).await?;
        chapter_dirs.push(dir);
    }

    if cli.cbz {
        let target = cli.out_dir.join("manga.cbz");
        pack_cbz(&chapter_dirs, &target)?;
        info!(file = %target.display(), "cbz written");
    }

    Ok(())
}

/// Write every file of `dirs` into one archive, one folder per chapter in
/// download order, then remove the chapter folders.
fn pack_cbz(dirs: &[PathBuf], target: &Path) -> io::Result<()> {
    let mut writer = ZipWriter::new(fs::File::create(target)?);
    for (i, dir) in dirs.iter().enumerate() {
        let folder = format!(
            "{i:05}_{}",
            dir.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        let mut pages: Vec<PathBuf> = fs::read_dir(dir)?
            .map(|e| e.map(|e| e.path()))
            .collect::<Result<_, _>>()?;
        pages.retain(|p| p.is_file());
        pages.sort();

        for page in pages {
            let name = page
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            writer.start_file(format!("{folder}/{name}"), FileOptions::default())?;
            writer.write_all(&fs::read(&page)?)?;
        }
    }
    writer.finish()?;

    for dir in dirs {
        if let Err(e) = fs::remove_dir_all(dir) {
            warn!(dir = %dir.display(), error = %e, "could not remove chapter folder");
        }
    }
    Ok(())
}
