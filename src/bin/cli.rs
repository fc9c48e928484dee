// Pagekeep - Desktop Comic Reader Core
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pagekeep_core::file::ChapterIntegrity;
use pagekeep_core::{
    init_logging, Chapter, ContentSource, DownloadManager, DownloadStore, DownloaderConfig,
    FilesystemSource, SourceRegistry,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "pagekeep-cli")]
#[command(about = "Pagekeep CLI - download and inspect local chapters", long_about = None)]
struct Cli {
    /// Downloader config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the downloads directory
    #[arg(short, long, global = true)]
    downloads_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download chapters of a local series directory through the queue
    Download {
        /// Series directory
        series_dir: PathBuf,
        /// Chapter numbers to download, e.g. "3", "1..5", "10.."
        #[arg(long)]
        chapters: Option<String>,
    },
    /// Print every downloaded chapter id
    List,
    /// Delete one downloaded chapter
    Delete {
        series_dir: PathBuf,
        chapter_number: String,
    },
    /// Show download integrity per chapter
    Status {
        series_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("warn");
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DownloaderConfig::load(path).await?,
        None => DownloaderConfig::default(),
    };
    if let Some(dir) = cli.downloads_dir {
        config.downloads_dir = dir;
    }

    match cli.command {
        Commands::Download { series_dir, chapters } => download(config, &series_dir, chapters.as_deref()).await,
        Commands::List => list(&config).await,
        Commands::Delete { series_dir, chapter_number } => delete(&config, &series_dir, &chapter_number).await,
        Commands::Status { series_dir } => status(&config, &series_dir).await,
    }
}

async fn download(config: DownloaderConfig, series_dir: &Path, selection: Option<&str>) -> Result<()> {
    let source = FilesystemSource::new();
    let (series, chapters) = load_series(&source, series_dir).await?;

    let range = selection.map(parse_chapter_range).transpose()?;
    let selected: Vec<Chapter> = chapters
        .into_iter()
        .filter(|c| range.map_or(true, |(from, to)| {
            let n = c.number_value();
            from.map_or(true, |f| n >= f) && to.map_or(true, |t| n <= t)
        }))
        .collect();

    if selected.is_empty() {
        bail!("No chapters selected in {}", series_dir.display());
    }

    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(source));
    let manager = DownloadManager::new(Arc::new(registry), config)?;

    let added = manager.enqueue(&series, &selected).await;
    println!("Queued {} chapter(s) of {}", added, series.title);

    let mut rx = manager.subscribe();
    let printer = tokio::spawn(async move {
        let mut last = String::new();
        while rx.changed().await.is_ok() {
            let line = rx
                .borrow_and_update()
                .current_task
                .as_ref()
                .map(|t| t.display_string());
            if let Some(line) = line {
                if line != last {
                    println!("{}", line);
                    last = line;
                }
            }
        }
    });

    manager.start().await;
    let snapshot = manager.wait_until_idle().await;
    printer.abort();

    for entry in snapshot.errors_by_time() {
        println!("{}", entry.display_string());
    }
    println!(
        "Done: {} downloaded, {} failed",
        selected.len() - snapshot.download_errors.len(),
        snapshot.download_errors.len()
    );
    Ok(())
}

async fn list(config: &DownloaderConfig) -> Result<()> {
    let store = DownloadStore::new(config.downloads_dir.clone());
    let mut ids: Vec<String> = store.get_all_downloaded_chapter_ids().await?.into_iter().collect();
    ids.sort();
    for id in &ids {
        println!("{}", id);
    }
    println!("{} downloaded chapter(s) in {}", ids.len(), config.downloads_dir.display());
    Ok(())
}

async fn delete(config: &DownloaderConfig, series_dir: &Path, chapter_number: &str) -> Result<()> {
    let source = FilesystemSource::new();
    let (series, chapters) = load_series(&source, series_dir).await?;
    let chapter = chapters
        .iter()
        .find(|c| c.chapter_number == chapter_number)
        .with_context(|| format!("No chapter {} in {}", chapter_number, series.title))?;

    let store = DownloadStore::new(config.downloads_dir.clone());
    if !store.is_chapter_downloaded(&series, chapter).await {
        bail!("Chapter {} of {} is not downloaded", chapter_number, series.title);
    }
    store.delete_downloaded_chapter(&series, chapter).await?;
    println!("Deleted chapter {} of {}", chapter_number, series.title);
    Ok(())
}

async fn status(config: &DownloaderConfig, series_dir: &Path) -> Result<()> {
    let source = FilesystemSource::new();
    let (series, chapters) = load_series(&source, series_dir).await?;
    let store = DownloadStore::new(config.downloads_dir.clone());

    println!("{}", series.title);
    for chapter in &chapters {
        let state = match store.chapter_integrity(&series, chapter).await? {
            ChapterIntegrity::Missing => "not downloaded".to_string(),
            ChapterIntegrity::Complete { pages } => format!("complete ({} pages)", pages),
            ChapterIntegrity::Partial { found, expected } => format!("partial ({} of {} pages)", found, expected),
            ChapterIntegrity::Unmarked { found } => format!("unverified ({} pages)", found),
        };
        println!("  Chapter {:<8} {}", chapter.chapter_number, state);
    }
    Ok(())
}

async fn load_series(source: &FilesystemSource, series_dir: &Path) -> Result<(pagekeep_core::Series, Vec<Chapter>)> {
    let series = source
        .get_series(&series_dir.to_string_lossy())
        .await
        .with_context(|| format!("Cannot open series directory {}", series_dir.display()))?;
    let chapters = source.get_chapters(&series.source_id).await?;
    Ok((series, chapters))
}

/// "3" → 3..=3, "1..5" → 1..=5, "10.." → 10.., "..4" → ..=4
fn parse_chapter_range(text: &str) -> Result<(Option<f64>, Option<f64>)> {
    let parse = |s: &str| -> Result<Option<f64>> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }
        s.parse::<f64>()
            .map(Some)
            .with_context(|| format!("Invalid chapter number '{}'", s))
    };

    match text.split_once("..") {
        Some((from, to)) => Ok((parse(from)?, parse(to.trim_start_matches('='))?)),
        None => {
            let n = parse(text)?;
            Ok((n, n))
        }
    }
}
