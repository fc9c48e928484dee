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


//! Local filesystem content source
//!
//! - A series is a directory; its title is the directory name
//! - Each sub-directory holding images is a chapter; the chapter number is
//!   the first number in its name
//! - Pages are the image files of a chapter directory, naturally sorted
//!
//! Ids are v5 UUIDs of the canonical path, so listing the same folder twice
//! yields the same chapter ids and downloads stay recognizable.

use crate::error::{PagekeepError, Result};
use crate::file::paths::{is_page_file, natural_cmp, parse_chapter_number};
use crate::models::{Chapter, ImageData, PageRequesterData, Series};
use crate::source::ContentSource;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

pub const FILESYSTEM_SOURCE_ID: &str = "filesystem";

#[derive(Debug, Clone, Default)]
pub struct FilesystemSource;

impl FilesystemSource {
    pub fn new() -> Self {
        Self
    }

    /// Deterministic id for a path
    pub fn path_id(path: &Path) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, path.to_string_lossy().as_bytes()).to_string()
    }

    async fn canonical_dir(path: &str) -> Result<PathBuf> {
        let path = fs::canonicalize(path)
            .await
            .map_err(|_| PagekeepError::not_found(path.to_string()))?;
        if !fs::metadata(&path).await?.is_dir() {
            return Err(PagekeepError::InvalidPath(format!(
                "Not a directory: {}",
                path.display()
            )));
        }
        Ok(path)
    }

    async fn page_files(dir: &Path) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if is_page_file(&name) {
                names.push(name);
            }
        }
        names.sort_by(|a, b| natural_cmp(a, b));
        Ok(names)
    }

    async fn load_series(source_id: &str) -> Result<Series> {
        let dir = Self::canonical_dir(source_id).await?;
        let title = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| dir.display().to_string());

        Ok(Series::new(
            Self::path_id(&dir),
            FILESYSTEM_SOURCE_ID,
            dir.to_string_lossy(),
            title,
        ))
    }

    async fn load_chapters(series_source_id: &str) -> Result<Vec<Chapter>> {
        let dir = Self::canonical_dir(series_source_id).await?;
        let mut entries = fs::read_dir(&dir).await?;
        let mut chapters = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let path = entry.path();
            if Self::page_files(&path).await?.is_empty() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            let mut chapter = Chapter::new(
                Self::path_id(&path),
                path.to_string_lossy(),
                parse_chapter_number(&name).unwrap_or_default(),
            );
            chapter.title = name;
            chapters.push(chapter);
        }

        chapters.sort_by(|a, b| {
            a.number_value()
                .partial_cmp(&b.number_value())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| natural_cmp(&a.title, &b.title))
        });

        tracing::debug!(series = %dir.display(), count = chapters.len(), "listed local chapters");
        Ok(chapters)
    }

    async fn load_page_requester_data(chapter_source_id: &str) -> Result<PageRequesterData> {
        let dir = Self::canonical_dir(chapter_source_id).await?;
        let page_filenames = Self::page_files(&dir).await?;

        Ok(PageRequesterData {
            server: dir.to_string_lossy().to_string(),
            hash: String::new(),
            num_pages: page_filenames.len(),
            page_filenames,
        })
    }
}

impl ContentSource for FilesystemSource {
    fn id(&self) -> &str {
        FILESYSTEM_SOURCE_ID
    }

    fn get_series<'a>(&'a self, source_id: &'a str) -> BoxFuture<'a, Result<Series>> {
        Self::load_series(source_id).boxed()
    }

    fn get_chapters<'a>(&'a self, series_source_id: &'a str) -> BoxFuture<'a, Result<Vec<Chapter>>> {
        Self::load_chapters(series_source_id).boxed()
    }

    fn get_page_requester_data<'a>(
        &'a self,
        _series_source_id: &'a str,
        chapter_source_id: &'a str,
    ) -> BoxFuture<'a, Result<PageRequesterData>> {
        Self::load_page_requester_data(chapter_source_id).boxed()
    }

    fn get_page_urls<'a>(&'a self, data: &'a PageRequesterData) -> BoxFuture<'a, Result<Vec<String>>> {
        async move {
            let dir = PathBuf::from(&data.server);
            Ok(data
                .page_filenames
                .iter()
                .map(|name| dir.join(name).to_string_lossy().to_string())
                .collect())
        }
        .boxed()
    }

    fn get_image<'a>(&'a self, _series: &'a Series, url: &'a str) -> BoxFuture<'a, Result<ImageData>> {
        async move {
            let bytes = fs::read(url).await.map_err(|e| {
                PagekeepError::FileIoError(format!("Failed to read page {}: {}", url, e))
            })?;
            Ok(ImageData::Bytes(bytes))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn make_series(root: &Path) -> PathBuf {
        let series_dir = root.join("Vinland Saga");
        for (chapter, pages) in [("Chapter 10", 2), ("Chapter 2", 3), ("Chapter 1.5", 1)] {
            let dir = series_dir.join(chapter);
            fs::create_dir_all(&dir).await.unwrap();
            for page in 1..=pages {
                fs::write(dir.join(format!("{}.jpg", page)), format!("{}-{}", chapter, page))
                    .await
                    .unwrap();
            }
        }
        // No images: not a chapter
        fs::create_dir_all(series_dir.join("scans")).await.unwrap();
        series_dir
    }

    #[tokio::test]
    async fn test_series_and_chapters() {
        let temp_dir = TempDir::new().unwrap();
        let series_dir = make_series(temp_dir.path()).await;
        let source = FilesystemSource::new();

        let series = source.get_series(&series_dir.to_string_lossy()).await.unwrap();
        assert_eq!(series.title, "Vinland Saga");
        assert_eq!(series.extension_id, FILESYSTEM_SOURCE_ID);

        let chapters = source.get_chapters(&series.source_id).await.unwrap();
        let numbers: Vec<&str> = chapters.iter().map(|c| c.chapter_number.as_str()).collect();
        assert_eq!(numbers, vec!["1.5", "2", "10"]);

        // Stable ids across listings
        let again = source.get_chapters(&series.source_id).await.unwrap();
        assert_eq!(chapters[0].id, again[0].id);
        assert!(Uuid::parse_str(&chapters[0].id).is_ok());
    }

    #[tokio::test]
    async fn test_pages_resolve_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let series_dir = make_series(temp_dir.path()).await;
        let source = FilesystemSource::new();
        let series = source.get_series(&series_dir.to_string_lossy()).await.unwrap();
        let chapters = source.get_chapters(&series.source_id).await.unwrap();
        let chapter = &chapters[1];

        let urls = crate::source::resolve_page_urls(&source, &series, chapter).await.unwrap();
        assert_eq!(urls.len(), 3);
        assert!(urls[0].ends_with("1.jpg"));

        match source.get_image(&series, &urls[2]).await.unwrap() {
            ImageData::Bytes(bytes) => assert_eq!(bytes, b"Chapter 2-3"),
            ImageData::Url(url) => panic!("unexpected url {}", url),
        }
    }

    #[tokio::test]
    async fn test_missing_series_dir() {
        let source = FilesystemSource::new();
        assert!(source.get_series("/definitely/not/here").await.is_err());
    }
}
