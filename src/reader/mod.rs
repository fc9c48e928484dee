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


//! Reader chapter loading and page navigation
//!
//! A chapter is read from the downloads directory when it has been
//! downloaded and from its content source otherwise. A partially downloaded
//! chapter still counts as downloaded and shows the pages that made it to
//! disk, unless `verify_downloads` is enabled.

use crate::config::DownloaderConfig;
use crate::error::{PagekeepError, Result};
use crate::file::{ChapterIntegrity, DownloadStore};
use crate::models::{Chapter, Series};
use crate::source::{resolve_page_urls, SourceRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One page as the reader should display it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRef {
    /// Page file in the downloads directory
    File(PathBuf),
    /// Page url as resolved by the content source
    Url(String),
}

impl PageRef {
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            PageRef::File(path) => Some(path),
            PageRef::Url(_) => None,
        }
    }

    /// String form handed to the renderer
    pub fn to_location(&self) -> String {
        match self {
            PageRef::File(path) => path.to_string_lossy().to_string(),
            PageRef::Url(url) => url.clone(),
        }
    }
}

/// Where a chapter's pages came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOrigin {
    Downloaded,
    Live,
}

#[derive(Debug, Clone)]
pub struct LoadedChapter {
    pub chapter: Chapter,
    pub origin: PageOrigin,
    pub pages: Vec<PageRef>,
}

/// Decides between the download store and the live source
#[derive(Debug, Clone)]
pub struct ChapterLoader {
    store: DownloadStore,
    registry: Arc<SourceRegistry>,
    verify_downloads: bool,
}

impl ChapterLoader {
    pub fn new(registry: Arc<SourceRegistry>, config: &DownloaderConfig) -> Self {
        Self {
            store: DownloadStore::new(config.downloads_dir.clone()),
            registry,
            verify_downloads: config.verify_downloads,
        }
    }

    pub fn store(&self) -> &DownloadStore {
        &self.store
    }

    /// Ordered pages of a chapter
    pub async fn load_chapter(&self, series: &Series, chapter: &Chapter) -> Result<LoadedChapter> {
        if self.store.is_chapter_downloaded(series, chapter).await {
            if let Some(pages) = self.load_downloaded(series, chapter).await? {
                tracing::debug!(
                    series_id = %series.id,
                    chapter_id = %chapter.id,
                    pages = pages.len(),
                    "reading downloaded chapter"
                );
                return Ok(LoadedChapter {
                    chapter: chapter.clone(),
                    origin: PageOrigin::Downloaded,
                    pages,
                });
            }
        }

        let source = self.registry.get(&series.extension_id)?;
        let urls = resolve_page_urls(source.as_ref(), series, chapter).await?;
        tracing::debug!(
            series_id = %series.id,
            chapter_id = %chapter.id,
            pages = urls.len(),
            "reading chapter from source"
        );

        Ok(LoadedChapter {
            chapter: chapter.clone(),
            origin: PageOrigin::Live,
            pages: urls.into_iter().map(PageRef::Url).collect(),
        })
    }

    /// Local pages, or None when verification rejects the download
    async fn load_downloaded(&self, series: &Series, chapter: &Chapter) -> Result<Option<Vec<PageRef>>> {
        if self.verify_downloads {
            let integrity = self.store.chapter_integrity(series, chapter).await?;
            if !matches!(integrity, ChapterIntegrity::Complete { .. }) {
                tracing::warn!(
                    series_id = %series.id,
                    chapter_id = %chapter.id,
                    ?integrity,
                    "incomplete download, falling back to source"
                );
                return Ok(None);
            }
        }

        let dir = match self.store.find_chapter_dir(series, chapter).await {
            Some(dir) => dir,
            None => return Ok(None),
        };
        let files = self.store.list_page_files(&dir).await?;
        Ok(Some(files.into_iter().map(PageRef::File).collect()))
    }
}

/// Result of a page turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTurn {
    /// Now showing this 1-based page
    Page(usize),
    /// Already on the last page
    ChapterEnd,
    /// Already on the first page
    ChapterStart,
}

/// Reading position within one series
#[derive(Debug)]
pub struct ReaderSession {
    loader: ChapterLoader,
    series: Series,
    chapters: Vec<Chapter>,
    chapter_index: Option<usize>,
    current: Option<LoadedChapter>,
    page_index: usize,
}

impl ReaderSession {
    /// Chapters are ordered by chapter number
    pub fn new(loader: ChapterLoader, series: Series, mut chapters: Vec<Chapter>) -> Self {
        chapters.sort_by(|a, b| {
            a.number_value()
                .partial_cmp(&b.number_value())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Self {
            loader,
            series,
            chapters,
            chapter_index: None,
            current: None,
            page_index: 0,
        }
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn current_chapter(&self) -> Option<&LoadedChapter> {
        self.current.as_ref()
    }

    pub fn current_page(&self) -> Option<&PageRef> {
        self.current.as_ref().and_then(|c| c.pages.get(self.page_index))
    }

    /// 1-based page number (0 when nothing is open)
    pub fn page_number(&self) -> usize {
        match &self.current {
            Some(c) if !c.pages.is_empty() => self.page_index + 1,
            _ => 0,
        }
    }

    pub fn page_count(&self) -> usize {
        self.current.as_ref().map_or(0, |c| c.pages.len())
    }

    /// Load a chapter by id and show its first page
    pub async fn open_chapter(&mut self, chapter_id: &str) -> Result<&LoadedChapter> {
        let index = self
            .chapters
            .iter()
            .position(|c| c.id == chapter_id)
            .ok_or_else(|| PagekeepError::not_found(format!("chapter {}", chapter_id)))?;
        self.load_index(index).await
    }

    pub fn next_page(&mut self) -> Result<PageTurn> {
        let count = self.open_page_count()?;
        if self.page_index + 1 < count {
            self.page_index += 1;
            Ok(PageTurn::Page(self.page_index + 1))
        } else {
            Ok(PageTurn::ChapterEnd)
        }
    }

    pub fn previous_page(&mut self) -> Result<PageTurn> {
        self.open_page_count()?;
        if self.page_index > 0 {
            self.page_index -= 1;
            Ok(PageTurn::Page(self.page_index + 1))
        } else {
            Ok(PageTurn::ChapterStart)
        }
    }

    /// Jump to a 1-based page
    pub fn jump_to_page(&mut self, page: usize) -> Result<()> {
        let count = self.open_page_count()?;
        if page == 0 || page > count {
            return Err(PagekeepError::invalid_input(format!(
                "Page {} out of range 1..={}",
                page, count
            )));
        }
        self.page_index = page - 1;
        Ok(())
    }

    /// Open the following chapter; None when already on the last one
    pub async fn next_chapter(&mut self) -> Result<Option<&LoadedChapter>> {
        let index = self.open_chapter_index()?;
        if index + 1 >= self.chapters.len() {
            return Ok(None);
        }
        self.load_index(index + 1).await.map(Some)
    }

    /// Open the preceding chapter; None when already on the first one
    pub async fn previous_chapter(&mut self) -> Result<Option<&LoadedChapter>> {
        let index = self.open_chapter_index()?;
        if index == 0 {
            return Ok(None);
        }
        self.load_index(index - 1).await.map(Some)
    }

    async fn load_index(&mut self, index: usize) -> Result<&LoadedChapter> {
        let loaded = self.loader.load_chapter(&self.series, &self.chapters[index]).await?;
        self.chapter_index = Some(index);
        self.page_index = 0;
        let loaded: &LoadedChapter = self.current.insert(loaded);
        Ok(loaded)
    }

    fn open_chapter_index(&self) -> Result<usize> {
        self.chapter_index
            .ok_or_else(|| PagekeepError::InvalidState("No chapter open".to_string()))
    }

    fn open_page_count(&self) -> Result<usize> {
        self.open_chapter_index()?;
        Ok(self.page_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FilesystemSource;
    use crate::source::ContentSource;
    use tempfile::TempDir;
    use tokio::fs;

    struct Fixture {
        _temp_dir: TempDir,
        config: DownloaderConfig,
        registry: Arc<SourceRegistry>,
        series: Series,
        chapters: Vec<Chapter>,
    }

    async fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let library = temp_dir.path().join("library").join("Dorohedoro");
        for (name, pages) in [("Ch 1", 3), ("Ch 2", 2)] {
            let dir = library.join(name);
            fs::create_dir_all(&dir).await.unwrap();
            for page in 1..=pages {
                fs::write(dir.join(format!("{}.png", page)), b"png").await.unwrap();
            }
        }

        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(FilesystemSource::new()));
        let source = FilesystemSource::new();
        let series = source.get_series(&library.to_string_lossy()).await.unwrap();
        let chapters = source.get_chapters(&series.source_id).await.unwrap();

        Fixture {
            config: DownloaderConfig::with_downloads_dir(temp_dir.path().join("downloads")),
            _temp_dir: temp_dir,
            registry: Arc::new(registry),
            series,
            chapters,
        }
    }

    #[tokio::test]
    async fn test_live_when_not_downloaded() {
        let f = fixture().await;
        let loader = ChapterLoader::new(f.registry.clone(), &f.config);

        let loaded = loader.load_chapter(&f.series, &f.chapters[0]).await.unwrap();
        assert_eq!(loaded.origin, PageOrigin::Live);
        assert_eq!(loaded.pages.len(), 3);
        assert!(matches!(loaded.pages[0], PageRef::Url(_)));
    }

    #[tokio::test]
    async fn test_partial_download_used_unless_verified() {
        let f = fixture().await;
        let loader = ChapterLoader::new(f.registry.clone(), &f.config);
        let store = loader.store();

        // One of three pages on disk, no marker
        let dir = store.get_chapter_download_path(&f.series, &f.chapters[0]).await;
        store.write_page(&dir, "001.png", b"png").await.unwrap();

        let loaded = loader.load_chapter(&f.series, &f.chapters[0]).await.unwrap();
        assert_eq!(loaded.origin, PageOrigin::Downloaded);
        assert_eq!(loaded.pages, vec![PageRef::File(dir.join("001.png"))]);

        let verifying = ChapterLoader::new(
            f.registry.clone(),
            &DownloaderConfig {
                verify_downloads: true,
                ..f.config.clone()
            },
        );
        let loaded = verifying.load_chapter(&f.series, &f.chapters[0]).await.unwrap();
        assert_eq!(loaded.origin, PageOrigin::Live);
        assert_eq!(loaded.pages.len(), 3);
    }

    #[tokio::test]
    async fn test_session_navigation() {
        let f = fixture().await;
        let loader = ChapterLoader::new(f.registry.clone(), &f.config);
        let first_id = f.chapters[0].id.clone();
        let mut session = ReaderSession::new(loader, f.series.clone(), f.chapters.clone());

        assert!(session.next_page().is_err());

        session.open_chapter(&first_id).await.unwrap();
        assert_eq!(session.page_number(), 1);
        assert_eq!(session.previous_page().unwrap(), PageTurn::ChapterStart);
        assert_eq!(session.next_page().unwrap(), PageTurn::Page(2));
        assert_eq!(session.next_page().unwrap(), PageTurn::Page(3));
        assert_eq!(session.next_page().unwrap(), PageTurn::ChapterEnd);

        session.jump_to_page(2).unwrap();
        assert_eq!(session.page_number(), 2);
        assert!(session.jump_to_page(4).is_err());
        assert!(session.jump_to_page(0).is_err());

        let next = session.next_chapter().await.unwrap().unwrap();
        assert_eq!(next.pages.len(), 2);
        assert_eq!(session.page_number(), 1);
        assert!(session.next_chapter().await.unwrap().is_none());

        let prev = session.previous_chapter().await.unwrap().unwrap();
        assert_eq!(prev.chapter.id, first_id);
        assert!(session.previous_chapter().await.unwrap().is_none());
    }
}
