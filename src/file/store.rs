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


//! Filesystem download store
//!
//! The directory tree under the downloads root *is* the record of what has
//! been downloaded. There is no database; a chapter counts as downloaded when
//! a non-empty directory whose name embeds its id exists under either of the
//! series' directories.
//!
//! # Key Operations
//! - Deterministic chapter directory lookup/derivation
//! - Downloaded-chapter membership and full-tree id scans
//! - Chapter deletion with empty series directory cleanup
//! - Atomic page writes and the optional completion marker

use crate::error::{PagekeepError, Result};
use crate::file::paths::{
    chapter_dir_name, dir_name_matches_chapter, extract_chapter_id, is_page_file, natural_cmp,
    series_dir_candidates, COMPLETION_MARKER,
};
use crate::models::{Chapter, Series};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Written into a chapter directory after its last page succeeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionMarker {
    pub series_id: String,
    pub chapter_id: String,
    pub page_count: usize,
    pub completed_at: DateTime<Utc>,
}

/// How much of a chapter is on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterIntegrity {
    /// No chapter directory (or an empty one)
    Missing,
    /// Marker present and page count matches
    Complete { pages: usize },
    /// Marker present but fewer/more pages than recorded
    Partial { found: usize, expected: usize },
    /// Pages present but no marker (interrupted, or written before markers existed)
    Unmarked { found: usize },
}

/// Downloads root plus the operations on it
#[derive(Debug, Clone)]
pub struct DownloadStore {
    downloads_dir: PathBuf,
}

impl DownloadStore {
    pub fn new(downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloads_dir: downloads_dir.into(),
        }
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    /// Existing chapter directory for this chapter, if any
    ///
    /// Looks in the title-keyed directory first, then the id-keyed one, and
    /// matches any sub-directory whose name embeds the chapter id.
    pub async fn find_chapter_dir(&self, series: &Series, chapter: &Chapter) -> Option<PathBuf> {
        if chapter.id.is_empty() {
            return None;
        }

        for series_dir in series_dir_candidates(series, &self.downloads_dir) {
            let mut entries = match fs::read_dir(&series_dir).await {
                Ok(entries) => entries,
                Err(_) => continue,
            };

            while let Ok(Some(entry)) = entries.next_entry().await {
                let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                if !is_dir {
                    continue;
                }
                if dir_name_matches_chapter(&entry.file_name().to_string_lossy(), chapter) {
                    return Some(entry.path());
                }
            }
        }

        None
    }

    /// Directory a chapter's pages live in (existing match preferred)
    pub async fn get_chapter_download_path(&self, series: &Series, chapter: &Chapter) -> PathBuf {
        if let Some(existing) = self.find_chapter_dir(series, chapter).await {
            return existing;
        }

        // Fresh downloads always go to the title-keyed directory
        let series_dir = series_dir_candidates(series, &self.downloads_dir)
            .into_iter()
            .next()
            .unwrap_or_else(|| self.downloads_dir.clone());
        series_dir.join(chapter_dir_name(chapter))
    }

    /// True iff a non-empty directory for the chapter exists
    ///
    /// Page count is not checked; use [`chapter_integrity`](Self::chapter_integrity)
    /// to tell a finished download from an interrupted one.
    pub async fn is_chapter_downloaded(&self, series: &Series, chapter: &Chapter) -> bool {
        match self.find_chapter_dir(series, chapter).await {
            Some(dir) => !Self::is_dir_empty(&dir).await,
            None => false,
        }
    }

    /// Every chapter id found two levels under the downloads root
    pub async fn get_all_downloaded_chapter_ids(&self) -> Result<HashSet<String>> {
        let mut ids = HashSet::new();

        let mut series_entries = match fs::read_dir(&self.downloads_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => {
                return Err(PagekeepError::FileIoError(format!(
                    "Failed to read downloads directory {}: {}",
                    self.downloads_dir.display(),
                    e
                )))
            }
        };

        while let Some(series_entry) = series_entries.next_entry().await? {
            if !series_entry.file_type().await?.is_dir() {
                continue;
            }
            Self::collect_chapter_ids(&series_entry.path(), &mut ids).await?;
        }

        Ok(ids)
    }

    /// Chapter ids downloaded for one series (both directory namings)
    pub async fn downloaded_chapter_ids(&self, series: &Series) -> Result<HashSet<String>> {
        let mut ids = HashSet::new();
        for series_dir in series_dir_candidates(series, &self.downloads_dir) {
            if fs::try_exists(&series_dir).await.unwrap_or(false) {
                Self::collect_chapter_ids(&series_dir, &mut ids).await?;
            }
        }
        Ok(ids)
    }

    async fn collect_chapter_ids(series_dir: &Path, ids: &mut HashSet<String>) -> Result<()> {
        let mut entries = fs::read_dir(series_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(id) = extract_chapter_id(&entry.file_name().to_string_lossy()) {
                ids.insert(id);
            }
        }
        Ok(())
    }

    /// Remove a chapter's directory, then its series directory if now empty
    ///
    /// Deleting a chapter that isn't downloaded is not an error.
    pub async fn delete_downloaded_chapter(&self, series: &Series, chapter: &Chapter) -> Result<()> {
        while let Some(chapter_dir) = self.find_chapter_dir(series, chapter).await {
            fs::remove_dir_all(&chapter_dir).await.map_err(|e| {
                PagekeepError::FileIoError(format!(
                    "Failed to delete chapter directory {}: {}",
                    chapter_dir.display(),
                    e
                ))
            })?;
            tracing::info!(
                series_id = %series.id,
                chapter_id = %chapter.id,
                path = %chapter_dir.display(),
                "deleted downloaded chapter"
            );

            self.cleanup_empty_directories(&chapter_dir).await?;
        }

        Ok(())
    }

    /// Page image files in a chapter directory, naturally sorted
    pub async fn list_page_files(&self, chapter_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(chapter_dir).await.map_err(|e| {
            PagekeepError::FileIoError(format!(
                "Failed to read chapter directory {}: {}",
                chapter_dir.display(),
                e
            ))
        })?;

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
        Ok(names.into_iter().map(|n| chapter_dir.join(n)).collect())
    }

    /// Compare the pages on disk against the completion marker
    pub async fn chapter_integrity(&self, series: &Series, chapter: &Chapter) -> Result<ChapterIntegrity> {
        let dir = match self.find_chapter_dir(series, chapter).await {
            Some(dir) => dir,
            None => return Ok(ChapterIntegrity::Missing),
        };

        let found = self.list_page_files(&dir).await?.len();
        let integrity = match self.read_completion_marker(&dir).await? {
            Some(marker) if marker.page_count == found => ChapterIntegrity::Complete { pages: found },
            Some(marker) => ChapterIntegrity::Partial {
                found,
                expected: marker.page_count,
            },
            None if found == 0 => ChapterIntegrity::Missing,
            None => ChapterIntegrity::Unmarked { found },
        };

        Ok(integrity)
    }

    /// Write one page atomically (temp file, then rename)
    pub async fn write_page(&self, chapter_dir: &Path, file_name: &str, contents: &[u8]) -> Result<PathBuf> {
        self.ensure_directory_exists(chapter_dir).await?;
        let path = chapter_dir.join(file_name);
        self.atomic_write(&path, contents).await?;
        Ok(path)
    }

    pub async fn write_completion_marker(&self, chapter_dir: &Path, marker: &CompletionMarker) -> Result<()> {
        let json = serde_json::to_vec_pretty(marker)?;
        self.atomic_write(&chapter_dir.join(COMPLETION_MARKER), &json).await
    }

    pub async fn read_completion_marker(&self, chapter_dir: &Path) -> Result<Option<CompletionMarker>> {
        let path = chapter_dir.join(COMPLETION_MARKER);
        match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(marker) => Ok(Some(marker)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable completion marker");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Temp path used while a file is being written
    pub(crate) fn temp_path_for(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("file");
        match path.parent() {
            Some(parent) => parent.join(format!(".{}.tmp", name)),
            None => PathBuf::from(format!(".{}.tmp", name)),
        }
    }

    /// Ensure directory exists, creating parent directories as needed
    pub async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if fs::try_exists(path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::create_dir_all(path).await.map_err(|e| {
            PagekeepError::FileIoError(format!(
                "Failed to create directory {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Atomic write: write to temp file, then rename
    pub async fn atomic_write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let temp_path = Self::temp_path_for(path);

        fs::write(&temp_path, contents).await.map_err(|e| {
            PagekeepError::FileIoError(format!(
                "Failed to write temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        self.commit_temp(&temp_path, path).await
    }

    /// Move a finished temp file into place
    pub(crate) async fn commit_temp(&self, temp_path: &Path, path: &Path) -> Result<()> {
        fs::rename(temp_path, path).await.map_err(|e| {
            PagekeepError::FileIoError(format!(
                "Failed to rename temp file {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))
        })
    }

    /// Remove empty parent directories up to (not including) the downloads root
    async fn cleanup_empty_directories(&self, path: &Path) -> Result<()> {
        let mut current = path.parent();

        while let Some(dir) = current {
            if dir == self.downloads_dir || !dir.starts_with(&self.downloads_dir) {
                break;
            }

            if !Self::is_dir_empty(dir).await {
                break;
            }

            fs::remove_dir(dir).await.map_err(|e| {
                PagekeepError::FileIoError(format!(
                    "Failed to remove empty directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;

            current = dir.parent();
        }

        Ok(())
    }

    async fn is_dir_empty(dir: &Path) -> bool {
        match fs::read_dir(dir).await {
            Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
            Err(_) => true,
        }
    }
}
