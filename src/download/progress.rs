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


//! Download tasks and the observable queue state
//!
//! # Progress Information
//! - Series and chapter for identification
//! - Current page / total pages (total unknown until the page list resolves)
//! - Per-task error entries keyed by (series id, chapter id)

use crate::models::{Chapter, Series};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Identity of a download: (series id, chapter id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskKey {
    pub series_id: String,
    pub chapter_id: String,
}

impl TaskKey {
    pub fn new(series_id: impl Into<String>, chapter_id: impl Into<String>) -> Self {
        Self {
            series_id: series_id.into(),
            chapter_id: chapter_id.into(),
        }
    }

    pub fn of(series: &Series, chapter: &Chapter) -> Self {
        Self::new(series.id.clone(), chapter.id.clone())
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.series_id, self.chapter_id)
    }
}

/// Unit of work: download every page of one chapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadTask {
    pub series: Series,
    pub chapter: Chapter,

    /// 1-based page currently being downloaded (None before start)
    pub page: Option<usize>,

    /// Total page count (None until the page list is resolved)
    pub total_pages: Option<usize>,
}

impl DownloadTask {
    pub fn new(series: Series, chapter: Chapter) -> Self {
        Self {
            series,
            chapter,
            page: None,
            total_pages: None,
        }
    }

    pub fn key(&self) -> TaskKey {
        TaskKey::of(&self.series, &self.chapter)
    }

    /// Pages fully written so far
    pub fn pages_completed(&self) -> usize {
        self.page.map(|p| p.saturating_sub(1)).unwrap_or(0)
    }

    /// Percentage complete (0.0 - 100.0); 0 while preparing
    pub fn progress_percentage(&self) -> f64 {
        match self.total_pages {
            Some(total) if total > 0 => (self.pages_completed() as f64 / total as f64) * 100.0,
            _ => 0.0,
        }
    }

    /// Format progress as display string
    pub fn display_string(&self) -> String {
        let name = format!("{} - Chapter {}", self.series.title, self.chapter.chapter_number);
        match (self.page, self.total_pages) {
            (Some(page), Some(total)) => format!("{}: Downloading page {} of {}", name, page, total),
            _ => format!("{}: Preparing download...", name),
        }
    }
}

/// Where a task currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Waiting in the queue
    Queued,
    /// Current task, queue running
    Downloading,
    /// Current task, queue paused
    Paused,
    /// Not queued; last attempt failed
    Failed,
}

/// Error recorded for a failed task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadErrorEntry {
    pub key: TaskKey,
    pub series_title: String,
    pub chapter_number: String,
    pub message: String,
    /// Whether re-enqueueing is likely to help
    pub retryable: bool,
    pub recorded_at: DateTime<Utc>,
}

impl DownloadErrorEntry {
    pub fn display_string(&self) -> String {
        format!(
            "{} - Chapter {}: Failed - {}",
            self.series_title, self.chapter_number, self.message
        )
    }
}

/// Point-in-time copy of the queue state, as published to observers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueSnapshot {
    pub running: bool,
    pub queue: Vec<DownloadTask>,
    pub current_task: Option<DownloadTask>,
    pub download_errors: HashMap<TaskKey, DownloadErrorEntry>,
}

impl QueueSnapshot {
    /// Nothing in flight and nothing that will start on its own
    pub fn is_idle(&self) -> bool {
        self.current_task.is_none() && (!self.running || self.queue.is_empty())
    }

    pub fn contains(&self, key: &TaskKey) -> bool {
        self.current_task.as_ref().map_or(false, |t| &t.key() == key)
            || self.queue.iter().any(|t| &t.key() == key)
    }

    pub fn task_status(&self, key: &TaskKey) -> Option<TaskStatus> {
        if self.current_task.as_ref().map_or(false, |t| &t.key() == key) {
            return Some(if self.running {
                TaskStatus::Downloading
            } else {
                TaskStatus::Paused
            });
        }
        if self.queue.iter().any(|t| &t.key() == key) {
            return Some(TaskStatus::Queued);
        }
        self.download_errors.get(key).map(|_| TaskStatus::Failed)
    }

    /// Errors ordered oldest first
    pub fn errors_by_time(&self) -> Vec<&DownloadErrorEntry> {
        let mut errors: Vec<&DownloadErrorEntry> = self.download_errors.values().collect();
        errors.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at).then_with(|| a.key.cmp(&b.key)));
        errors
    }
}

/// Callback type for queue state changes
///
/// Invoked while the queue state is locked; callbacks must not block.
pub type QueueCallback = Arc<dyn Fn(&QueueSnapshot) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> DownloadTask {
        DownloadTask::new(
            Series::new("s1", "filesystem", "/c/s1", "Blame!"),
            Chapter::new("c1", "/c/s1/1", "4"),
        )
    }

    #[test]
    fn test_progress_percentage() {
        let mut t = task();
        assert_eq!(t.progress_percentage(), 0.0);
        assert_eq!(t.display_string(), "Blame! - Chapter 4: Preparing download...");

        t.total_pages = Some(4);
        t.page = Some(3);
        assert_eq!(t.pages_completed(), 2);
        assert_eq!(t.progress_percentage(), 50.0);
        assert_eq!(t.display_string(), "Blame! - Chapter 4: Downloading page 3 of 4");
    }

    #[test]
    fn test_snapshot_status() {
        let current = task();
        let mut queued = task();
        queued.chapter.id = "c2".to_string();

        let mut snapshot = QueueSnapshot {
            running: true,
            queue: vec![queued.clone()],
            current_task: Some(current.clone()),
            download_errors: HashMap::new(),
        };

        assert_eq!(snapshot.task_status(&current.key()), Some(TaskStatus::Downloading));
        assert_eq!(snapshot.task_status(&queued.key()), Some(TaskStatus::Queued));
        assert!(!snapshot.is_idle());

        snapshot.running = false;
        assert_eq!(snapshot.task_status(&current.key()), Some(TaskStatus::Paused));

        let failed = TaskKey::new("s1", "c9");
        snapshot.download_errors.insert(
            failed.clone(),
            DownloadErrorEntry {
                key: failed.clone(),
                series_title: "Blame!".to_string(),
                chapter_number: "9".to_string(),
                message: "boom".to_string(),
                retryable: false,
                recorded_at: Utc::now(),
            },
        );
        assert_eq!(snapshot.task_status(&failed), Some(TaskStatus::Failed));
        assert_eq!(snapshot.task_status(&TaskKey::new("x", "y")), None);

        snapshot.current_task = None;
        assert!(snapshot.is_idle());
    }
}
