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


//! Chapter download queue
//!
//! # Download Queue Management
//! - FIFO queue of chapter downloads, one task in flight at a time
//! - Pause takes effect between pages; resume continues at the next page
//! - Clearing abandons the in-flight task (pages already on disk stay)
//! - A failing task records an error entry and the queue moves on
//! - Every state change is published to subscribers and callbacks
//!
//! The queue starts paused. A single worker task is spawned on demand and
//! exits whenever the queue is paused or drained.

use crate::config::DownloaderConfig;
use crate::download::control::{Checkpoint, PauseToken, QueueControl};
use crate::download::fetch::{download_page, with_timeout, PageTarget};
use crate::download::progress::{
    DownloadErrorEntry, DownloadTask, QueueCallback, QueueSnapshot, TaskKey,
};
use crate::error::{PagekeepError, Result};
use crate::file::{ChapterIntegrity, CompletionMarker, DownloadStore};
use crate::models::{Chapter, Series};
use crate::source::{resolve_page_urls, SourceRegistry};
use chrono::Utc;
use futures_util::FutureExt;
use reqwest::Client;
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<DownloadTask>,
    current_task: Option<DownloadTask>,
    running: bool,
    download_errors: HashMap<TaskKey, DownloadErrorEntry>,
    worker_active: bool,
}

impl QueueState {
    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            running: self.running,
            queue: self.queue.iter().cloned().collect(),
            current_task: self.current_task.clone(),
            download_errors: self.download_errors.clone(),
        }
    }

    fn contains(&self, key: &TaskKey) -> bool {
        self.current_task.as_ref().map_or(false, |t| &t.key() == key)
            || self.queue.iter().any(|t| &t.key() == key)
    }
}

enum TaskOutcome {
    Completed,
    AlreadyDownloaded,
    Abandoned,
}

struct Inner {
    registry: Arc<SourceRegistry>,
    store: DownloadStore,
    config: DownloaderConfig,
    client: Client,
    state: RwLock<QueueState>,
    control: QueueControl,
    snapshot_tx: watch::Sender<QueueSnapshot>,
    callbacks: RwLock<Vec<QueueCallback>>,
}

/// Download queue
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct DownloadManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("downloads_dir", &self.inner.store.downloads_dir())
            .field("sources", &self.inner.registry.ids())
            .finish()
    }
}

impl DownloadManager {
    /// Create a paused, empty queue
    pub fn new(registry: Arc<SourceRegistry>, config: DownloaderConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .user_agent(concat!("pagekeep/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let (snapshot_tx, _rx) = watch::channel(QueueSnapshot::default());

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                store: DownloadStore::new(config.downloads_dir.clone()),
                config,
                client,
                state: RwLock::new(QueueState::default()),
                control: QueueControl::new(false),
                snapshot_tx,
                callbacks: RwLock::new(Vec::new()),
            }),
        })
    }

    pub fn store(&self) -> &DownloadStore {
        &self.inner.store
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.inner.config
    }

    /// Queue chapters of a series; returns how many were added
    ///
    /// Chapters already queued or in flight are skipped.
    pub async fn enqueue(&self, series: &Series, chapters: &[Chapter]) -> usize {
        let tasks = chapters
            .iter()
            .map(|chapter| DownloadTask::new(series.clone(), chapter.clone()))
            .collect();
        self.enqueue_tasks(tasks).await
    }

    /// Queue prepared tasks; returns how many were added
    pub async fn enqueue_tasks(&self, tasks: Vec<DownloadTask>) -> usize {
        let mut state = self.inner.state.write().await;
        let mut added = 0;

        for mut task in tasks {
            let key = task.key();
            if state.contains(&key) {
                tracing::debug!(task = %key, "already queued, skipping");
                continue;
            }
            task.page = None;
            task.total_pages = None;
            state.queue.push_back(task);
            added += 1;
        }

        if added > 0 {
            tracing::info!(added, queued = state.queue.len(), "enqueued chapter downloads");
            if state.running && !state.worker_active {
                spawn_worker(&self.inner, &mut state);
            }
            self.inner.publish(&state).await;
        }

        added
    }

    /// Start (or resume) processing the queue
    pub async fn start(&self) {
        let mut state = self.inner.state.write().await;
        state.running = true;
        self.inner.control.set_running(true);

        if !state.worker_active && !state.queue.is_empty() {
            spawn_worker(&self.inner, &mut state);
        }

        tracing::info!(queued = state.queue.len(), "download queue started");
        self.inner.publish(&state).await;
    }

    /// Pause after the page currently being fetched
    pub async fn pause(&self) {
        let mut state = self.inner.state.write().await;
        state.running = false;
        self.inner.control.set_running(false);

        tracing::info!(
            current = ?state.current_task.as_ref().map(|t| t.key().to_string()),
            "download queue paused"
        );
        self.inner.publish(&state).await;
    }

    /// Drop every queued task, the current task and all recorded errors
    ///
    /// Pages already written stay on disk. Re-enqueueing a cleared chapter
    /// downloads it again from the first page.
    pub async fn clear(&self) {
        let mut state = self.inner.state.write().await;
        let epoch = self.inner.control.abandon();
        let abandoned = state.current_task.take();

        state.queue.clear();
        state.download_errors.clear();
        state.worker_active = false;

        tracing::info!(
            epoch,
            abandoned = ?abandoned.map(|t| t.key().to_string()),
            "download queue cleared"
        );
        self.inner.publish(&state).await;
    }

    /// Remove a waiting task; the in-flight task can only be dropped by `clear`
    pub async fn remove(&self, key: &TaskKey) -> bool {
        let mut state = self.inner.state.write().await;
        let before = state.queue.len();
        state.queue.retain(|t| &t.key() != key);

        let removed = state.queue.len() != before;
        if removed {
            tracing::debug!(task = %key, "removed from queue");
            self.inner.publish(&state).await;
        }
        removed
    }

    /// Forget the error recorded for one task
    pub async fn dismiss_error(&self, key: &TaskKey) -> bool {
        let mut state = self.inner.state.write().await;
        let removed = state.download_errors.remove(key).is_some();
        if removed {
            self.inner.publish(&state).await;
        }
        removed
    }

    /// Current queue state
    pub fn snapshot(&self) -> QueueSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Receiver that observes every published queue state
    pub fn subscribe(&self) -> watch::Receiver<QueueSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Register a callback invoked on every state change
    pub async fn register_callback(&self, callback: QueueCallback) {
        self.inner.callbacks.write().await.push(callback);
    }

    /// Wait until nothing is in flight and nothing will start on its own
    pub async fn wait_until_idle(&self) -> QueueSnapshot {
        let mut rx = self.subscribe();
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if snapshot.is_idle() {
                    return snapshot.clone();
                }
            }
            if rx.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }
}

fn spawn_worker(inner: &Arc<Inner>, state: &mut QueueState) {
    state.worker_active = true;
    let token = inner.control.token();
    tokio::spawn(run_worker(Arc::clone(inner), token));
}

async fn run_worker(inner: Arc<Inner>, mut token: PauseToken) {
    tracing::debug!(epoch = token.epoch(), "download worker started");

    loop {
        let task = {
            let mut state = inner.state.write().await;
            if token.is_abandoned() {
                return;
            }
            if !state.running {
                state.worker_active = false;
                break;
            }
            match state.queue.pop_front() {
                Some(task) => {
                    state.current_task = Some(task.clone());
                    inner.publish(&state).await;
                    task
                }
                None => {
                    state.worker_active = false;
                    break;
                }
            }
        };

        let key = task.key();
        // A panicking source fails its own task, not the worker
        let outcome = AssertUnwindSafe(inner.process_task(&task, &mut token))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PagekeepError::DownloadFailed(panic_message(panic.as_ref()))));

        let mut state = inner.state.write().await;
        if token.is_abandoned() {
            tracing::debug!(task = %key, "download abandoned");
            return;
        }
        state.current_task = None;

        match outcome {
            Ok(TaskOutcome::Completed) => {
                tracing::info!(task = %key, "chapter downloaded");
                state.download_errors.remove(&key);
            }
            Ok(TaskOutcome::AlreadyDownloaded) => {
                tracing::info!(task = %key, "chapter already downloaded, skipped");
                state.download_errors.remove(&key);
            }
            Ok(TaskOutcome::Abandoned) => return,
            Err(e) => {
                let kind = if e.is_source_error() {
                    "source"
                } else if e.is_file_error() {
                    "filesystem"
                } else {
                    "download"
                };
                tracing::warn!(task = %key, kind, error = %e, "chapter download failed");
                let entry = DownloadErrorEntry {
                    key: key.clone(),
                    series_title: task.series.title.clone(),
                    chapter_number: task.chapter.chapter_number.clone(),
                    message: e.user_message(),
                    retryable: e.is_retryable(),
                    recorded_at: Utc::now(),
                };
                state.download_errors.insert(key, entry);
            }
        }

        inner.publish(&state).await;
    }

    tracing::debug!("download worker idle");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("content source panicked: {}", detail)
}

impl Inner {
    async fn publish(&self, state: &QueueState) {
        let snapshot = state.snapshot();
        for callback in self.callbacks.read().await.iter() {
            callback(&snapshot);
        }
        self.snapshot_tx.send_replace(snapshot);
    }

    /// Apply `update` to the current task unless the token was abandoned
    async fn update_current<F>(&self, token: &PauseToken, update: F) -> bool
    where
        F: FnOnce(&mut DownloadTask),
    {
        let mut state = self.state.write().await;
        if token.is_abandoned() {
            return false;
        }
        if let Some(task) = state.current_task.as_mut() {
            update(task);
        }
        self.publish(&state).await;
        true
    }

    async fn process_task(&self, task: &DownloadTask, token: &mut PauseToken) -> Result<TaskOutcome> {
        let series = &task.series;
        let chapter = &task.chapter;
        let source = self.registry.get(&series.extension_id)?;

        if let Ok(ChapterIntegrity::Complete { .. }) = self.store.chapter_integrity(series, chapter).await {
            return Ok(TaskOutcome::AlreadyDownloaded);
        }

        let urls = with_timeout(
            self.config.page_timeout(),
            resolve_page_urls(source.as_ref(), series, chapter),
        )
        .await?;

        if urls.is_empty() {
            return Err(PagekeepError::InvalidPageData(format!(
                "Chapter {} has no pages",
                chapter.chapter_number
            )));
        }

        let total = urls.len();
        if !self.update_current(token, |t| t.total_pages = Some(total)).await {
            return Ok(TaskOutcome::Abandoned);
        }

        let chapter_dir = self.store.get_chapter_download_path(series, chapter).await;
        tracing::debug!(dir = %chapter_dir.display(), pages = total, "downloading chapter");

        for (i, url) in urls.iter().enumerate() {
            if token.checkpoint().await == Checkpoint::Abandoned {
                return Ok(TaskOutcome::Abandoned);
            }

            let index = i + 1;
            if !self.update_current(token, |t| t.page = Some(index)).await {
                return Ok(TaskOutcome::Abandoned);
            }

            let target = PageTarget {
                chapter_dir: &chapter_dir,
                index,
                total,
                padding: self.config.page_filename_padding,
            };

            let path = with_timeout(
                self.config.page_timeout(),
                download_page(&self.client, &self.store, source.as_ref(), series, url, &target),
            )
            .await
            .map_err(|e| {
                tracing::debug!(page = index, error = %e, "page failed");
                e
            })?;

            tracing::trace!(page = index, path = %path.display(), "page written");
        }

        if token.is_abandoned() {
            return Ok(TaskOutcome::Abandoned);
        }

        if self.config.write_completion_marker {
            let marker = CompletionMarker {
                series_id: series.id.clone(),
                chapter_id: chapter.id.clone(),
                page_count: total,
                completed_at: Utc::now(),
            };
            self.store.write_completion_marker(&chapter_dir, &marker).await?;
        }

        Ok(TaskOutcome::Completed)
    }
}
