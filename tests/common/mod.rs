//! Shared fixtures for integration tests
//!
//! `ScriptedSource` serves chapters whose page count and failures are set up
//! per test. An optional semaphore gates every page fetch so tests can hold
//! the downloader on a specific page.

#![allow(dead_code)]

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use pagekeep_core::{
    Chapter, ContentSource, DownloadManager, DownloaderConfig, ImageData, PagekeepError,
    PageRequesterData, Result, Series, SourceRegistry, TaskKey,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

pub const SOURCE_ID: &str = "scripted";

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone, Default)]
struct ChapterScript {
    pages: usize,
    fail_page: Option<usize>,
    fail_listing: bool,
    panic_listing: bool,
}

#[derive(Default)]
pub struct ScriptedSource {
    chapters: HashMap<String, ChapterScript>,
    gate: Option<Arc<Semaphore>>,
    recovered: AtomicBool,
    fetches_started: AtomicUsize,
    fetched: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chapter (by source id) with `pages` pages
    pub fn chapter(mut self, chapter_source_id: &str, pages: usize) -> Self {
        self.chapters.insert(
            chapter_source_id.to_string(),
            ChapterScript {
                pages,
                ..Default::default()
            },
        );
        self
    }

    /// Chapter whose `fail_page` (1-based) fetch errors
    pub fn failing_page(mut self, chapter_source_id: &str, pages: usize, fail_page: usize) -> Self {
        self.chapters.insert(
            chapter_source_id.to_string(),
            ChapterScript {
                pages,
                fail_page: Some(fail_page),
                ..Default::default()
            },
        );
        self
    }

    /// Chapter whose page list can't be resolved
    pub fn failing_listing(mut self, chapter_source_id: &str) -> Self {
        self.chapters.insert(
            chapter_source_id.to_string(),
            ChapterScript {
                fail_listing: true,
                ..Default::default()
            },
        );
        self
    }

    /// Chapter whose page list lookup panics
    pub fn panicking_listing(mut self, chapter_source_id: &str, pages: usize) -> Self {
        self.chapters.insert(
            chapter_source_id.to_string(),
            ChapterScript {
                pages,
                panic_listing: true,
                ..Default::default()
            },
        );
        self
    }

    /// Scripted failures stop firing from now on
    pub fn recover(&self) {
        self.recovered.store(true, Ordering::SeqCst);
    }

    fn failing(&self) -> bool {
        !self.recovered.load(Ordering::SeqCst)
    }

    /// Every page fetch takes one permit from the returned semaphore
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(gate.clone());
        (self, gate)
    }

    /// Page fetches entered so far (including ones blocked on the gate)
    pub fn fetches_started(&self) -> usize {
        self.fetches_started.load(Ordering::SeqCst)
    }

    /// Urls whose fetch completed, in order
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

fn page_number(url: &str) -> usize {
    url.rsplit('/')
        .next()
        .and_then(|name| name.split('.').next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

impl ContentSource for ScriptedSource {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    fn get_series<'a>(&'a self, source_id: &'a str) -> BoxFuture<'a, Result<Series>> {
        async move { Ok(Series::new(source_id, SOURCE_ID, source_id, source_id)) }.boxed()
    }

    fn get_chapters<'a>(&'a self, _series_source_id: &'a str) -> BoxFuture<'a, Result<Vec<Chapter>>> {
        async move {
            let mut chapters: Vec<Chapter> = self
                .chapters
                .keys()
                .map(|id| Chapter::new(id.clone(), id.clone(), ""))
                .collect();
            chapters.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(chapters)
        }
        .boxed()
    }

    fn get_page_requester_data<'a>(
        &'a self,
        _series_source_id: &'a str,
        chapter_source_id: &'a str,
    ) -> BoxFuture<'a, Result<PageRequesterData>> {
        async move {
            let script = self.chapters.get(chapter_source_id).ok_or_else(|| {
                PagekeepError::source_failed(SOURCE_ID, format!("unknown chapter {}", chapter_source_id))
            })?;
            if script.panic_listing {
                panic!("listing for {} blew up", chapter_source_id);
            }
            if script.fail_listing && self.failing() {
                return Err(PagekeepError::source_failed(SOURCE_ID, "page list unavailable"));
            }
            Ok(PageRequesterData {
                server: format!("https://scripted.test/{}", chapter_source_id),
                hash: String::new(),
                num_pages: script.pages,
                page_filenames: (1..=script.pages).map(|i| format!("{}.png", i)).collect(),
            })
        }
        .boxed()
    }

    fn get_page_urls<'a>(&'a self, data: &'a PageRequesterData) -> BoxFuture<'a, Result<Vec<String>>> {
        async move {
            Ok(data
                .page_filenames
                .iter()
                .map(|name| format!("{}/{}", data.server, name))
                .collect())
        }
        .boxed()
    }

    fn get_image<'a>(&'a self, _series: &'a Series, url: &'a str) -> BoxFuture<'a, Result<ImageData>> {
        async move {
            self.fetches_started.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.acquire()
                    .await
                    .map_err(|_| PagekeepError::Cancelled)?
                    .forget();
            }

            let chapter_source_id = url
                .trim_start_matches("https://scripted.test/")
                .split('/')
                .next()
                .unwrap_or_default();
            let page = page_number(url);
            if let Some(script) = self.chapters.get(chapter_source_id) {
                if script.fail_page == Some(page) && self.failing() {
                    return Err(PagekeepError::source_failed(SOURCE_ID, format!("page {} missing", page)));
                }
            }

            self.fetched.lock().unwrap().push(url.to_string());
            let mut bytes = PNG_MAGIC.to_vec();
            bytes.extend_from_slice(url.as_bytes());
            Ok(ImageData::Bytes(bytes))
        }
        .boxed()
    }
}

pub fn series() -> Series {
    Series::new("series-1", SOURCE_ID, "remote-series-1", "Berserk")
}

/// Chapter whose source id is `c{number}`; the id is a stable UUID
pub fn chapter(number: usize) -> Chapter {
    Chapter::new(chapter_id(number), format!("c{}", number), number.to_string())
}

pub fn chapter_id(number: usize) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("chapter-{}", number).as_bytes()).to_string()
}

pub fn key(number: usize) -> TaskKey {
    TaskKey::new(series().id, chapter_id(number))
}

pub fn manager(source: Arc<ScriptedSource>, downloads_dir: &Path) -> DownloadManager {
    let mut registry = SourceRegistry::new();
    registry.register(source);
    DownloadManager::new(
        Arc::new(registry),
        DownloaderConfig::with_downloads_dir(downloads_dir),
    )
    .unwrap()
}

/// Poll `condition` until it holds, panicking after five seconds
pub async fn wait_for<F: FnMut() -> bool>(what: &str, mut condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Page files in a chapter directory, naturally ordered
pub async fn page_files(manager: &DownloadManager, dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }
    manager.store().list_page_files(dir).await.unwrap()
}

/// Poll the page files of `dir` until there are `count` of them
pub async fn wait_for_pages(manager: &DownloadManager, dir: &Path, count: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let found = page_files(manager, dir).await.len();
        if found == count {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("expected {} pages in {}, found {}", count, dir.display(), found);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Wait for the queue to go idle, panicking after five seconds
pub async fn idle(manager: &DownloadManager) -> pagekeep_core::QueueSnapshot {
    tokio::time::timeout(Duration::from_secs(5), manager.wait_until_idle())
        .await
        .expect("queue did not go idle")
}
