//! Reader chapter loading after downloads

mod common;

use common::{chapter, chapter_id, idle, manager, series, ScriptedSource, SOURCE_ID};
use pagekeep_core::reader::{PageOrigin, PageRef, PageTurn};
use pagekeep_core::{ChapterLoader, DownloaderConfig, ReaderSession, SourceRegistry};
use std::sync::Arc;
use tempfile::TempDir;

fn registry(source: Arc<ScriptedSource>) -> Arc<SourceRegistry> {
    let mut registry = SourceRegistry::new();
    registry.register(source);
    Arc::new(registry)
}

#[tokio::test]
async fn test_downloaded_chapter_reads_from_disk() {
    let temp_dir = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new().chapter("c1", 12).chapter("c2", 2));
    let manager = manager(source.clone(), temp_dir.path());
    let series = series();

    manager.enqueue(&series, &[chapter(1)]).await;
    manager.start().await;
    idle(&manager).await;

    let loader = ChapterLoader::new(
        registry(source.clone()),
        &DownloaderConfig::with_downloads_dir(temp_dir.path()),
    );

    let local = loader.load_chapter(&series, &chapter(1)).await.unwrap();
    assert_eq!(local.origin, PageOrigin::Downloaded);
    assert_eq!(local.pages.len(), 12);
    let names: Vec<String> = local
        .pages
        .iter()
        .map(|p| p.as_path().unwrap().file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names.first().map(String::as_str), Some("001.png"));
    assert_eq!(names.last().map(String::as_str), Some("012.png"));

    let live = loader.load_chapter(&series, &chapter(2)).await.unwrap();
    assert_eq!(live.origin, PageOrigin::Live);
    assert_eq!(
        live.pages,
        vec![
            PageRef::Url("https://scripted.test/c2/1.png".to_string()),
            PageRef::Url("https://scripted.test/c2/2.png".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_failed_download_shows_partial_pages() {
    let temp_dir = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new().failing_page("c1", 5, 4));
    let manager = manager(source.clone(), temp_dir.path());
    let series = series();

    manager.enqueue(&series, &[chapter(1)]).await;
    manager.start().await;
    let snapshot = idle(&manager).await;
    assert_eq!(snapshot.download_errors.len(), 1);

    let config = DownloaderConfig::with_downloads_dir(temp_dir.path());
    let loader = ChapterLoader::new(registry(source.clone()), &config);
    let loaded = loader.load_chapter(&series, &chapter(1)).await.unwrap();
    assert_eq!(loaded.origin, PageOrigin::Downloaded);
    assert_eq!(loaded.pages.len(), 3);

    let verifying = ChapterLoader::new(
        registry(source),
        &DownloaderConfig {
            verify_downloads: true,
            ..config
        },
    );
    let loaded = verifying.load_chapter(&series, &chapter(1)).await.unwrap();
    assert_eq!(loaded.origin, PageOrigin::Live);
    assert_eq!(loaded.pages.len(), 5);
}

#[tokio::test]
async fn test_session_walks_mixed_chapters() {
    let temp_dir = TempDir::new().unwrap();
    let source = Arc::new(ScriptedSource::new().chapter("c1", 2).chapter("c2", 1));
    let manager = manager(source.clone(), temp_dir.path());
    let series = series();

    manager.enqueue(&series, &[chapter(2)]).await;
    manager.start().await;
    idle(&manager).await;

    let loader = ChapterLoader::new(
        registry(source),
        &DownloaderConfig::with_downloads_dir(temp_dir.path()),
    );
    // Given out of order; the session sorts by number
    let mut session = ReaderSession::new(loader, series.clone(), vec![chapter(2), chapter(1)]);
    assert_eq!(session.series().extension_id, SOURCE_ID);

    let first = session.open_chapter(&chapter_id(1)).await.unwrap();
    assert_eq!(first.origin, PageOrigin::Live);
    assert_eq!(session.next_page().unwrap(), PageTurn::Page(2));
    assert_eq!(session.next_page().unwrap(), PageTurn::ChapterEnd);

    let second = session.next_chapter().await.unwrap().unwrap();
    assert_eq!(second.origin, PageOrigin::Downloaded);
    assert_eq!(session.page_count(), 1);
    assert!(matches!(session.current_page(), Some(PageRef::File(_))));
    assert!(session.next_chapter().await.unwrap().is_none());

    assert!(session.open_chapter("ch-404").await.is_err());
}
