//! Tests for the per-section download state machine.

mod common;

use std::time::Duration;

use common::{leaf, parent, MockSurface};
use municrawl::engine::{DownloadTask, DownloadWatcher, SectionDownloader, TaskStatus};
use municrawl::{CollectConfig, EngineError};

fn config(dir: &std::path::Path) -> CollectConfig {
    CollectConfig::builder()
        .download_root(dir)
        .resource_url("https://library.municode.com/fl/testville/codes/code_of_ordinances")
        .artifact_timeout(Duration::from_secs(2))
        .politeness_delay_ms(0, 0)
        .build()
        .unwrap()
}

fn fast_watcher() -> DownloadWatcher {
    DownloadWatcher::new(Duration::from_millis(20), Duration::from_millis(50))
}

#[tokio::test(start_paused = true)]
async fn downloads_and_renames_to_target_name() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let surface = MockSurface::new(vec![leaf("1", "Chapter 1")], dir.path());
    let watcher = fast_watcher();

    let mut task = DownloadTask::new(vec!["Chapter 1".to_string()], None, "1", ".docx");
    let downloader = SectionDownloader::new(&surface, &cfg, &watcher, dir.path());
    let artifact = downloader.run(&mut task).await.unwrap();

    assert_eq!(artifact, dir.path().join("Chapter 1.docx"));
    assert!(artifact.exists());
    // the browser-named file was renamed, not copied
    assert!(!dir.path().join("mock_download_1.docx").exists());
    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(task.attempts, 1);
    assert!(!surface.panel_is_open());
}

#[tokio::test(start_paused = true)]
async fn nested_section_expands_its_parent_first() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let surface = MockSurface::new(
        vec![parent("100", "Chapter 1", vec![leaf("101", "Article I")])],
        dir.path(),
    );
    let watcher = fast_watcher();

    let mut task = DownloadTask::new(
        vec!["Chapter 1".to_string(), "Article I".to_string()],
        Some("100".to_string()),
        "101",
        ".docx",
    );
    let downloader = SectionDownloader::new(&surface, &cfg, &watcher, dir.path());
    let artifact = downloader.run(&mut task).await.unwrap();

    assert!(artifact.exists());
    assert_eq!(
        artifact.file_name().unwrap().to_string_lossy(),
        task.target_name
    );
}

#[tokio::test(start_paused = true)]
async fn selection_recovers_with_one_corrective_click() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let surface =
        MockSurface::new(vec![leaf("1", "Chapter 1")], dir.path()).with_sticky_checkbox("1");
    let watcher = fast_watcher();

    let mut task = DownloadTask::new(vec!["Chapter 1".to_string()], None, "1", ".docx");
    let downloader = SectionDownloader::new(&surface, &cfg, &watcher, dir.path());
    assert!(downloader.run(&mut task).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn missing_node_is_a_selection_error() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let surface = MockSurface::new(vec![leaf("1", "Chapter 1")], dir.path());
    let watcher = fast_watcher();

    let mut task = DownloadTask::new(vec!["Ghost".to_string()], None, "999", ".docx");
    let downloader = SectionDownloader::new(&surface, &cfg, &watcher, dir.path());
    let err = downloader.run(&mut task).await.unwrap_err();

    assert!(matches!(err, EngineError::Selection { .. }));
    assert!(!err.is_fatal());
    assert_eq!(task.status, TaskStatus::Failed);
    // failure path still closes the panel
    assert!(!surface.panel_is_open());
}

#[tokio::test(start_paused = true)]
async fn disabled_trigger_fails_with_screenshot() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let surface =
        MockSurface::new(vec![leaf("1", "Chapter 1")], dir.path()).with_disabled_trigger();
    let watcher = fast_watcher();

    let mut task = DownloadTask::new(vec!["Chapter 1".to_string()], None, "1", ".docx");
    let downloader = SectionDownloader::new(&surface, &cfg, &watcher, dir.path());
    let err = downloader.run(&mut task).await.unwrap_err();

    assert!(matches!(err, EngineError::Trigger(_)));
    assert!(dir.path().join("debug_trigger_disabled.png").exists());
}

#[tokio::test(start_paused = true)]
async fn no_artifact_times_out_with_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let surface = MockSurface::new(vec![leaf("1", "Chapter 1")], dir.path()).with_dead_node("1");
    let watcher = fast_watcher();

    let mut task = DownloadTask::new(vec!["Chapter 1".to_string()], None, "1", ".docx");
    let downloader = SectionDownloader::new(&surface, &cfg, &watcher, dir.path());
    let err = downloader.run(&mut task).await.unwrap_err();

    match err {
        EngineError::ArtifactTimeout { new, .. } => assert_eq!(new, 0),
        other => panic!("expected artifact timeout, got {other:?}"),
    }
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(!surface.panel_is_open());
}
