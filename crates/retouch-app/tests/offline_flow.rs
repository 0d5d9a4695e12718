//! 오프라인 큐 통합 테스트.
//!
//! SQLite 영속화 → 재시작 후 복원 → 온라인 복귀 시 드레인.

use image::{DynamicImage, ImageFormat, RgbImage};
use retouch_core::config::AppConfig;
use retouch_core::models::edit::EditOptions;
use retouch_core::models::queue::QueueEvent;
use retouch_core::ports::clock::SystemClock;
use retouch_edit::editor::{ImageEditor, Submission};
use retouch_network::connectivity::{ConnectionStatus, ConnectivityManager};
use retouch_network::edit_service::HttpEditService;
use retouch_storage::sqlite::SqliteQueueStore;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const EDIT_PATH: &str = "/v1/images/edits";

fn config_for(url: &str) -> AppConfig {
    let mut config = AppConfig::default_config();
    config.remote.endpoint = format!("{url}{EDIT_PATH}");
    config.remote.api_key = "test-key".to_string();
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 20;
    config.queue.follow_up_delay_ms = 10;
    config
}

fn png(seed: u8) -> Vec<u8> {
    let img = RgbImage::from_fn(12, 12, |x, y| image::Rgb([seed, x as u8 * 20, y as u8 * 20]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn open_editor(config: &AppConfig, db: &Path) -> (ImageEditor, Arc<SqliteQueueStore>) {
    let store = Arc::new(SqliteQueueStore::open(db).unwrap());
    let remote = Arc::new(HttpEditService::new(&config.remote).unwrap());
    let editor = ImageEditor::new(config, remote, store.clone(), Arc::new(SystemClock));
    (editor, store)
}

const SUCCESS_BODY: &str =
    r#"{"edited_image_url":"https://cdn.example.com/q.jpg","edited_image_id":"queued_1"}"#;

/// 조건이 참이 될 때까지 대기 (최대 5초)
async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("조건 대기 시간 초과");
}

#[tokio::test]
async fn offline_requests_survive_restart_and_drain_when_online() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("retouch.db");
    let config = config_for(&server.url());

    // 1차 실행: 오프라인에서 3건 보관
    {
        let (editor, store) = open_editor(&config, &db);
        editor.offline_queue().set_online(false).await;

        for seed in 0..3 {
            let submission = editor
                .submit(png(seed), "brighten", EditOptions::default(), "field-log")
                .await
                .unwrap();
            assert!(matches!(submission, Submission::Queued(_)));
        }
        assert_eq!(store.count().unwrap(), 3);
    }

    let mock = server
        .mock("POST", EDIT_PATH)
        .with_status(200)
        .with_body(SUCCESS_BODY)
        .expect(3)
        .create_async()
        .await;

    // 2차 실행: 복원 후 온라인 복귀
    let (editor, store) = open_editor(&config, &db);
    let queue = editor.offline_queue();
    queue.set_online(false).await;
    assert_eq!(queue.restore().await.unwrap(), 3);

    let status = editor.queue_status().await;
    assert_eq!(status.queue_length, 3);
    assert!(status.oldest_request_timestamp.is_some());

    let mut events = queue.subscribe();
    let report = queue.set_online(true).await;

    assert_eq!(report.processed, 3);
    assert_eq!(report.completed, 3);
    assert_eq!(report.remaining, 0);
    assert_eq!(store.count().unwrap(), 0);
    assert_eq!(editor.queue_status().await.queue_length, 0);

    let mut completed = 0;
    while let Ok(event) = events.try_recv() {
        if let QueueEvent::Completed { context, result, .. } = event {
            assert_eq!(context, "field-log");
            assert!(result.is_success());
            completed += 1;
        }
    }
    assert_eq!(completed, 3);
    mock.assert_async().await;
}

#[tokio::test]
async fn connectivity_recovery_triggers_drain() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", EDIT_PATH)
        .with_status(200)
        .with_body(SUCCESS_BODY)
        .expect(2)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server.url());
    let (editor, store) = open_editor(&config, &dir.path().join("retouch.db"));

    let connectivity = Arc::new(ConnectivityManager::default());
    connectivity.set_forced_offline(true);

    let queue = editor.offline_queue().clone();
    queue.set_online(connectivity.is_online()).await;
    let watcher =
        queue.watch_connectivity(connectivity.subscribe(), |s: &ConnectionStatus| s.is_online());

    for seed in 10..12 {
        let submission = editor
            .submit(png(seed), "remove background", EditOptions::default(), "chat")
            .await
            .unwrap();
        assert!(matches!(submission, Submission::Queued(_)));
    }
    assert_eq!(store.count().unwrap(), 2);

    connectivity.set_forced_offline(false);

    let q = queue.clone();
    wait_until(move || {
        let q = q.clone();
        async move { q.queue_status().await.queue_length == 0 }
    })
    .await;

    assert!(queue.is_online());
    assert_eq!(store.count().unwrap(), 0);
    mock.assert_async().await;
    watcher.abort();
}

#[tokio::test]
async fn repeated_failures_drop_entry_permanently() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", EDIT_PATH)
        .with_status(500)
        .with_body(r#"{"message":"internal"}"#)
        .expect(3)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(&server.url());
    config.retry.max_attempts = 1;
    let (editor, store) = open_editor(&config, &dir.path().join("retouch.db"));

    let queue = editor.offline_queue().clone();
    queue.set_online(false).await;
    queue
        .enqueue(
            retouch_core::models::edit::EditRequest::new(png(7), "brighten"),
            "document",
        )
        .await
        .unwrap();

    let mut events = queue.subscribe();
    let first = queue.set_online(true).await;
    assert_eq!(first.requeued, 1);

    // 후속 드레인이 재시도 한도까지 처리
    let q = queue.clone();
    wait_until(move || {
        let q = q.clone();
        async move { q.queue_status().await.queue_length == 0 }
    })
    .await;

    assert_eq!(store.count().unwrap(), 0);

    let mut failed = None;
    while let Ok(event) = events.try_recv() {
        if let QueueEvent::PermanentlyFailed { failure, context, .. } = event {
            assert_eq!(context, "document");
            failed = Some(failure);
        }
    }
    let failure = failed.expect("permanent failure event");
    assert!(failure.retryable);
    mock.assert_async().await;
}
