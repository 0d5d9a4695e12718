//! 편집 파이프라인 통합 테스트.
//!
//! 전처리 → 캐시 → HTTP 어댑터(mockito) → 재시도 경로 검증.

use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbImage};
use retouch_core::config::AppConfig;
use retouch_core::models::edit::{EditOptions, EditRequest, EditResult, ErrorCode, Quality};
use retouch_core::ports::clock::SystemClock;
use retouch_edit::editor::ImageEditor;
use retouch_network::edit_service::HttpEditService;
use retouch_storage::sqlite::SqliteQueueStore;
use retouch_vision::preprocessor::ImagePreprocessor;
use std::io::Cursor;
use std::sync::Arc;

const EDIT_PATH: &str = "/v1/images/edits";

fn config_for(url: &str) -> AppConfig {
    let mut config = AppConfig::default_config();
    config.remote.endpoint = format!("{url}{EDIT_PATH}");
    config.remote.api_key = "test-key".to_string();
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 40;
    config
}

fn editor_for(config: &AppConfig) -> ImageEditor {
    let remote = Arc::new(HttpEditService::new(&config.remote).unwrap());
    let store = Arc::new(SqliteQueueStore::open_in_memory().unwrap());
    ImageEditor::new(config, remote, store, Arc::new(SystemClock))
}

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

fn small_png(seed: u8) -> Vec<u8> {
    let img = RgbImage::from_fn(16, 16, |x, y| {
        image::Rgb([seed, (x * 8) as u8, (y * 8) as u8])
    });
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
}

/// 압축이 잘 안 되는 노이즈 이미지
fn noisy_png(w: u32, h: u32) -> Vec<u8> {
    let mut state: u32 = 0x9e37_79b9;
    let img = GrayImage::from_fn(w, h, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        Luma([(state & 0xff) as u8])
    });
    encode(DynamicImage::ImageLuma8(img), ImageFormat::Png)
}

fn success_body(id: &str) -> String {
    format!(
        r#"{{"edited_image_url":"https://cdn.example.com/{id}.jpg","edited_image_id":"{id}",
            "confidence":0.87,"model_version":"edit-v3","image_width":1000,"image_height":1000,"file_size":4096}}"#
    )
}

#[tokio::test]
async fn large_image_is_downscaled_sent_once_and_cached() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", EDIT_PATH)
        .match_header("authorization", "Bearer test-key")
        .match_body(mockito::Matcher::AllOf(vec![
            mockito::Matcher::Regex(r#"filename="image.jpg""#.to_string()),
            mockito::Matcher::Regex("brighten".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(success_body("edited_1"))
        .expect(1)
        .create_async()
        .await;

    let config = config_for(&server.url());
    let editor = editor_for(&config);

    let bytes = noisy_png(2000, 2000);
    assert!(bytes.len() > config.preprocess.resize_threshold_bytes);

    // 전처리 결과는 픽셀 예산 안으로 축소됨
    let normalized = ImagePreprocessor::new(config.preprocess.clone())
        .preprocess(&bytes)
        .unwrap();
    assert_eq!((normalized.width, normalized.height), (1000, 1000));

    let first = editor
        .edit_image(bytes.clone(), "brighten", EditOptions::default())
        .await;
    let second = editor
        .edit_image(bytes, "brighten", EditOptions::default())
        .await;

    let success = first.success().expect("first edit should succeed");
    assert_eq!(success.edited_image_id, "edited_1");
    assert_eq!(success.metadata.prompt, "brighten");
    assert_eq!(success.metadata.confidence, Some(0.87));
    assert_eq!(success.metadata.model_version, "edit-v3");
    assert_eq!(first, second);

    let stats = editor.cache_stats();
    assert_eq!(stats.size, 1);
    assert_eq!(stats.entries[0].access_count, 1);

    mock.assert_async().await;
}

#[tokio::test]
async fn different_prompt_is_a_cache_miss() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", EDIT_PATH)
        .with_status(200)
        .with_body(success_body("edited_2"))
        .expect(2)
        .create_async()
        .await;

    let editor = editor_for(&config_for(&server.url()));
    let bytes = small_png(1);

    let a = editor
        .edit_image(bytes.clone(), "brighten", EditOptions::default())
        .await;
    let b = editor
        .edit_image(bytes, "remove background", EditOptions::default())
        .await;

    assert!(a.is_success());
    assert!(b.is_success());
    assert_eq!(editor.cache_stats().size, 2);
    mock.assert_async().await;
}

#[tokio::test]
async fn invalid_image_never_reaches_network() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", EDIT_PATH)
        .expect(0)
        .create_async()
        .await;

    let editor = editor_for(&config_for(&server.url()));
    let result = editor
        .edit_image(b"definitely not an image".to_vec(), "brighten", EditOptions::default())
        .await;

    let failure = result.failure().expect("validation should fail");
    assert_eq!(failure.code, ErrorCode::ValidationFailed);
    assert!(!failure.retryable);
    mock.assert_async().await;
}

#[tokio::test]
async fn server_errors_are_retried_then_reported() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", EDIT_PATH)
        .with_status(503)
        .with_body(r#"{"message":"model warming up"}"#)
        .expect(3)
        .create_async()
        .await;

    let config = config_for(&server.url());
    let editor = editor_for(&config);

    let result = editor
        .edit_image_with_retry(small_png(2), "brighten", EditOptions::default())
        .await
        .unwrap();

    let failure = result.failure().expect("all attempts fail");
    assert!(failure.retryable);
    assert!(failure.message.contains("model warming up"));
    assert_eq!(editor.cache_stats().size, 0);
    mock.assert_async().await;
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", EDIT_PATH)
        .with_status(404)
        .with_body(r#"{"message":"no such model"}"#)
        .expect(1)
        .create_async()
        .await;

    let editor = editor_for(&config_for(&server.url()));
    let result = editor
        .edit_image_with_retry(small_png(3), "brighten", EditOptions::default())
        .await
        .unwrap();

    assert!(!result.is_success());
    assert!(!result.is_retryable());
    mock.assert_async().await;
}

#[tokio::test]
async fn batch_preserves_input_order() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", EDIT_PATH)
        .with_status(200)
        .with_body(success_body("batch"))
        .expect(4)
        .create_async()
        .await;

    let editor = editor_for(&config_for(&server.url()));
    let options = EditOptions {
        quality: Quality::Standard,
        ..EditOptions::default()
    };
    let mut requests: Vec<_> = (0..4)
        .map(|i| EditRequest::new(small_png(10 + i), "brighten").with_options(options.clone()))
        .collect();
    // 빈 지시문은 검증에서 실패
    requests.insert(2, EditRequest::new(small_png(99), "   "));

    let results = editor.edit_images_in_batch(requests, Some(2)).await;

    assert_eq!(results.len(), 5);
    assert!(results[0].is_success());
    assert!(results[1].is_success());
    assert!(matches!(&results[2], EditResult::Failure(f) if f.code == ErrorCode::ValidationFailed));
    assert!(results[3].is_success());
    assert!(results[4].is_success());
    mock.assert_async().await;
}
