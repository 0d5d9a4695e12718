//! CLI 명령 처리.
//!
//! 결과는 JSON으로 stdout에 출력하고, 진행 로그는 tracing으로 stderr에 남긴다.

use anyhow::{bail, Context, Result};
use retouch_core::config::AppConfig;
use retouch_core::models::edit::{EditOptions, EditRequest, EditResult};
use retouch_core::models::queue::QueueEvent;
use retouch_core::ports::queue_store::QueueStore;
use retouch_core::prompts;
use retouch_edit::editor::Submission;
use retouch_edit::offline_queue::OfflineQueueManager;
use retouch_storage::sqlite::SqliteQueueStore;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info, warn};

use crate::Services;

/// 단일 편집. 오프라인이면 큐에 보관하고 ID를 출력한다.
pub async fn edit(
    services: &Services,
    image: &Path,
    prompt: &str,
    context: &str,
    options: EditOptions,
) -> Result<()> {
    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("이미지 읽기 실패: {}", image.display()))?;

    let submission = services
        .editor
        .submit(bytes, prompt, options, context)
        .await?;

    match submission {
        Submission::Completed(result) => {
            print_json(&serde_json::to_value(&result)?)?;
            if let EditResult::Failure(failure) = result {
                bail!("편집 실패 [{}]: {}", failure.code.as_str(), failure.message);
            }
        }
        Submission::Queued(id) => {
            print_json(&json!({
                "status": "queued",
                "id": id,
                "context": context,
            }))?;
        }
    }
    Ok(())
}

/// 같은 지시문으로 여러 이미지 편집. 결과는 입력 순서를 따른다.
pub async fn batch(
    services: &Services,
    images: &[PathBuf],
    prompt: &str,
    concurrency: Option<usize>,
    options: EditOptions,
) -> Result<()> {
    let mut requests = Vec::with_capacity(images.len());
    for path in images {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("이미지 읽기 실패: {}", path.display()))?;
        requests.push(EditRequest::new(bytes, prompt).with_options(options.clone()));
    }

    let results = services
        .editor
        .edit_images_in_batch(requests, concurrency)
        .await;

    let succeeded = results.iter().filter(|r| r.is_success()).count();
    info!(total = results.len(), succeeded, "배치 편집 완료");

    let items: Vec<_> = images
        .iter()
        .zip(&results)
        .map(|(path, result)| {
            json!({
                "image": path.display().to_string(),
                "result": result,
            })
        })
        .collect();
    print_json(&json!(items))?;

    if succeeded < results.len() {
        bail!("{}개 중 {}개 편집 실패", results.len(), results.len() - succeeded);
    }
    Ok(())
}

/// 맥락별 추천 지시문 출력
pub fn print_prompts(context: &str) -> Result<()> {
    for prompt in prompts::suggested_prompts(context) {
        println!("{prompt}");
    }
    Ok(())
}

/// 적용된 설정 출력 (API 키는 마스킹)
pub fn print_config(config: &AppConfig) -> Result<()> {
    let mut shown = config.clone();
    if !shown.remote.api_key.is_empty() {
        shown.remote.api_key = "********".to_string();
    }
    print_json(&serde_json::to_value(&shown)?)
}

/// 저장소만 열어 큐 상태 출력 (원격 설정 불필요)
pub async fn queue_status(db_path: &Path, online: bool) -> Result<()> {
    let store = SqliteQueueStore::open(db_path)
        .with_context(|| format!("오프라인 큐 DB 열기 실패: {}", db_path.display()))?;
    let entries = store.load_all().await?;
    let oldest = entries.iter().map(|e| e.enqueued_at).min();

    print_json(&json!({
        "queue_length": entries.len(),
        "oldest_request_timestamp": oldest,
        "is_online": online,
    }))
}

/// 큐가 빌 때까지 처리
///
/// 드레인 한 번은 최대 `batch_size`개만 보내므로 반복한다.
/// 웨이브 사이에는 `pause`만큼 쉬어 실패 항목이 바로 재전송되지 않게 한다.
/// 항목마다 재시도 한도가 있어 반드시 끝난다.
/// 예약된 후속 처리가 보낸 항목도 이벤트로 집계한다.
pub async fn queue_drain(services: &Services, pause: Duration) -> Result<()> {
    let queue = services.editor.offline_queue();
    if !queue.is_online() {
        bail!("오프라인 상태: 큐를 처리할 수 없음");
    }

    let mut events = queue.subscribe();
    let remaining = drain_until_empty(queue, pause).await;

    let (mut completed, mut permanently_failed) = (0usize, 0usize);
    loop {
        match events.try_recv() {
            Ok(QueueEvent::Completed { .. }) => completed += 1,
            Ok(QueueEvent::PermanentlyFailed { .. }) => permanently_failed += 1,
            Ok(QueueEvent::Enqueued { .. }) => {}
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "큐 이벤트 일부 누락, 집계가 부정확할 수 있음");
            }
            Err(_) => break,
        }
    }

    info!(completed, permanently_failed, remaining, "오프라인 큐 처리 완료");
    print_json(&json!({
        "completed": completed,
        "permanently_failed": permanently_failed,
        "remaining": remaining,
        "connection": services.connectivity.status().to_string(),
    }))
}

/// 큐가 비거나 연결이 끊길 때까지 웨이브 반복. 남은 항목 수를 반환.
async fn drain_until_empty(queue: &Arc<OfflineQueueManager>, pause: Duration) -> usize {
    let mut remaining = queue.queue_status().await.queue_length;
    while remaining > 0 {
        let report = queue.process_queue().await;
        debug!(processed = report.processed, requeued = report.requeued, "드레인 웨이브");

        remaining = queue.queue_status().await.queue_length;
        if remaining == 0 {
            break;
        }
        if !queue.is_online() {
            warn!(remaining, "처리 중 연결 끊김");
            break;
        }
        tokio::time::sleep(pause).await;
    }
    remaining
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
