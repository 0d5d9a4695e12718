//! 최상위 편집기.
//!
//! 캐시, 편집 클라이언트, 재시도 컨트롤러, 오프라인 큐를 하나씩 소유한다.
//! 모든 의존성은 생성자로 주입되며 전역 상태는 없다.

use retouch_core::config::AppConfig;
use retouch_core::error::CoreError;
use retouch_core::models::cache::CacheStats;
use retouch_core::models::edit::{EditOptions, EditRequest, EditResult};
use retouch_core::models::queue::QueueStatus;
use retouch_core::ports::cache::EditCache;
use retouch_core::ports::clock::Clock;
use retouch_core::ports::edit_service::RemoteEditService;
use retouch_core::ports::queue_store::QueueStore;
use retouch_core::prompts;
use retouch_vision::preprocessor::ImagePreprocessor;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::cache::ContentCache;
use crate::client::EditClient;
use crate::offline_queue::OfflineQueueManager;
use crate::retry::{RetryController, RetryPolicy};

/// `submit` 결과
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// 즉시 처리됨
    Completed(EditResult),
    /// 오프라인이라 큐에 보관됨
    Queued(Uuid),
}

/// 이미지 편집기
pub struct ImageEditor {
    cache: Arc<ContentCache>,
    retry: Arc<RetryController>,
    queue: Arc<OfflineQueueManager>,
    default_concurrency: usize,
}

impl ImageEditor {
    /// 설정과 어댑터로 전체 구성
    pub fn new(
        config: &AppConfig,
        remote: Arc<dyn RemoteEditService>,
        store: Arc<dyn QueueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = Arc::new(ContentCache::new(&config.cache, Arc::clone(&clock)));
        let client = Arc::new(
            EditClient::new(
                ImagePreprocessor::new(config.preprocess.clone()),
                cache.clone(),
                remote,
            )
            .with_timeout(config.request_timeout()),
        );
        let retry = Arc::new(RetryController::new(
            client,
            RetryPolicy::from_config(&config.retry),
        ));
        let queue = Arc::new(OfflineQueueManager::new(
            retry.clone(),
            store,
            clock,
            &config.queue,
            true,
        ));

        Self::from_parts(cache, retry, queue, config.batch.default_concurrency)
    }

    /// 미리 만든 구성요소로 조립 (관찰자 연결 등)
    pub fn from_parts(
        cache: Arc<ContentCache>,
        retry: Arc<RetryController>,
        queue: Arc<OfflineQueueManager>,
        default_concurrency: usize,
    ) -> Self {
        Self {
            cache,
            retry,
            queue,
            default_concurrency: default_concurrency.max(1),
        }
    }

    /// 단일 편집 (재시도 없음)
    pub async fn edit_image(
        &self,
        image_bytes: Vec<u8>,
        prompt: &str,
        options: EditOptions,
    ) -> EditResult {
        let request = EditRequest::new(image_bytes, prompt).with_options(options);
        self.retry.client().edit(&request).await
    }

    /// 재시도 포함 단일 편집
    pub async fn edit_image_with_retry(
        &self,
        image_bytes: Vec<u8>,
        prompt: &str,
        options: EditOptions,
    ) -> Result<EditResult, CoreError> {
        let request = EditRequest::new(image_bytes, prompt).with_options(options);
        self.retry.edit_with_retry(&request).await
    }

    /// 배치 편집 (동시성 미지정 시 설정 기본값)
    pub async fn edit_images_in_batch(
        &self,
        requests: Vec<EditRequest>,
        concurrency: Option<usize>,
    ) -> Vec<EditResult> {
        let concurrency = concurrency.unwrap_or(self.default_concurrency);
        self.retry.edit_batch(&requests, concurrency).await
    }

    /// 연결 상태에 따라 즉시 처리하거나 오프라인 큐에 보관
    pub async fn submit(
        &self,
        image_bytes: Vec<u8>,
        prompt: &str,
        options: EditOptions,
        context: &str,
    ) -> Result<Submission, CoreError> {
        let request = EditRequest::new(image_bytes, prompt).with_options(options);

        if !self.queue.is_online() {
            let id = self.queue.enqueue(request, context).await?;
            info!(%id, context, "오프라인: 편집 요청 보관");
            return Ok(Submission::Queued(id));
        }

        let result = self.retry.edit_with_retry(&request).await?;
        Ok(Submission::Completed(result))
    }

    /// 맥락별 추천 지시문
    pub fn suggested_prompts(&self, context: &str) -> Vec<&'static str> {
        prompts::suggested_prompts(context)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub async fn queue_status(&self) -> QueueStatus {
        self.queue.queue_status().await
    }

    pub fn offline_queue(&self) -> &Arc<OfflineQueueManager> {
        &self.queue
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }
}
