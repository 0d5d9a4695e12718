//! 편집 클라이언트.
//!
//! 단일 편집 시도: 검증 → 전처리 → 캐시 조회 → 원격 호출 1회 → 캐시 저장.
//! 예상 가능한 실패는 모두 `EditResult::Failure`로 돌려준다.
//!
//! 동일 키에 대한 동시 요청은 키별 잠금(single-flight)으로 묶어
//! 원격 호출이 한 번만 일어나게 한다.

use parking_lot::Mutex;
use retouch_core::error::CoreError;
use retouch_core::models::cache::CacheKey;
use retouch_core::models::edit::{
    EditFailure, EditMetadata, EditRequest, EditResult, EditSuccess, ImageSize,
};
use retouch_core::ports::cache::EditCache;
use retouch_core::ports::edit_service::{EditSubmission, RemoteEditResponse, RemoteEditService};
use retouch_vision::identity;
use retouch_vision::preprocessor::{ImagePreprocessor, NormalizedImage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 원격 호출 상한
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 편집 클라이언트
pub struct EditClient {
    preprocessor: ImagePreprocessor,
    cache: Arc<dyn EditCache>,
    remote: Arc<dyn RemoteEditService>,
    timeout: Duration,
    /// 진행 중인 키별 잠금
    in_flight: Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl EditClient {
    pub fn new(
        preprocessor: ImagePreprocessor,
        cache: Arc<dyn EditCache>,
        remote: Arc<dyn RemoteEditService>,
    ) -> Self {
        Self {
            preprocessor,
            cache,
            remote,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// 원격 호출 타임아웃 변경
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache(&self) -> &Arc<dyn EditCache> {
        &self.cache
    }

    /// 단일 편집 시도
    pub async fn edit(&self, request: &EditRequest) -> EditResult {
        let started = Instant::now();

        if let Err(e) = request.validate_fields() {
            debug!("편집 요청 검증 실패: {e}");
            return EditFailure::from_error(&e).into();
        }

        let normalized = match self.preprocessor.preprocess(&request.image_bytes) {
            Ok(n) => n,
            Err(e) => {
                debug!("이미지 검증/전처리 실패: {e}");
                return EditFailure::from_error(&e).into();
            }
        };

        let key = identity::cache_key(&normalized.bytes, &request.instruction);
        if let Some(hit) = self.cache.lookup(&key) {
            return EditResult::Success(hit);
        }

        let flight = self.flight_lock(&key);
        let result = {
            let _guard = flight.lock().await;
            // 앞선 동일 요청이 방금 저장했을 수 있음
            match self.cache.lookup(&key) {
                Some(hit) => EditResult::Success(hit),
                None => self.call_remote(request, &normalized, key.clone(), started).await,
            }
        };
        self.release_flight(&key, flight);

        result
    }

    /// 원격 호출 1회 + 결과 변환
    async fn call_remote(
        &self,
        request: &EditRequest,
        normalized: &NormalizedImage,
        key: CacheKey,
        started: Instant,
    ) -> EditResult {
        let submission = EditSubmission {
            image: &normalized.bytes,
            mime_type: normalized.format.mime_type(),
            instruction: &request.instruction,
            options: &request.options,
        };

        debug!(
            key = %key,
            bytes = normalized.bytes.len(),
            width = normalized.width,
            height = normalized.height,
            "원격 편집 호출"
        );

        let outcome = match tokio::time::timeout(self.timeout, self.remote.submit(&submission)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(CoreError::ExecutionTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };

        match outcome {
            Ok(response) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                let success = self.build_success(request, &key, response, elapsed_ms);
                info!(
                    key = %key,
                    edited_image_id = %success.edited_image_id,
                    elapsed_ms,
                    "편집 완료"
                );
                self.cache.store(key, success.clone());
                EditResult::Success(success)
            }
            Err(e) => {
                warn!(key = %key, retryable = e.is_retryable(), "편집 실패: {e}");
                EditFailure::from_error(&e).into()
            }
        }
    }

    fn build_success(
        &self,
        request: &EditRequest,
        key: &CacheKey,
        response: RemoteEditResponse,
        elapsed_ms: u64,
    ) -> EditSuccess {
        let confidence = match response.confidence {
            Some(c) if (0.0..=1.0).contains(&c) => Some(c),
            Some(c) => {
                warn!(confidence = c, "범위 밖 신뢰도 무시");
                None
            }
            None => None,
        };

        EditSuccess {
            edited_image_url: response.edited_image_url,
            edited_image_id: response.edited_image_id,
            metadata: EditMetadata {
                original_image_id: key.image_identity.clone(),
                prompt: request.instruction.clone(),
                processing_time_ms: elapsed_ms,
                confidence,
                model_version: response
                    .model_version
                    .unwrap_or_else(|| self.remote.model_name().to_string()),
                iterations: response.iterations.unwrap_or(request.options.iterations),
                image_size: ImageSize {
                    width: response.image_width,
                    height: response.image_height,
                    file_size: response.file_size,
                },
            },
        }
    }

    fn flight_lock(&self, key: &CacheKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut in_flight = self.in_flight.lock();
        Arc::clone(in_flight.entry(key.clone()).or_default())
    }

    /// 기다리는 다른 요청이 없으면 키 잠금 제거
    fn release_flight(&self, key: &CacheKey, flight: Arc<tokio::sync::Mutex<()>>) {
        let mut in_flight = self.in_flight.lock();
        // 맵 + 현재 보유분 = 2
        if Arc::strong_count(&flight) <= 2 {
            in_flight.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ContentCache;
    use crate::test_support::{response_for, tiny_png, FakeEditService, ManualClock};
    use retouch_core::config::CacheConfig;
    use retouch_core::models::edit::{EditOptions, ErrorCode};

    fn setup(remote: FakeEditService) -> (EditClient, Arc<FakeEditService>, Arc<ContentCache>) {
        let remote = Arc::new(remote);
        let cache = Arc::new(ContentCache::new(
            &CacheConfig::default(),
            Arc::new(ManualClock::new()),
        ));
        let client = EditClient::new(ImagePreprocessor::default(), cache.clone(), remote.clone());
        (client, remote, cache)
    }

    #[tokio::test]
    async fn identical_requests_call_remote_once() {
        let (client, remote, _) = setup(FakeEditService::succeeding());
        let request = EditRequest::new(tiny_png(1), "brighten");

        let first = client.edit(&request).await;
        let second = client.edit(&request).await;

        assert!(first.is_success());
        assert_eq!(first, second);
        assert_eq!(remote.calls(), 1);
    }

    #[tokio::test]
    async fn different_content_misses_cache() {
        let (client, remote, _) = setup(FakeEditService::succeeding());
        client.edit(&EditRequest::new(tiny_png(1), "brighten")).await;
        client.edit(&EditRequest::new(tiny_png(2), "brighten")).await;
        assert_eq!(remote.calls(), 2);
    }

    #[tokio::test]
    async fn empty_instruction_fails_without_network() {
        let (client, remote, _) = setup(FakeEditService::succeeding());
        let result = client.edit(&EditRequest::new(tiny_png(1), "   ")).await;

        let failure = result.failure().unwrap();
        assert_eq!(failure.code, ErrorCode::ValidationFailed);
        assert!(!failure.retryable);
        assert_eq!(remote.calls(), 0);
    }

    #[tokio::test]
    async fn zero_iterations_fails_validation() {
        let (client, remote, _) = setup(FakeEditService::succeeding());
        let request = EditRequest::new(tiny_png(1), "brighten").with_options(EditOptions {
            iterations: 0,
            ..EditOptions::default()
        });
        let result = client.edit(&request).await;
        assert_eq!(result.failure().unwrap().code, ErrorCode::ValidationFailed);
        assert_eq!(remote.calls(), 0);
    }

    #[tokio::test]
    async fn invalid_image_fails_without_network() {
        let (client, remote, _) = setup(FakeEditService::succeeding());
        let result = client
            .edit(&EditRequest::new(b"not an image".to_vec(), "brighten"))
            .await;
        assert_eq!(result.failure().unwrap().code, ErrorCode::ValidationFailed);
        assert_eq!(remote.calls(), 0);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let (client, remote, cache) = setup(FakeEditService::scripted(vec![Err(
            CoreError::from_status(503, "busy"),
        )]));
        let request = EditRequest::new(tiny_png(1), "brighten");

        let first = client.edit(&request).await;
        assert!(first.is_retryable());
        assert!(cache.is_empty());

        let second = client.edit(&request).await;
        assert!(second.is_success());
        assert_eq!(remote.calls(), 2);
    }

    #[tokio::test]
    async fn metadata_is_populated() {
        let mut response = response_for("brighten");
        response.confidence = None;
        let (client, _, _) = setup(FakeEditService::scripted(vec![Ok(response)]));
        let bytes = tiny_png(1);

        let result = client.edit(&EditRequest::new(bytes.clone(), "brighten")).await;
        let success = result.success().unwrap();

        assert_eq!(
            success.metadata.original_image_id,
            identity::content_identity(&bytes)
        );
        assert_eq!(success.metadata.prompt, "brighten");
        assert_eq!(success.metadata.model_version, "fake-model");
        assert_eq!(success.metadata.iterations, 1);
        assert!(success.metadata.confidence.is_none());
        assert_eq!(success.metadata.image_size.width, 64);
    }

    #[tokio::test]
    async fn out_of_range_confidence_is_dropped() {
        let mut response = response_for("brighten");
        response.confidence = Some(1.7);
        let (client, _, _) = setup(FakeEditService::scripted(vec![Ok(response)]));

        let result = client.edit(&EditRequest::new(tiny_png(1), "brighten")).await;
        assert!(result.success().unwrap().metadata.confidence.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_remote_times_out() {
        let (client, _, _) =
            setup(FakeEditService::succeeding().with_latency(Duration::from_secs(60)));
        let result = client.edit(&EditRequest::new(tiny_png(1), "brighten")).await;

        let failure = result.failure().unwrap();
        assert_eq!(failure.code, ErrorCode::Timeout);
        assert!(failure.retryable);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_identical_requests_single_flight() {
        let (client, remote, _) =
            setup(FakeEditService::succeeding().with_latency(Duration::from_millis(200)));
        let request = EditRequest::new(tiny_png(1), "brighten");

        let (a, b, c) = tokio::join!(
            client.edit(&request),
            client.edit(&request),
            client.edit(&request)
        );

        assert!(a.is_success() && b.is_success() && c.is_success());
        assert_eq!(remote.calls(), 1);
        assert!(client.in_flight.lock().is_empty());
    }
}
