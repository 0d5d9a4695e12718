//! 재시도 컨트롤러.
//!
//! 편집 클라이언트 위에서 지수 백오프 재시도를 수행하고,
//! 여러 요청을 동시성 제한 청크 단위로 처리한다.
//!
//! 요청별 상태 전이:
//!
//! ```text
//! Pending → Attempting → Succeeded
//!                      → FailedRetryable → Waiting → Attempting ...
//!                      → FailedTerminal
//! ```

use futures::future::join_all;
use retouch_core::config::RetryConfig;
use retouch_core::error::CoreError;
use retouch_core::models::edit::{EditFailure, EditRequest, EditResult, ErrorCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::EditClient;

/// 재시도 정책
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// 계산된 대기 시간에 최대 50% 무작위 지연 추가
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter,
        }
    }

    /// `failed_attempt`번째 시도 실패 후 대기 시간
    ///
    /// `base * 2^(n-1)`, 상한 `max_delay`. 1000 → 2000 → 4000ms.
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        if self.jitter {
            let extra = delay.mul_f64(rand::random::<f64>() * 0.5);
            (delay + extra).min(self.max_delay)
        } else {
            delay
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// 요청별 재시도 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    Pending,
    Attempting { attempt: u32 },
    Succeeded { attempt: u32 },
    FailedRetryable { attempt: u32 },
    Waiting { attempt: u32, delay: Duration },
    FailedTerminal { attempt: u32 },
}

/// 상태 전이 관찰자 (진행 표시, 테스트 계측)
pub trait AttemptObserver: Send + Sync {
    fn on_transition(&self, instruction: &str, state: &RetryState);
}

/// 재시도 컨트롤러
pub struct RetryController {
    client: Arc<EditClient>,
    policy: RetryPolicy,
    observer: Option<Arc<dyn AttemptObserver>>,
}

impl RetryController {
    pub fn new(client: Arc<EditClient>, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn client(&self) -> &Arc<EditClient> {
        &self.client
    }

    fn transition(&self, request: &EditRequest, state: RetryState) {
        debug!(instruction = %request.instruction, ?state, "재시도 상태 전이");
        if let Some(observer) = &self.observer {
            observer.on_transition(&request.instruction, &state);
        }
    }

    /// 재시도 포함 편집
    ///
    /// 성공, 재시도 불가 실패, 시도 횟수 소진 중 먼저 오는 쪽의 결과를 반환한다.
    /// `Err`는 시도가 한 번도 없었을 때(시도 횟수 0 정책)만 발생한다.
    pub async fn edit_with_retry(&self, request: &EditRequest) -> Result<EditResult, CoreError> {
        self.transition(request, RetryState::Pending);

        let max_attempts = self.policy.max_attempts;
        for attempt in 1..=max_attempts {
            self.transition(request, RetryState::Attempting { attempt });
            let result = self.client.edit(request).await;

            if result.is_success() {
                self.transition(request, RetryState::Succeeded { attempt });
                return Ok(result);
            }

            if !result.is_retryable() || attempt == max_attempts {
                if result.is_retryable() {
                    warn!(
                        instruction = %request.instruction,
                        attempts = attempt,
                        "재시도 횟수 소진"
                    );
                }
                self.transition(request, RetryState::FailedTerminal { attempt });
                return Ok(result);
            }

            self.transition(request, RetryState::FailedRetryable { attempt });
            let delay = self.policy.delay_for(attempt);
            info!(
                instruction = %request.instruction,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "일시적 실패: 대기 후 재시도"
            );
            self.transition(request, RetryState::Waiting { attempt, delay });
            tokio::time::sleep(delay).await;
        }

        Err(CoreError::Internal(
            "재시도 정책의 최대 시도 횟수가 0이라 편집을 시도하지 않음".to_string(),
        ))
    }

    /// 배치 편집
    ///
    /// `concurrency`개씩 청크로 나눠 청크 내부는 동시에, 청크끼리는 순차로 처리한다.
    /// 결과는 입력 순서와 같고 길이도 항상 같다.
    pub async fn edit_batch(&self, requests: &[EditRequest], concurrency: usize) -> Vec<EditResult> {
        let concurrency = concurrency.max(1);
        let mut results = Vec::with_capacity(requests.len());

        for (index, chunk) in requests.chunks(concurrency).enumerate() {
            debug!(chunk = index, size = chunk.len(), "배치 청크 처리");
            let outcomes = join_all(chunk.iter().map(|r| self.edit_with_retry(r))).await;
            results.extend(outcomes.into_iter().map(|outcome| {
                outcome.unwrap_or_else(|e| {
                    EditResult::Failure(EditFailure {
                        code: ErrorCode::Internal,
                        message: e.to_string(),
                        retryable: false,
                    })
                })
            }));
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        info!(total = results.len(), succeeded, concurrency, "배치 편집 완료");
        results
    }
}
