//! 오프라인 큐 관리자.
//!
//! 연결이 없을 때 만든 편집 요청을 보관했다가 온라인 전환 시 재전송한다.
//! - 항목은 큐 진입 즉시 `QueueStore`에 영속화 (이미지 바이트 포함)
//! - 한 번에 `batch_size`개씩(웨이브) 재시도 컨트롤러로 처리
//! - 실패 시 `retry_count` 증가, `max_retries` 도달 시 영구 실패로 제거
//! - 남은 항목이 있으면 후속 처리를 예약 (오프라인 전환 시 취소)
//!
//! 동시에 하나의 드레인만 실행되므로 같은 항목이 두 번 전송되지 않는다.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use retouch_core::config::QueueConfig;
use retouch_core::error::CoreError;
use retouch_core::models::edit::{EditFailure, EditRequest, EditResult};
use retouch_core::models::queue::{OfflineQueueEntry, QueueEvent, QueueStatus};
use retouch_core::ports::clock::Clock;
use retouch_core::ports::queue_store::QueueStore;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::retry::RetryController;

/// 이벤트 채널 용량
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// 한 번의 드레인 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// 이번 웨이브에서 처리한 항목 수
    pub processed: usize,
    pub completed: usize,
    /// 실패 후 다시 큐에 넣은 수
    pub requeued: usize,
    pub permanently_failed: usize,
    /// 웨이브 이후 남은 항목 수
    pub remaining: usize,
}

/// 메모리 큐 상태
///
/// 웨이브로 꺼낸 항목은 결과가 나올 때까지 `in_flight`에 남아
/// 상태 조회와 복원에서 계속 큐의 일부로 취급된다.
#[derive(Default)]
struct QueueState {
    pending: VecDeque<OfflineQueueEntry>,
    /// 전송 중인 항목 ID → 큐 진입 시각
    in_flight: HashMap<Uuid, DateTime<Utc>>,
}

impl QueueState {
    fn len(&self) -> usize {
        self.pending.len() + self.in_flight.len()
    }

    fn contains(&self, id: Uuid) -> bool {
        self.in_flight.contains_key(&id) || self.pending.iter().any(|e| e.id == id)
    }

    fn oldest(&self) -> Option<DateTime<Utc>> {
        self.pending
            .iter()
            .map(|e| e.enqueued_at)
            .chain(self.in_flight.values().copied())
            .min()
    }
}

/// 드레인 플래그 해제 가드
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 오프라인 큐 관리자
pub struct OfflineQueueManager {
    retry: Arc<RetryController>,
    store: Arc<dyn QueueStore>,
    clock: Arc<dyn Clock>,
    batch_size: usize,
    max_retries: u32,
    follow_up_delay: Duration,
    state: Mutex<QueueState>,
    online: AtomicBool,
    draining: AtomicBool,
    events: broadcast::Sender<QueueEvent>,
    follow_up: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl OfflineQueueManager {
    pub fn new(
        retry: Arc<RetryController>,
        store: Arc<dyn QueueStore>,
        clock: Arc<dyn Clock>,
        config: &QueueConfig,
        online: bool,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            retry,
            store,
            clock,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries.max(1),
            follow_up_delay: Duration::from_millis(config.follow_up_delay_ms),
            state: Mutex::new(QueueState::default()),
            online: AtomicBool::new(online),
            draining: AtomicBool::new(false),
            events,
            follow_up: parking_lot::Mutex::new(None),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// 큐 이벤트 구독
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: QueueEvent) {
        // 구독자가 없으면 무시
        let _ = self.events.send(event);
    }

    /// 편집 요청을 큐에 추가
    ///
    /// 영속화에 성공해야 메모리 큐에 들어간다.
    pub async fn enqueue(
        &self,
        request: EditRequest,
        context: impl Into<String>,
    ) -> Result<Uuid, CoreError> {
        request.validate_fields()?;

        let entry = OfflineQueueEntry::new(request, context, self.clock.now());
        self.store.insert(&entry).await?;

        let id = entry.id;
        let context = entry.context.clone();
        let queue_length = {
            let mut state = self.state.lock().await;
            state.pending.push_back(entry);
            state.len()
        };

        info!(%id, context = %context, queue_length, "오프라인 큐에 편집 요청 추가");
        self.emit(QueueEvent::Enqueued { id, context });
        Ok(id)
    }

    /// 저장소에서 항목 복원 (시작 시)
    ///
    /// 이미 메모리에 있거나 전송 중인 항목은 건너뛴다. 복원된 수를 반환.
    pub async fn restore(&self) -> Result<usize, CoreError> {
        let persisted = self.store.load_all().await?;
        let mut state = self.state.lock().await;

        let mut restored = 0;
        for entry in persisted {
            if state.contains(entry.id) {
                continue;
            }
            state.pending.push_back(entry);
            restored += 1;
        }

        if restored > 0 {
            info!(restored, "오프라인 큐 복원");
        }
        Ok(restored)
    }

    /// 큐 상태 스냅샷 (전송 중인 항목 포함)
    pub async fn queue_status(&self) -> QueueStatus {
        let state = self.state.lock().await;
        QueueStatus {
            queue_length: state.len(),
            oldest_request_timestamp: state.oldest(),
            is_online: self.is_online(),
        }
    }

    /// 한 웨이브 처리
    ///
    /// 오프라인이거나 이미 드레인 중이면 아무것도 하지 않는다.
    /// 남은 항목이 있고 여전히 온라인이면 후속 드레인을 예약한다.
    pub async fn process_queue(self: &Arc<Self>) -> DrainReport {
        if !self.is_online() {
            debug!("오프라인: 큐 처리 건너뜀");
            return DrainReport::default();
        }
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("이미 큐 처리 중: 건너뜀");
            return DrainReport::default();
        }

        let report = {
            let _guard = DrainGuard(&self.draining);
            self.drain_wave().await
        };

        if report.processed > 0 {
            info!(
                processed = report.processed,
                completed = report.completed,
                requeued = report.requeued,
                permanently_failed = report.permanently_failed,
                remaining = report.remaining,
                "오프라인 큐 웨이브 처리 완료"
            );
        }

        if report.remaining > 0 && self.is_online() {
            self.schedule_follow_up();
        }
        report
    }

    async fn drain_wave(&self) -> DrainReport {
        let wave: Vec<OfflineQueueEntry> = {
            let mut state = self.state.lock().await;
            let n = self.batch_size.min(state.pending.len());
            let wave: Vec<_> = state.pending.drain(..n).collect();
            for entry in &wave {
                state.in_flight.insert(entry.id, entry.enqueued_at);
            }
            wave
        };

        let mut report = DrainReport {
            processed: wave.len(),
            ..DrainReport::default()
        };
        if wave.is_empty() {
            return report;
        }

        let outcomes = join_all(
            wave.iter()
                .map(|entry| self.retry.edit_with_retry(&entry.request)),
        )
        .await;

        let mut requeue = Vec::new();
        for (mut entry, outcome) in wave.into_iter().zip(outcomes) {
            let result = outcome
                .unwrap_or_else(|e| EditResult::Failure(EditFailure::from_error(&e)));

            match result {
                EditResult::Success(_) => {
                    self.forget(entry.id).await;
                    report.completed += 1;
                    self.emit(QueueEvent::Completed {
                        id: entry.id,
                        context: entry.context,
                        result,
                    });
                }
                EditResult::Failure(failure) => {
                    entry.retry_count += 1;
                    if entry.retry_count >= self.max_retries {
                        warn!(
                            id = %entry.id,
                            retry_count = entry.retry_count,
                            code = %failure.code,
                            "오프라인 큐 항목 영구 실패"
                        );
                        self.forget(entry.id).await;
                        report.permanently_failed += 1;
                        self.emit(QueueEvent::PermanentlyFailed {
                            id: entry.id,
                            context: entry.context,
                            failure,
                        });
                    } else {
                        debug!(
                            id = %entry.id,
                            retry_count = entry.retry_count,
                            "큐 항목 처리 실패: 재대기"
                        );
                        if let Err(e) = self
                            .store
                            .update_retry_count(entry.id, entry.retry_count)
                            .await
                        {
                            warn!(id = %entry.id, "재시도 횟수 저장 실패: {e}");
                        }
                        report.requeued += 1;
                        requeue.push(entry);
                    }
                }
            }
        }

        let mut state = self.state.lock().await;
        state.in_flight.clear();
        state.pending.extend(requeue);
        report.remaining = state.len();
        report
    }

    /// 저장소에서 삭제 (실패는 로그만)
    async fn forget(&self, id: Uuid) {
        if let Err(e) = self.store.remove(id).await {
            warn!(%id, "큐 항목 삭제 실패: {e}");
        }
    }

    /// 후속 드레인 예약 (기존 예약은 교체)
    fn schedule_follow_up(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let delay = self.follow_up_delay;
        debug!(delay_ms = delay.as_millis() as u64, "후속 큐 처리 예약");

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(this) = weak.upgrade() else {
                return;
            };
            // 실행이 시작되면 더 이상 취소 대상이 아님
            {
                let mut slot = this.follow_up.lock();
                slot.take();
                if !this.is_online() {
                    return;
                }
            }
            this.process_queue().await;
        });

        if let Some(previous) = self.follow_up.lock().replace(handle) {
            previous.abort();
        }
    }

    fn cancel_follow_up(&self) {
        if let Some(handle) = self.follow_up.lock().take() {
            handle.abort();
            debug!("예약된 후속 큐 처리 취소");
        }
    }

    /// 후속 처리가 예약되어 있는지
    pub fn has_scheduled_follow_up(&self) -> bool {
        self.follow_up.lock().is_some()
    }

    /// 연결 상태 전환
    ///
    /// 오프라인 → 온라인이면 즉시 한 웨이브를 처리한다.
    /// 온라인 → 오프라인이면 예약된 후속 처리를 취소한다.
    pub async fn set_online(self: &Arc<Self>, online: bool) -> DrainReport {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        match (was_online, online) {
            (false, true) => {
                info!("온라인 전환: 오프라인 큐 처리 시작");
                self.process_queue().await
            }
            (true, false) => {
                info!("오프라인 전환: 편집 요청은 큐에 보관");
                self.cancel_follow_up();
                DrainReport::default()
            }
            _ => DrainReport::default(),
        }
    }

    /// 연결 상태 수신기 구독
    ///
    /// 값이 바뀔 때마다 `is_online`으로 판정해 `set_online`을 호출한다.
    /// 관리자가 해제되거나 송신측이 닫히면 종료된다.
    pub fn watch_connectivity<S, F>(
        self: &Arc<Self>,
        mut status: watch::Receiver<S>,
        is_online: F,
    ) -> JoinHandle<()>
    where
        S: Send + Sync + 'static,
        F: Fn(&S) -> bool + Send + 'static,
    {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let online = is_online(&status.borrow_and_update());
                match weak.upgrade() {
                    Some(this) => {
                        this.set_online(online).await;
                    }
                    None => break,
                }
                if status.changed().await.is_err() {
                    break;
                }
            }
            debug!("연결 상태 구독 종료");
        })
    }
}

impl Drop for OfflineQueueManager {
    fn drop(&mut self) {
        if let Some(handle) = self.follow_up.get_mut().take() {
            handle.abort();
        }
    }
}
