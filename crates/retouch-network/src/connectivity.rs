//! 연결 상태 관리.
//!
//! 원격 편집 호출 결과로 온라인/오프라인을 판정한다.
//! 오프라인 큐 관리자는 `subscribe()` 수신기를 구독해 전환 시 큐를 비운다.

use parking_lot::Mutex;
use retouch_core::error::CoreError;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// 기본 오프라인 전환 임계값 (연속 전송 실패 횟수)
pub const DEFAULT_OFFLINE_THRESHOLD: u32 = 3;

/// 연결 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Online,
    /// 전송 실패가 누적되는 중 (아직 온라인 취급)
    Degraded,
    Offline,
}

impl ConnectionStatus {
    /// 편집 요청을 즉시 보낼 수 있는 상태인지
    pub fn is_online(&self) -> bool {
        !matches!(self, ConnectionStatus::Offline)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionStatus::Online => "online",
            ConnectionStatus::Degraded => "degraded",
            ConnectionStatus::Offline => "offline",
        };
        f.write_str(s)
    }
}

/// 연결 상태 관리자
///
/// 전송 계층 실패(`Network`, `ExecutionTimeout`)만 연결 실패로 센다.
/// 서버가 응답한 에러(4xx/5xx)는 연결 자체는 살아 있다는 뜻이다.
pub struct ConnectivityManager {
    status_tx: watch::Sender<ConnectionStatus>,
    consecutive_failures: AtomicU32,
    offline_threshold: u32,
    /// 사용자가 지정한 오프라인 모드 (--offline)
    forced_offline: AtomicBool,
    last_success: Mutex<Option<Instant>>,
}

impl ConnectivityManager {
    /// `offline_threshold`회 연속 전송 실패 시 오프라인 전환 (최소 1)
    pub fn new(offline_threshold: u32) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Online);
        Self {
            status_tx,
            consecutive_failures: AtomicU32::new(0),
            offline_threshold: offline_threshold.max(1),
            forced_offline: AtomicBool::new(false),
            last_success: Mutex::new(None),
        }
    }

    /// 현재 상태
    pub fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.status().is_online()
    }

    /// 상태 변경 수신기
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// 강제 오프라인 모드 전환
    ///
    /// 해제 시 즉시 온라인으로 복귀한다 (다음 호출 결과로 다시 판정).
    pub fn set_forced_offline(&self, forced: bool) {
        self.forced_offline.store(forced, Ordering::SeqCst);
        if forced {
            info!("강제 오프라인 모드 활성화");
            self.transition(ConnectionStatus::Offline);
        } else {
            info!("강제 오프라인 모드 해제");
            self.consecutive_failures.store(0, Ordering::SeqCst);
            self.transition(ConnectionStatus::Online);
        }
    }

    pub fn is_forced_offline(&self) -> bool {
        self.forced_offline.load(Ordering::SeqCst)
    }

    /// 원격 호출 결과 기록
    pub fn record<T>(&self, outcome: &Result<T, CoreError>) {
        match outcome {
            Ok(_) => self.record_success(),
            Err(e) if is_transport_failure(e) => self.record_failure(),
            // 서버가 응답함 → 연결은 정상
            Err(_) => self.record_success(),
        }
    }

    /// 연결 성공 기록
    pub fn record_success(&self) {
        if self.is_forced_offline() {
            return;
        }
        self.consecutive_failures.store(0, Ordering::SeqCst);
        *self.last_success.lock() = Some(Instant::now());
        if self.status() != ConnectionStatus::Online {
            info!("원격 편집 서비스 연결 복구: 온라인");
        }
        self.transition(ConnectionStatus::Online);
    }

    /// 전송 실패 기록: 임계값 도달 시 오프라인
    pub fn record_failure(&self) {
        if self.is_forced_offline() {
            return;
        }
        let count = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(count, "전송 실패 기록");

        if count >= self.offline_threshold {
            if self.status() != ConnectionStatus::Offline {
                warn!(count, "연속 전송 실패: 오프라인 전환 (편집 요청은 큐에 보관)");
            }
            self.transition(ConnectionStatus::Offline);
        } else {
            self.transition(ConnectionStatus::Degraded);
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// 마지막 성공 이후 경과 시간 (성공 기록이 없으면 None)
    pub fn since_last_success(&self) -> Option<Duration> {
        self.last_success.lock().map(|t| t.elapsed())
    }

    /// 값이 바뀔 때만 수신기에 통지
    fn transition(&self, next: ConnectionStatus) {
        self.status_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

impl Default for ConnectivityManager {
    fn default() -> Self {
        Self::new(DEFAULT_OFFLINE_THRESHOLD)
    }
}

fn is_transport_failure(error: &CoreError) -> bool {
    matches!(
        error,
        CoreError::Network(_) | CoreError::ExecutionTimeout { .. }
    )
}
