//! 시계 포트.
//!
//! 캐시 만료와 큐 타임스탬프가 현재 시각을 직접 읽지 않도록 주입한다.
//! 테스트에서는 고정/이동 가능한 시계로 대체한다.

use chrono::{DateTime, Utc};

/// 현재 시각 제공자
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 시스템 시계
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
