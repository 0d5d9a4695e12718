//! 오프라인 큐 모델.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::edit::{EditFailure, EditRequest, EditResult};

/// 오프라인 큐 항목
///
/// 오프라인 큐 관리자가 단독 소유하며, 이미지 바이트까지 영속화된다.
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineQueueEntry {
    pub id: Uuid,
    pub request: EditRequest,
    /// 요청이 발생한 사용 맥락 (예: "field-log")
    pub context: String,
    pub enqueued_at: DateTime<Utc>,
    /// 큐 처리 실패 횟수
    pub retry_count: u32,
}

impl OfflineQueueEntry {
    /// 새 항목 생성
    pub fn new(request: EditRequest, context: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            context: context.into(),
            enqueued_at: now,
            retry_count: 0,
        }
    }
}

/// 큐 상태 스냅샷
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub queue_length: usize,
    /// 가장 오래된 요청의 큐 진입 시각
    pub oldest_request_timestamp: Option<DateTime<Utc>>,
    pub is_online: bool,
}

/// 큐 이벤트: UI 배지 등 관찰자에게 전달
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// 큐에 추가됨
    Enqueued { id: Uuid, context: String },
    /// 처리 완료 (큐에서 제거됨)
    Completed {
        id: Uuid,
        context: String,
        result: EditResult,
    },
    /// 재시도 한도 초과로 영구 실패 (큐에서 제거됨)
    PermanentlyFailed {
        id: Uuid,
        context: String,
        failure: EditFailure,
    },
}

impl QueueEvent {
    /// 이벤트 대상 항목 ID
    pub fn id(&self) -> Uuid {
        match self {
            QueueEvent::Enqueued { id, .. }
            | QueueEvent::Completed { id, .. }
            | QueueEvent::PermanentlyFailed { id, .. } => *id,
        }
    }
}
