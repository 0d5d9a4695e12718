//! 오프라인 큐 영속 저장소 포트.
//!
//! 구현: `retouch-storage` crate (rusqlite)

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::queue::OfflineQueueEntry;

/// 오프라인 큐 저장소
///
/// 프로세스 재시작 후에도 대기 중인 편집이 사라지지 않도록
/// 이미지 바이트를 포함한 항목 전체를 저장한다.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// 항목 저장 (동일 ID면 덮어쓰기)
    async fn insert(&self, entry: &OfflineQueueEntry) -> Result<(), CoreError>;

    /// 재시도 횟수 갱신
    async fn update_retry_count(&self, id: Uuid, retry_count: u32) -> Result<(), CoreError>;

    /// 항목 삭제 (없으면 무시)
    async fn remove(&self, id: Uuid) -> Result<(), CoreError>;

    /// 저장된 모든 항목을 큐 진입 순서대로 로드
    async fn load_all(&self) -> Result<Vec<OfflineQueueEntry>, CoreError>;
}
