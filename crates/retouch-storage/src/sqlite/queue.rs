//! 오프라인 편집 큐 저장 (QueueStore 포트 구현).
//!
//! 항목 하나 = 행 하나. 원본 이미지 바이트는 BLOB 컬럼에 그대로 저장한다.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use retouch_core::error::CoreError;
use retouch_core::models::edit::{EditOptions, EditRequest};
use retouch_core::models::queue::OfflineQueueEntry;
use retouch_core::ports::queue_store::QueueStore;
use tracing::{debug, warn};
use uuid::Uuid;

use super::SqliteQueueStore;

/// DB 행 (변환 전)
struct QueueRow {
    id: String,
    instruction: String,
    options: String,
    context: String,
    enqueued_at: String,
    retry_count: u32,
    image: Vec<u8>,
}

impl QueueRow {
    fn into_entry(self) -> Result<OfflineQueueEntry, CoreError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| CoreError::Storage(format!("큐 항목 ID 파싱 실패 ({}): {e}", self.id)))?;
        let options: EditOptions = serde_json::from_str(&self.options)?;
        let enqueued_at = DateTime::parse_from_rfc3339(&self.enqueued_at)
            .map_err(|e| CoreError::Storage(format!("enqueued_at 파싱 실패: {e}")))?
            .with_timezone(&Utc);

        Ok(OfflineQueueEntry {
            id,
            request: EditRequest {
                image_bytes: self.image,
                instruction: self.instruction,
                options,
            },
            context: self.context,
            enqueued_at,
            retry_count: self.retry_count,
        })
    }
}

impl SqliteQueueStore {
    /// 저장된 항목 수
    pub fn count(&self) -> Result<usize, CoreError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM offline_queue", [], |row| row.get(0))
            .map_err(|e| CoreError::Storage(format!("큐 항목 수 조회 실패: {e}")))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn insert(&self, entry: &OfflineQueueEntry) -> Result<(), CoreError> {
        let options = serde_json::to_string(&entry.request.options)?;
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR REPLACE INTO offline_queue
                (id, instruction, options, context, enqueued_at, retry_count, image)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                entry.id.to_string(),
                entry.request.instruction,
                options,
                entry.context,
                entry.enqueued_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
                entry.retry_count,
                entry.request.image_bytes,
            ],
        )
        .map_err(|e| CoreError::Storage(format!("큐 항목 저장 실패: {e}")))?;

        debug!(id = %entry.id, bytes = entry.request.image_bytes.len(), "큐 항목 저장");
        Ok(())
    }

    async fn update_retry_count(&self, id: Uuid, retry_count: u32) -> Result<(), CoreError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE offline_queue SET retry_count = ?1 WHERE id = ?2",
                rusqlite::params![retry_count, id.to_string()],
            )
            .map_err(|e| CoreError::Storage(format!("재시도 횟수 갱신 실패: {e}")))?;

        if updated == 0 {
            return Err(CoreError::NotFound {
                resource_type: "QueueEntry".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<(), CoreError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM offline_queue WHERE id = ?1",
            rusqlite::params![id.to_string()],
        )
        .map_err(|e| CoreError::Storage(format!("큐 항목 삭제 실패: {e}")))?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<OfflineQueueEntry>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, instruction, options, context, enqueued_at, retry_count, image
                 FROM offline_queue
                 ORDER BY enqueued_at ASC, rowid ASC",
            )
            .map_err(|e| CoreError::Storage(format!("쿼리 준비 실패: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(QueueRow {
                    id: row.get(0)?,
                    instruction: row.get(1)?,
                    options: row.get(2)?,
                    context: row.get(3)?,
                    enqueued_at: row.get(4)?,
                    retry_count: row.get(5)?,
                    image: row.get(6)?,
                })
            })
            .map_err(|e| CoreError::Storage(format!("큐 조회 실패: {e}")))?;

        let mut entries = Vec::new();
        for row in rows {
            let row = row.map_err(|e| CoreError::Storage(format!("행 읽기 실패: {e}")))?;
            // 손상된 행 하나 때문에 전체 복원이 막히지 않도록 건너뜀
            match row.into_entry() {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("손상된 큐 항목 건너뜀: {e}"),
            }
        }

        debug!(count = entries.len(), "큐 항목 로드");
        Ok(entries)
    }
}
