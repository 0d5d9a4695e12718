//! SQLite 저장소 어댑터.
//!
//! `QueueStore` 포트 구현.
//!
//! # 모듈 구조
//! - `queue`: 오프라인 편집 큐 저장 (QueueStore 포트)

mod queue;

use retouch_core::error::CoreError;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use crate::migration;

/// SQLite 오프라인 큐 저장소: `QueueStore` 포트 구현
pub struct SqliteQueueStore {
    pub(super) conn: Mutex<Connection>,
}

impl SqliteQueueStore {
    /// 파일 기반 저장소 생성 (상위 디렉토리가 없으면 생성)
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| CoreError::Storage(format!("SQLite 열기 실패: {e}")))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            ",
        )
        .map_err(|e| CoreError::Storage(format!("PRAGMA 설정 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Storage(format!("마이그레이션 실패: {e}")))?;

        info!("오프라인 큐 저장소 초기화: {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// 인메모리 저장소 생성 (테스트용)
    pub fn open_in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CoreError::Storage(format!("인메모리 SQLite 생성 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Storage(format!("마이그레이션 실패: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(super) fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|e| CoreError::Internal(format!("잠금 획득 실패: {e}")))
    }
}
