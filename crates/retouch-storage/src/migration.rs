//! 스키마 마이그레이션.
//!
//! 버전 기반 SQLite 스키마 관리.

use rusqlite::Connection;
use tracing::{debug, info};

/// 현재 스키마 버전
pub const CURRENT_VERSION: u32 = 2;

/// 스키마 마이그레이션 실행
pub fn run_migrations(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current = get_version(conn)?;
    info!("현재 스키마 버전: {current}, 목표: {CURRENT_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }

    if current < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// 현재 스키마 버전 조회
fn get_version(conn: &Connection) -> Result<u32, rusqlite::Error> {
    let result: Result<u32, _> = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    );
    result.or(Ok(0))
}

/// V1: offline_queue 테이블
fn migrate_v1(conn: &Connection) -> Result<(), rusqlite::Error> {
    debug!("마이그레이션 V1 실행: offline_queue 테이블");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS offline_queue (
            id TEXT PRIMARY KEY,
            instruction TEXT NOT NULL,
            options TEXT NOT NULL,
            context TEXT NOT NULL,
            enqueued_at TEXT NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0,
            image BLOB NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )?;

    Ok(())
}

/// V2: 진입 순서 조회 인덱스
fn migrate_v2(conn: &Connection) -> Result<(), rusqlite::Error> {
    debug!("마이그레이션 V2 실행: enqueued_at 인덱스");

    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_offline_queue_enqueued_at
            ON offline_queue(enqueued_at);

        INSERT INTO schema_version (version) VALUES (2);
        ",
    )?;

    Ok(())
}
