//! # retouch-storage
//!
//! 로컬 저장소 어댑터.
//! 오프라인 편집 큐를 SQLite에 영속화한다 (이미지 바이트 포함).
//! 스키마는 버전 기반 마이그레이션으로 관리한다.

pub mod migration;
pub mod sqlite;
