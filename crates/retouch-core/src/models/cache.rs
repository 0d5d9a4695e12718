//! 콘텐츠 캐시 모델.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::edit::EditSuccess;

/// 캐시 키: (정규화 이미지 식별자, 지시문 해시)
///
/// 동일 바이트 + 동일 지시문은 항상 같은 키가 된다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// 정규화된 이미지 바이트의 콘텐츠 식별자
    pub image_identity: String,
    /// 지시문 텍스트 해시
    pub prompt_hash: String,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.image_identity, self.prompt_hash)
    }
}

/// 캐시 항목
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub result: EditSuccess,
    /// 저장 시각
    pub stored_at: DateTime<Utc>,
    /// 조회 적중 횟수
    pub access_count: u64,
}

/// 캐시 항목 요약 (통계용)
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntrySummary {
    pub key: String,
    pub stored_at: DateTime<Utc>,
    pub access_count: u64,
}

/// 캐시 통계
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// 현재 항목 수
    pub size: usize,
    /// 최대 항목 수
    pub max_size: usize,
    /// 저장 시각 오름차순 항목 목록
    pub entries: Vec<CacheEntrySummary>,
}
