//! 편집 결과 캐시 포트.
//!
//! 구현: `retouch-edit` crate (`ContentCache`, 인메모리)

use crate::models::cache::{CacheKey, CacheStats};
use crate::models::edit::EditSuccess;

/// 콘텐츠 캐시: (이미지 식별자, 지시문) → 성공 결과
///
/// 성공 결과만 저장할 수 있도록 `EditSuccess`만 받는다.
/// 여러 편집 요청이 동시에 접근하므로 구현체는 내부 동기화를 책임진다.
pub trait EditCache: Send + Sync {
    /// 조회. 만료 항목은 삭제 후 미스로 취급한다.
    fn lookup(&self, key: &CacheKey) -> Option<EditSuccess>;

    /// 저장 (덮어쓰기). 용량 초과 시 오래된 항목을 일괄 축출한다.
    fn store(&self, key: CacheKey, result: EditSuccess);

    /// 현재 캐시 통계
    fn stats(&self) -> CacheStats;
}
