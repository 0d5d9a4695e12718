//! # retouch-edit
//!
//! 이미지 편집 오케스트레이션.
//!
//! - [`cache`]: (이미지, 지시문) → 성공 결과 콘텐츠 캐시 (TTL + 일괄 축출)
//! - [`client`]: 검증 → 전처리 → 캐시 조회 → 원격 호출 1회
//! - [`retry`]: 지수 백오프 재시도 + 동시성 제한 배치
//! - [`offline_queue`]: 오프라인 편집 보관/재전송
//! - [`editor`]: 위 구성요소를 소유하는 최상위 진입점

pub mod cache;
pub mod client;
pub mod editor;
pub mod offline_queue;
pub mod retry;

#[cfg(test)]
pub(crate) mod test_support;
