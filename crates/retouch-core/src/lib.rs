//! # retouch-core
//!
//! RETOUCH 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 모든 크레이트가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`]: 편집 요청/결과, 캐시, 오프라인 큐 데이터 구조체
//! - [`ports`]: Hexagonal Architecture 포트 인터페이스 (async_trait)
//! - [`error`]: 핵심 에러 타입 (thiserror) + 재시도 분류
//! - [`config`]: 애플리케이션 설정 구조체
//! - [`config_manager`]: 설정 파일 로드, 오버라이드 적용, 큐 DB 경로
//! - [`prompts`]: 맥락별 추천 지시문

pub mod config;
pub mod config_manager;
pub mod error;
pub mod models;
pub mod ports;
pub mod prompts;
