//! # retouch-vision
//!
//! 편집 요청 전처리 크레이트.
//! 원격 전송 전 이미지 형식/크기 검증, 픽셀 예산 기반 다운스케일,
//! JPEG 재인코딩, 캐시 키용 콘텐츠 식별자 계산을 담당한다.
//! 네트워크나 재시도 없이 동기적으로 동작하는 순수 변환이다.

pub mod identity;
pub mod preprocessor;
pub mod resize;
