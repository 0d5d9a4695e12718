//! RETOUCH 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 이 에러 타입을 그대로 사용하거나 `#[from] CoreError`로 래핑한다.
//! 재시도 가능 여부 분류도 여기서 한 곳에 정의한다.

use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패: {field}: {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 네트워크 에러 (연결 실패, DNS 등)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 요청 타임아웃
    #[error("실행 타임아웃: {timeout_ms}ms 초과")]
    ExecutionTimeout {
        /// 초과된 타임아웃 시간 (밀리초)
        timeout_ms: u64,
    },

    /// 서비스 일시 불가 (5xx)
    #[error("서비스 일시 불가 ({status}): {message}")]
    ServiceUnavailable {
        /// HTTP 상태 코드
        status: u16,
        /// 서버 메시지
        message: String,
    },

    /// Rate Limit 초과 (429)
    #[error("요청 한도 초과, {retry_after_secs}초 후 재시도")]
    RateLimit {
        /// 재시도 대기 시간 (초)
        retry_after_secs: u64,
    },

    /// 클라이언트 요청 에러 (4xx)
    #[error("요청 거부 ({status}): {message}")]
    Http {
        /// HTTP 상태 코드
        status: u16,
        /// 서버 메시지
        message: String,
    },

    /// 응답 본문 파싱 실패
    #[error("응답 파싱 실패: {0}")]
    ResponseParse(String),

    /// 이미지 디코딩/인코딩 실패
    #[error("이미지 처리 실패: {0}")]
    Image(String),

    /// 로컬 저장소 에러
    #[error("저장소 에러: {0}")]
    Storage(String),

    /// 리소스를 찾을 수 없음
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "QueueEntry")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// 일시적 장애인지 판별 (재시도 대상)
    ///
    /// 네트워크 실패, 타임아웃, 5xx, 429만 재시도한다.
    /// 4xx와 검증/파싱 실패는 재시도해도 결과가 같다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::Network(_)
                | CoreError::ExecutionTimeout { .. }
                | CoreError::ServiceUnavailable { .. }
                | CoreError::RateLimit { .. }
        )
    }

    /// 원격 응답에서 유래한 에러의 HTTP 상태 코드
    pub fn status_code(&self) -> Option<u16> {
        match self {
            CoreError::ServiceUnavailable { status, .. } | CoreError::Http { status, .. } => {
                Some(*status)
            }
            CoreError::RateLimit { .. } => Some(429),
            _ => None,
        }
    }

    /// HTTP 상태 코드로부터 에러 생성
    ///
    /// 5xx → `ServiceUnavailable`, 429 → `RateLimit`, 그 외 → `Http`
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => CoreError::RateLimit {
                retry_after_secs: 60,
            },
            500..=599 => CoreError::ServiceUnavailable { status, message },
            _ => CoreError::Http { status, message },
        }
    }
}
