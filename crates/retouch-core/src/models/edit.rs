//! 이미지 편집 요청/결과 모델.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// 출력 품질
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// 표준 품질
    Standard,
    /// 고품질 (기본값)
    #[default]
    High,
}

impl Quality {
    /// 원격 API 전송용 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Standard => "standard",
            Quality::High => "high",
        }
    }
}

/// 편집 옵션
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOptions {
    /// 종횡비 유지 여부
    #[serde(default = "default_true")]
    pub preserve_aspect_ratio: bool,
    /// 출력 품질
    #[serde(default)]
    pub quality: Quality,
    /// 반복 횟수 (1 이상)
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            preserve_aspect_ratio: true,
            quality: Quality::High,
            iterations: 1,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_iterations() -> u32 {
    1
}

/// 편집 요청: 작업 단위
///
/// 원본 바이트는 요청이 소유하며 전처리기는 새 버퍼를 만든다.
#[derive(Clone, PartialEq, Eq)]
pub struct EditRequest {
    /// 원본 이미지 바이트
    pub image_bytes: Vec<u8>,
    /// 편집 지시문
    pub instruction: String,
    /// 편집 옵션
    pub options: EditOptions,
}

impl EditRequest {
    /// 새 편집 요청 생성
    pub fn new(image_bytes: Vec<u8>, instruction: impl Into<String>) -> Self {
        Self {
            image_bytes,
            instruction: instruction.into(),
            options: EditOptions::default(),
        }
    }

    /// 옵션 지정
    pub fn with_options(mut self, options: EditOptions) -> Self {
        self.options = options;
        self
    }

    /// 이미지와 무관한 필드 검증 (지시문, 반복 횟수)
    pub fn validate_fields(&self) -> Result<(), CoreError> {
        if self.instruction.trim().is_empty() {
            return Err(CoreError::Validation {
                field: "instruction".to_string(),
                message: "편집 지시문이 비어 있음".to_string(),
            });
        }
        if self.options.iterations == 0 {
            return Err(CoreError::Validation {
                field: "iterations".to_string(),
                message: "반복 횟수는 1 이상이어야 함".to_string(),
            });
        }
        Ok(())
    }
}

// 이미지 바이트 전체를 로그에 찍지 않도록 길이만 출력
impl fmt::Debug for EditRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditRequest")
            .field("image_bytes", &format_args!("{} bytes", self.image_bytes.len()))
            .field("instruction", &self.instruction)
            .field("options", &self.options)
            .finish()
    }
}

/// 결과 이미지 크기
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
    /// 파일 크기 (바이트)
    pub file_size: u64,
}

/// 편집 결과 메타데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditMetadata {
    /// 정규화된 원본 이미지의 콘텐츠 식별자
    pub original_image_id: String,
    /// 사용된 지시문
    pub prompt: String,
    /// 처리 시간 (밀리초, 요청 시작부터 응답 수신까지)
    pub processing_time_ms: u64,
    /// 신뢰도 (0.0 ~ 1.0). `None`이면 서비스가 제공하지 않은 "알 수 없음"
    pub confidence: Option<f64>,
    /// 모델 버전
    pub model_version: String,
    /// 실제 수행된 반복 횟수
    pub iterations: u32,
    /// 결과 이미지 크기
    pub image_size: ImageSize,
}

/// 성공 결과: 캐시에 저장되는 유일한 형태
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditSuccess {
    pub edited_image_url: String,
    pub edited_image_id: String,
    pub metadata: EditMetadata,
}

/// 실패 코드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// 입력 검증 실패 (네트워크 미도달)
    ValidationFailed,
    /// 타임아웃
    Timeout,
    /// 연결 실패
    NetworkError,
    /// 5xx
    ServerError,
    /// 429
    RateLimited,
    /// 4xx
    ClientError,
    /// 응답 형식 오류
    InvalidResponse,
    /// 그 외
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::ServerError => "SERVER_ERROR",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::ClientError => "CLIENT_ERROR",
            ErrorCode::InvalidResponse => "INVALID_RESPONSE",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 실패 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditFailure {
    pub code: ErrorCode,
    pub message: String,
    /// 재시도 가능 여부
    pub retryable: bool,
}

impl EditFailure {
    /// 입력 검증 실패 (항상 재시도 불가)
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            retryable: false,
        }
    }

    /// 코어 에러를 실패 결과로 분류
    pub fn from_error(error: &CoreError) -> Self {
        let code = match error {
            CoreError::Validation { .. } | CoreError::Image(_) => ErrorCode::ValidationFailed,
            CoreError::ExecutionTimeout { .. } => ErrorCode::Timeout,
            CoreError::Network(_) => ErrorCode::NetworkError,
            CoreError::ServiceUnavailable { .. } => ErrorCode::ServerError,
            CoreError::RateLimit { .. } => ErrorCode::RateLimited,
            CoreError::Http { .. } => ErrorCode::ClientError,
            CoreError::ResponseParse(_) | CoreError::Serialization(_) => {
                ErrorCode::InvalidResponse
            }
            _ => ErrorCode::Internal,
        };
        Self {
            code,
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

/// 편집 시도 결과: 생성 후 변경되지 않음
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EditResult {
    Success(EditSuccess),
    Failure(EditFailure),
}

impl EditResult {
    pub fn is_success(&self) -> bool {
        matches!(self, EditResult::Success(_))
    }

    /// 실패이면서 재시도 가능한지
    pub fn is_retryable(&self) -> bool {
        match self {
            EditResult::Success(_) => false,
            EditResult::Failure(f) => f.retryable,
        }
    }

    pub fn success(&self) -> Option<&EditSuccess> {
        match self {
            EditResult::Success(s) => Some(s),
            EditResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&EditFailure> {
        match self {
            EditResult::Success(_) => None,
            EditResult::Failure(f) => Some(f),
        }
    }
}

impl From<EditFailure> for EditResult {
    fn from(failure: EditFailure) -> Self {
        EditResult::Failure(failure)
    }
}

impl From<EditSuccess> for EditResult {
    fn from(success: EditSuccess) -> Self {
        EditResult::Success(success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_defaults() {
        let opts = EditOptions::default();
        assert!(opts.preserve_aspect_ratio);
        assert_eq!(opts.quality, Quality::High);
        assert_eq!(opts.iterations, 1);

        // 누락 필드는 기본값으로 채워짐
        let parsed: EditOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, opts);
    }

    #[test]
    fn empty_instruction_rejected() {
        let req = EditRequest::new(vec![1, 2, 3], "   ");
        assert!(req.validate_fields().is_err());

        let req = EditRequest::new(vec![1, 2, 3], "brighten");
        assert!(req.validate_fields().is_ok());
    }

    #[test]
    fn zero_iterations_rejected() {
        let req = EditRequest::new(vec![1], "brighten").with_options(EditOptions {
            iterations: 0,
            ..EditOptions::default()
        });
        assert!(req.validate_fields().is_err());
    }

    #[test]
    fn debug_hides_image_bytes() {
        let req = EditRequest::new(vec![0u8; 4096], "crop");
        let dbg = format!("{req:?}");
        assert!(dbg.contains("4096 bytes"));
        assert!(!dbg.contains("0, 0, 0"));
    }

    #[test]
    fn failure_classification_from_error() {
        let f = EditFailure::from_error(&CoreError::from_status(404, "missing"));
        assert_eq!(f.code, ErrorCode::ClientError);
        assert!(!f.retryable);

        let f = EditFailure::from_error(&CoreError::from_status(503, "busy"));
        assert_eq!(f.code, ErrorCode::ServerError);
        assert!(f.retryable);

        let f = EditFailure::from_error(&CoreError::ExecutionTimeout { timeout_ms: 30_000 });
        assert_eq!(f.code, ErrorCode::Timeout);
        assert!(f.retryable);
    }

    #[test]
    fn result_serializes_with_status_tag() {
        let result = EditResult::from(EditFailure::validation("bad image"));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["code"], "VALIDATION_FAILED");
        assert_eq!(json["retryable"], false);
    }
}
