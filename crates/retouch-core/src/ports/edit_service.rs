//! 원격 이미지 편집 서비스 포트.
//!
//! 구현: `retouch-network` crate (reqwest multipart)
//! 원격 모델의 추론 자체는 불투명한 외부 서비스로 취급한다.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::edit::EditOptions;

/// 원격 서비스로 보내는 단일 편집 제출
#[derive(Debug, Clone, Copy)]
pub struct EditSubmission<'a> {
    /// 정규화된 이미지 바이트
    pub image: &'a [u8],
    /// 이미지 MIME 타입 (예: "image/jpeg")
    pub mime_type: &'a str,
    /// 편집 지시문
    pub instruction: &'a str,
    /// 편집 옵션
    pub options: &'a EditOptions,
}

/// 원격 서비스 성공 응답 (JSON 본문)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEditResponse {
    pub edited_image_url: String,
    pub edited_image_id: String,
    /// 서비스가 신뢰도를 주지 않으면 `None`
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub model_version: Option<String>,
    #[serde(default)]
    pub iterations: Option<u32>,
    #[serde(default)]
    pub image_width: u32,
    #[serde(default)]
    pub image_height: u32,
    #[serde(default)]
    pub file_size: u64,
}

/// 원격 이미지 편집 서비스
///
/// 호출 1회 = 네트워크 교환 1회. 재시도와 캐시는 호출자 책임이다.
/// 실패는 상태 코드를 보존한 `CoreError`로 반환해야 재시도 분류가 가능하다.
#[async_trait]
pub trait RemoteEditService: Send + Sync {
    /// 편집 요청 전송
    async fn submit(
        &self,
        submission: &EditSubmission<'_>,
    ) -> Result<RemoteEditResponse, CoreError>;

    /// 모델 식별자 (예: "image-edit-v2")
    fn model_name(&self) -> &str;
}
