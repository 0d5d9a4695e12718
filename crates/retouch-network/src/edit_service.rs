//! 원격 이미지 편집 HTTP 클라이언트.
//!
//! `RemoteEditService` 포트 구현. 정규화된 이미지를 multipart로 전송하고
//! JSON 응답을 파싱한다. 재시도/캐시는 상위 계층(`retouch-edit`) 책임이며
//! 여기서는 상태 코드를 보존한 `CoreError` 매핑만 담당한다.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use retouch_core::config::RemoteConfig;
use retouch_core::error::CoreError;
use retouch_core::ports::edit_service::{EditSubmission, RemoteEditService, RemoteEditResponse};

/// 클라이언트 식별 헤더
const HEADER_CLIENT_NAME: &str = "X-Client-Name";
const HEADER_CLIENT_VERSION: &str = "X-Client-Version";

/// 에러 본문 로그/메시지 최대 길이
const MAX_ERROR_BODY_CHARS: usize = 200;

/// 서버 에러 응답 본문 `{ "message": ... }`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

// ============================================================
// HttpEditService: 원격 편집 API 클라이언트
// ============================================================

/// 원격 이미지 편집 API 클라이언트
///
/// `POST {endpoint}` multipart:
/// - `image`: 정규화된 이미지 (파일명/MIME은 형식에 따름)
/// - `prompt`, `model`, `preserve_aspect_ratio`, `quality`, `iterations`
///
/// **보안**: API 키는 메모리에만 유지하며 로그에 남기지 않는다.
pub struct HttpEditService {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    client_name: String,
    client_version: String,
    timeout: Duration,
}

impl std::fmt::Debug for HttpEditService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEditService")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpEditService {
    /// 설정으로부터 생성
    ///
    /// API 키가 비어 있으면 `CoreError::Config`.
    pub fn new(config: &RemoteConfig) -> Result<Self, CoreError> {
        if config.api_key.trim().is_empty() {
            return Err(CoreError::Config(
                "원격 편집 API 키 미설정. --api-key 또는 RETOUCH_API_KEY로 지정하세요.".into(),
            ));
        }
        if config.endpoint.trim().is_empty() {
            return Err(CoreError::Config("원격 편집 엔드포인트 미설정".into()));
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 생성 실패: {e}")))?;

        debug!(
            endpoint = %config.endpoint,
            model = %config.model,
            timeout_secs = config.timeout_secs,
            "HttpEditService 초기화"
        );

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            client_name: config.client_name.clone(),
            client_version: config.client_version.clone(),
            timeout,
        })
    }

    /// multipart 폼 구성
    fn build_form(&self, submission: &EditSubmission<'_>) -> Result<Form, CoreError> {
        let file_name = format!("image.{}", extension_for_mime(submission.mime_type));
        let image = Part::bytes(submission.image.to_vec())
            .file_name(file_name)
            .mime_str(submission.mime_type)
            .map_err(|e| CoreError::Internal(format!("잘못된 MIME 타입: {e}")))?;

        let options = submission.options;
        Ok(Form::new()
            .part("image", image)
            .text("prompt", submission.instruction.to_string())
            .text("model", self.model.clone())
            .text(
                "preserve_aspect_ratio",
                options.preserve_aspect_ratio.to_string(),
            )
            .text("quality", options.quality.as_str().to_string())
            .text("iterations", options.iterations.to_string()))
    }

    /// reqwest 전송 에러 → CoreError
    fn map_send_error(&self, e: reqwest::Error) -> CoreError {
        if e.is_timeout() {
            CoreError::ExecutionTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            CoreError::Network(format!("편집 요청 전송 실패: {e}"))
        }
    }

    /// 비성공 응답 → CoreError (상태 코드 보존)
    async fn error_from_response(response: reqwest::Response) -> CoreError {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let body = response.text().await.unwrap_or_else(|e| {
            warn!("응답 본문 읽기 실패: {e}");
            String::new()
        });
        let message = error_message(&body, status);

        warn!(status, message = %message, "원격 편집 오류 응답");

        match (CoreError::from_status(status, message), retry_after) {
            (CoreError::RateLimit { .. }, Some(secs)) => CoreError::RateLimit {
                retry_after_secs: secs,
            },
            (err, _) => err,
        }
    }
}

/// 에러 본문에서 메시지 추출: JSON `message` 우선, 없으면 잘린 원문
fn error_message(body: &str, status: u16) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "jpg",
    }
}

#[async_trait]
impl RemoteEditService for HttpEditService {
    async fn submit(
        &self,
        submission: &EditSubmission<'_>,
    ) -> Result<RemoteEditResponse, CoreError> {
        let form = self.build_form(submission)?;

        debug!(
            endpoint = %self.endpoint,
            image_size = submission.image.len(),
            mime = submission.mime_type,
            "원격 편집 요청"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header(HEADER_CLIENT_NAME, &self.client_name)
            .header(HEADER_CLIENT_VERSION, &self.client_version)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let parsed: RemoteEditResponse = serde_json::from_str(&body)
            .map_err(|e| CoreError::ResponseParse(format!("편집 응답 JSON 파싱 실패: {e}")))?;

        debug!(
            edited_image_id = %parsed.edited_image_id,
            confidence = ?parsed.confidence,
            "원격 편집 응답 수신"
        );
        Ok(parsed)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============================================================
// 테스트
// ============================================================
