//! 이미지 전처리기.
//!
//! 모든 편집 파이프라인의 첫 단계. 원격 전송 전에:
//! 1. 형식(허용 목록)과 크기(상한) 검증: 예외 대신 구조화된 사유 반환
//! 2. 임계 크기를 넘는 이미지는 픽셀 예산 이내로 다운스케일 후 JPEG 재인코딩
//!
//! 입력 바이트는 변경하지 않으며 항상 새 버퍼를 만든다.

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use retouch_core::config::PreprocessConfig;
use retouch_core::error::CoreError;
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

use crate::resize;

/// 허용되는 래스터 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
}

impl ImageFormat {
    /// `image` crate 형식 매핑 (허용 목록 밖이면 None)
    fn from_detected(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::WebP => Some(Self::WebP),
            image::ImageFormat::Gif => Some(Self::Gif),
            _ => None,
        }
    }

    fn as_image_format(&self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
            Self::WebP => image::ImageFormat::WebP,
            Self::Gif => image::ImageFormat::Gif,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Gif => "gif",
        }
    }
}

/// 검증 실패 사유
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("이미지 데이터가 비어 있음")]
    Empty,

    #[error("인식할 수 없는 이미지 형식")]
    UnknownFormat,

    #[error("지원하지 않는 이미지 형식: {0}")]
    UnsupportedFormat(String),

    #[error("이미지 크기 초과: {size} bytes (최대 {max} bytes)")]
    TooLarge { size: usize, max: usize },
}

impl ValidationError {
    /// 안정적인 에러 코드 (UI/로그용)
    pub fn code(&self) -> &'static str {
        match self {
            Self::Empty => "EMPTY_IMAGE",
            Self::UnknownFormat => "UNKNOWN_FORMAT",
            Self::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Self::TooLarge { .. } => "FILE_TOO_LARGE",
        }
    }
}

impl From<ValidationError> for CoreError {
    fn from(e: ValidationError) -> Self {
        CoreError::Validation {
            field: "image".to_string(),
            message: e.to_string(),
        }
    }
}

/// 정규화된 이미지: 원격 전송과 캐시 키 계산에 사용
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// 다운스케일/재인코딩 수행 여부
    pub transformed: bool,
}

/// 이미지 전처리기
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// 형식/크기 검증
    ///
    /// 매직 바이트로 형식을 판별하므로 파일명과 무관하다.
    pub fn validate(&self, bytes: &[u8]) -> Result<ImageFormat, ValidationError> {
        if bytes.is_empty() {
            return Err(ValidationError::Empty);
        }
        if bytes.len() > self.config.max_file_bytes {
            return Err(ValidationError::TooLarge {
                size: bytes.len(),
                max: self.config.max_file_bytes,
            });
        }

        let detected = image::guess_format(bytes).map_err(|_| ValidationError::UnknownFormat)?;
        ImageFormat::from_detected(detected)
            .ok_or_else(|| ValidationError::UnsupportedFormat(format!("{detected:?}")))
    }

    /// 정규화
    ///
    /// 임계 크기 이하면 바이트를 그대로 복사하고, 초과하면 디코딩 →
    /// (픽셀 예산 초과 시) 다운스케일 → JPEG 재인코딩한다.
    pub fn preprocess(&self, bytes: &[u8]) -> Result<NormalizedImage, CoreError> {
        let format = self.validate(bytes)?;

        if bytes.len() <= self.config.resize_threshold_bytes {
            let (width, height) = read_dimensions(bytes, format)?;
            return Ok(NormalizedImage {
                bytes: bytes.to_vec(),
                format,
                width,
                height,
                transformed: false,
            });
        }

        let decoded = image::load_from_memory_with_format(bytes, format.as_image_format())
            .map_err(|e| CoreError::Image(format!("이미지 디코딩 실패: {e}")))?;
        let (src_w, src_h) = (decoded.width(), decoded.height());
        let (width, height) = resize::fit_to_pixel_budget(src_w, src_h, self.config.pixel_budget);

        let target = if (width, height) == (src_w, src_h) {
            decoded
        } else {
            resize::fast_resize(&decoded, width, height)?
        };

        let encoded = encode_jpeg(&target, self.config.jpeg_quality)?;

        debug!(
            src_bytes = bytes.len(),
            dst_bytes = encoded.len(),
            "전처리: {}x{} → {}x{} (JPEG q{})",
            src_w,
            src_h,
            width,
            height,
            self.config.jpeg_quality
        );

        Ok(NormalizedImage {
            bytes: encoded,
            format: ImageFormat::Jpeg,
            width,
            height,
            transformed: true,
        })
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(PreprocessConfig::default())
    }
}

/// 디코딩 없이 헤더에서 크기만 읽기
fn read_dimensions(bytes: &[u8], format: ImageFormat) -> Result<(u32, u32), CoreError> {
    image::ImageReader::with_format(Cursor::new(bytes), format.as_image_format())
        .into_dimensions()
        .map_err(|e| CoreError::Image(format!("이미지 헤더 읽기 실패: {e}")))
}

/// JPEG 인코딩 (알파 채널 제거)
fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, CoreError> {
    let rgb = image.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&rgb)
        .map_err(|e| CoreError::Image(format!("JPEG 인코딩 실패: {e}")))?;
    Ok(buf)
}
