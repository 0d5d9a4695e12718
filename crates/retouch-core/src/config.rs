//! 애플리케이션 설정 구조체.
//!
//! 원격 편집 서비스, 전처리, 캐시, 재시도, 배치, 오프라인 큐, 저장소 설정을 정의한다.
//! `ConfigManager`가 JSON 파일에서 읽고 CLI 오버라이드를 적용한다.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 원격 편집 서비스 설정
    pub remote: RemoteConfig,
    /// 이미지 전처리 설정
    #[serde(default)]
    pub preprocess: PreprocessConfig,
    /// 콘텐츠 캐시 설정
    #[serde(default)]
    pub cache: CacheConfig,
    /// 재시도 정책
    #[serde(default)]
    pub retry: RetryConfig,
    /// 배치 편집 설정
    #[serde(default)]
    pub batch: BatchConfig,
    /// 오프라인 큐 설정
    #[serde(default)]
    pub queue: QueueConfig,
    /// 로컬 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,
}

// ============================================================
// 원격 서비스 설정
// ============================================================

/// 원격 편집 서비스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// 편집 엔드포인트 URL
    pub endpoint: String,
    /// API 키 (Bearer 토큰). 비어 있으면 서비스 생성 실패
    #[serde(default)]
    pub api_key: String,
    /// 모델 식별자
    #[serde(default = "default_model")]
    pub model: String,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// 클라이언트 식별 헤더 값
    #[serde(default = "default_client_name")]
    pub client_name: String,
    /// 클라이언트 버전 헤더 값
    #[serde(default = "default_client_version")]
    pub client_version: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/v1/images/edits".to_string(),
            api_key: String::new(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            client_name: default_client_name(),
            client_version: default_client_version(),
        }
    }
}

// ============================================================
// 전처리 설정
// ============================================================

/// 이미지 전처리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// 허용 최대 파일 크기 (바이트)
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
    /// 이 크기를 넘으면 다운스케일/재인코딩
    #[serde(default = "default_resize_threshold_bytes")]
    pub resize_threshold_bytes: usize,
    /// 다운스케일 목표 픽셀 수
    #[serde(default = "default_pixel_budget")]
    pub pixel_budget: u64,
    /// JPEG 재인코딩 품질 (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            resize_threshold_bytes: default_resize_threshold_bytes(),
            pixel_budget: default_pixel_budget(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

// ============================================================
// 캐시 설정
// ============================================================

/// 콘텐츠 캐시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// 최대 항목 수
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
    /// 만료 시간 (시간)
    #[serde(default = "default_cache_ttl_hours")]
    pub ttl_hours: u64,
    /// 용량 초과 시 한 번에 축출할 항목 수
    #[serde(default = "default_eviction_batch")]
    pub eviction_batch: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_max_entries(),
            ttl_hours: default_cache_ttl_hours(),
            eviction_batch: default_eviction_batch(),
        }
    }
}

/// 캐시 만료 시간 상한 (1년)
pub const MAX_CACHE_TTL_HOURS: u64 = 24 * 365;

impl CacheConfig {
    /// 만료 시간. 상한을 넘는 값은 상한으로 자른다.
    pub fn ttl(&self) -> chrono::Duration {
        let hours = self.ttl_hours.min(MAX_CACHE_TTL_HOURS) as i64;
        chrono::Duration::try_hours(hours).unwrap_or(chrono::Duration::zero())
    }
}

// ============================================================
// 재시도 / 배치 설정
// ============================================================

/// 재시도 정책 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// 최대 시도 횟수 (첫 시도 포함)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 첫 대기 시간 (밀리초). 이후 2배씩 증가
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// 대기 시간 상한 (밀리초)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// 지터 적용 여부 (기본 비활성)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: false,
        }
    }
}

/// 배치 편집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// 기본 동시 실행 수
    #[serde(default = "default_concurrency")]
    pub default_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            default_concurrency: default_concurrency(),
        }
    }
}

// ============================================================
// 오프라인 큐 / 저장소 설정
// ============================================================

/// 오프라인 큐 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// 한 웨이브에서 처리할 항목 수
    #[serde(default = "default_queue_batch_size")]
    pub batch_size: usize,
    /// 영구 실패로 판정하는 재시도 횟수
    #[serde(default = "default_queue_max_retries")]
    pub max_retries: u32,
    /// 남은 항목이 있을 때 후속 처리까지 대기 (밀리초)
    #[serde(default = "default_follow_up_delay_ms")]
    pub follow_up_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: default_queue_batch_size(),
            max_retries: default_queue_max_retries(),
            follow_up_delay_ms: default_follow_up_delay_ms(),
        }
    }
}

/// 로컬 저장소 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 오프라인 큐 DB 경로 (None이면 데이터 디렉토리 기본값)
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl AppConfig {
    /// 기본 설정
    pub fn default_config() -> Self {
        Self {
            remote: RemoteConfig::default(),
            preprocess: PreprocessConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            batch: BatchConfig::default(),
            queue: QueueConfig::default(),
            storage: StorageConfig::default(),
        }
    }

    /// 설정값 범위 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.remote.endpoint.trim().is_empty() {
            return Err(CoreError::Config("remote.endpoint가 비어 있음".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(CoreError::Config(
                "retry.max_attempts는 1 이상이어야 함".to_string(),
            ));
        }
        if self.cache.max_entries == 0 || self.cache.eviction_batch == 0 {
            return Err(CoreError::Config(
                "cache.max_entries/eviction_batch는 1 이상이어야 함".to_string(),
            ));
        }
        if self.cache.ttl_hours > MAX_CACHE_TTL_HOURS {
            return Err(CoreError::Config(format!(
                "cache.ttl_hours는 {MAX_CACHE_TTL_HOURS} 이하여야 함"
            )));
        }
        if self.queue.batch_size == 0 {
            return Err(CoreError::Config(
                "queue.batch_size는 1 이상이어야 함".to_string(),
            ));
        }
        if !(1..=100).contains(&self.preprocess.jpeg_quality) {
            return Err(CoreError::Config(
                "preprocess.jpeg_quality는 1-100 범위여야 함".to_string(),
            ));
        }
        Ok(())
    }

    /// 원격 요청 타임아웃을 Duration으로 반환
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs)
    }

    /// 캐시 만료 시간
    pub fn cache_ttl(&self) -> chrono::Duration {
        self.cache.ttl()
    }

    /// 오프라인 큐 후속 처리 대기 시간
    pub fn follow_up_delay(&self) -> Duration {
        Duration::from_millis(self.queue.follow_up_delay_ms)
    }
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_model() -> String {
    "image-edit-v1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_client_name() -> String {
    "retouch".to_string()
}

fn default_client_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_max_file_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_resize_threshold_bytes() -> usize {
    1024 * 1024
}

fn default_pixel_budget() -> u64 {
    1_000_000
}

fn default_jpeg_quality() -> u8 {
    80
}

fn default_cache_max_entries() -> usize {
    50
}

fn default_cache_ttl_hours() -> u64 {
    24
}

fn default_eviction_batch() -> usize {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    4_000
}

fn default_concurrency() -> usize {
    3
}

fn default_queue_batch_size() -> usize {
    5
}

fn default_queue_max_retries() -> u32 {
    3
}

fn default_follow_up_delay_ms() -> u64 {
    2_000
}
