//! 설정 파일 로드와 실행 설정 결정.
//!
//! 플랫폼 설정 디렉토리의 `config.json`을 읽고(없으면 기본값으로 생성),
//! CLI 오버라이드를 덮어쓴 뒤 검증된 `AppConfig`를 돌려준다.
//! 오프라인 큐 DB 경로도 여기서 정한다.

use crate::config::AppConfig;
use crate::error::CoreError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 설정 파일 이름
const CONFIG_FILE_NAME: &str = "config.json";

/// 오프라인 큐 DB 파일 이름
pub const DB_FILE_NAME: &str = "retouch.db";

/// 앱 디렉토리 이름
const APP_DIR_NAME: &str = "retouch";

/// 설정 파일보다 우선하는 값 (CLI 인자 / 환경 변수)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// 큐 DB를 둘 디렉토리
    pub data_dir: Option<PathBuf>,
}

/// 설정 관리자
#[derive(Debug, Clone)]
pub struct ConfigManager {
    file_config: AppConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    /// 설정 파일 열기
    ///
    /// 경로가 없으면 플랫폼 기본 경로를 쓴다.
    /// 파일이 없으면 기본 설정으로 만든다.
    pub fn open(config_path: Option<PathBuf>) -> Result<Self, CoreError> {
        let config_path = match config_path {
            Some(path) => path,
            None => config_dir()?.join(CONFIG_FILE_NAME),
        };

        let file_config = if config_path.exists() {
            load_from_file(&config_path)?
        } else {
            let defaults = AppConfig::default_config();
            write_defaults(&config_path, &defaults)?;
            defaults
        };

        Ok(Self {
            file_config,
            config_path,
        })
    }

    /// 파일에서 읽은 설정 (오버라이드 전)
    pub fn file_config(&self) -> &AppConfig {
        &self.file_config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 오버라이드 적용 후 검증된 실행 설정
    ///
    /// 빈 문자열 오버라이드는 무시한다.
    pub fn resolve(&self, overrides: &ConfigOverrides) -> Result<AppConfig, CoreError> {
        let mut config = self.file_config.clone();

        if let Some(endpoint) = non_empty(&overrides.endpoint) {
            debug!(endpoint, "엔드포인트 오버라이드");
            config.remote.endpoint = endpoint.to_string();
        }
        if let Some(api_key) = non_empty(&overrides.api_key) {
            config.remote.api_key = api_key.to_string();
        }
        if let Some(dir) = &overrides.data_dir {
            config.storage.db_path = Some(dir.join(DB_FILE_NAME));
        }

        config.validate()?;
        Ok(config)
    }

    /// 오프라인 큐 DB 경로 (설정값 → 플랫폼 데이터 디렉토리)
    pub fn queue_db_path(config: &AppConfig) -> Result<PathBuf, CoreError> {
        match &config.storage.db_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join(DB_FILE_NAME)),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[cfg(any(target_os = "macos", target_os = "linux"))]
fn home_dir() -> Result<PathBuf, CoreError> {
    std::env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| CoreError::Config("HOME 환경 변수를 찾을 수 없습니다".to_string()))
}

/// 플랫폼별 설정 디렉토리
fn config_dir() -> Result<PathBuf, CoreError> {
    #[cfg(target_os = "macos")]
    {
        Ok(home_dir()?
            .join("Library")
            .join("Application Support")
            .join(APP_DIR_NAME))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA")
            .map_err(|_| CoreError::Config("APPDATA 환경 변수를 찾을 수 없습니다".to_string()))?;
        Ok(PathBuf::from(appdata).join(APP_DIR_NAME))
    }

    #[cfg(target_os = "linux")]
    {
        Ok(home_dir()?.join(".config").join(APP_DIR_NAME))
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        warn!("지원되지 않는 플랫폼, 현재 디렉토리 사용");
        Ok(PathBuf::from(".").join(APP_DIR_NAME))
    }
}

/// 플랫폼별 데이터 디렉토리 (큐 DB)
fn data_dir() -> Result<PathBuf, CoreError> {
    #[cfg(target_os = "linux")]
    {
        Ok(home_dir()?.join(".local").join("share").join(APP_DIR_NAME))
    }

    #[cfg(not(target_os = "linux"))]
    {
        config_dir().map(|p| p.join("data"))
    }
}

fn load_from_file(path: &Path) -> Result<AppConfig, CoreError> {
    let content = fs::read_to_string(path).map_err(|e| {
        CoreError::Config(format!("설정 파일 읽기 실패: {}: {}", path.display(), e))
    })?;
    let config: AppConfig = serde_json::from_str(&content).map_err(|e| {
        CoreError::Config(format!("설정 파일 파싱 실패: {}: {}", path.display(), e))
    })?;

    // 오버라이드로 고쳐질 수 있으므로 여기서는 경고만
    if let Err(e) = config.validate() {
        warn!("설정 파일 값 검증 경고: {e}");
    }
    debug!("설정 파일 로드: {}", path.display());
    Ok(config)
}

fn write_defaults(path: &Path, config: &AppConfig) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                CoreError::Config(format!(
                    "설정 디렉토리 생성 실패: {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| CoreError::Config(format!("설정 직렬화 실패: {e}")))?;
    fs::write(path, content).map_err(|e| {
        CoreError::Config(format!("설정 파일 저장 실패: {}: {}", path.display(), e))
    })?;

    info!("기본 설정 파일 생성: {}", path.display());
    Ok(())
}
