//! # retouch-app
//!
//! RETOUCH 클라이언트 바이너리 진입점.
//! 설정 로드, tracing 초기화, 어댑터 생성(DI), 명령 실행.

mod commands;
mod monitored;

use anyhow::{Context, Result};
use clap::{Args as OptionGroup, Parser, Subcommand};
use retouch_core::config::AppConfig;
use retouch_core::config_manager::{ConfigManager, ConfigOverrides};
use retouch_core::models::edit::{EditOptions, Quality};
use retouch_core::ports::clock::SystemClock;
use retouch_edit::editor::ImageEditor;
use retouch_network::connectivity::{ConnectionStatus, ConnectivityManager};
use retouch_network::edit_service::HttpEditService;
use retouch_storage::sqlite::SqliteQueueStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::monitored::MonitoredEditService;

/// RETOUCH 이미지 편집 클라이언트
///
/// AI 이미지 편집 요청을 검증/정규화하고, 캐시·재시도·오프라인 큐를 거쳐 전송한다.
#[derive(Parser, Debug)]
#[command(name = "retouch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// 편집 엔드포인트 URL
    #[arg(long, short = 'e', global = true)]
    endpoint: Option<String>,

    /// API 키
    #[arg(long, env = "RETOUCH_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// 데이터 저장 경로 (오프라인 큐 DB)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info", global = true)]
    log_level: String,

    /// 오프라인 모드 (편집 요청은 큐에 보관)
    #[arg(long, short = 'o', global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 이미지 한 장 편집 (오프라인이면 큐에 보관)
    Edit {
        /// 이미지 파일
        image: PathBuf,
        /// 편집 지시문
        #[arg(long, short = 'p')]
        prompt: String,
        /// 사용 맥락 (field-log, chat, document, calendar)
        #[arg(long, default_value = "chat")]
        context: String,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// 여러 이미지에 같은 지시문 적용
    Batch {
        /// 이미지 파일들
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// 편집 지시문
        #[arg(long, short = 'p')]
        prompt: String,
        /// 동시 실행 수 (기본: 설정값)
        #[arg(long)]
        concurrency: Option<usize>,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// 추천 지시문 출력
    Prompts {
        /// 사용 맥락 (비우면 기본 목록)
        #[arg(long, default_value = "")]
        context: String,
    },
    /// 오프라인 큐 관리
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// 적용된 설정 출력 (API 키 마스킹)
    Config,
}

#[derive(Subcommand, Debug)]
enum QueueAction {
    /// 큐 길이와 가장 오래된 요청 시각
    Status,
    /// 큐에 보관된 편집 전송
    Drain,
}

/// 편집 옵션 인자
#[derive(OptionGroup, Debug, Clone)]
struct OptionArgs {
    /// 결과 품질 (standard, high)
    #[arg(long, default_value = "high", value_parser = parse_quality)]
    quality: Quality,

    /// 반복 횟수
    #[arg(long, default_value_t = 1)]
    iterations: u32,

    /// 종횡비 유지 해제
    #[arg(long)]
    no_preserve_aspect_ratio: bool,
}

impl OptionArgs {
    fn to_options(&self) -> EditOptions {
        EditOptions {
            preserve_aspect_ratio: !self.no_preserve_aspect_ratio,
            quality: self.quality,
            iterations: self.iterations,
        }
    }
}

fn parse_quality(value: &str) -> Result<Quality, String> {
    match value.to_ascii_lowercase().as_str() {
        "standard" => Ok(Quality::Standard),
        "high" => Ok(Quality::High),
        other => Err(format!("알 수 없는 품질: {other} (standard|high)")),
    }
}

/// 실행 중 공유되는 구성요소
pub struct Services {
    pub editor: ImageEditor,
    pub connectivity: Arc<ConnectivityManager>,
    watcher: JoinHandle<()>,
}

impl Drop for Services {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

impl Args {
    /// 설정 파일보다 우선하는 CLI 값
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
            data_dir: self.data_dir.clone(),
        }
    }
}

/// 어댑터 생성 및 연결 (DI)
async fn build_services(config: &AppConfig, db_path: &Path, offline: bool) -> Result<Services> {
    let store = Arc::new(
        SqliteQueueStore::open(db_path)
            .with_context(|| format!("오프라인 큐 DB 열기 실패: {}", db_path.display()))?,
    );

    let connectivity = Arc::new(ConnectivityManager::default());
    if offline {
        connectivity.set_forced_offline(true);
    }

    let http = HttpEditService::new(&config.remote).context("원격 편집 서비스 초기화 실패")?;
    let remote = Arc::new(MonitoredEditService::new(
        Arc::new(http),
        connectivity.clone(),
    ));

    let editor = ImageEditor::new(config, remote, store, Arc::new(SystemClock));
    let queue = editor.offline_queue();

    let restored = queue.restore().await?;
    // 첫 편집 전에 연결 상태를 맞춰 둔다
    queue.set_online(connectivity.is_online()).await;
    let watcher = queue.watch_connectivity(connectivity.subscribe(), |s: &ConnectionStatus| {
        s.is_online()
    });

    info!(
        endpoint = %config.remote.endpoint,
        db = %db_path.display(),
        restored,
        online = connectivity.is_online(),
        "서비스 초기화 완료"
    );

    Ok(Services {
        editor,
        connectivity,
        watcher,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "retouch={lvl},retouch_app={lvl},retouch_core={lvl},retouch_vision={lvl},retouch_network={lvl},retouch_storage={lvl},retouch_edit={lvl}",
        lvl = args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let manager = ConfigManager::open(args.config.clone()).context("설정 로드 실패")?;
    let config = manager
        .resolve(&args.overrides())
        .context("설정값 검증 실패")?;

    info!("RETOUCH 클라이언트 시작 (설정: {})", manager.config_path().display());

    match &args.command {
        Command::Prompts { context } => commands::print_prompts(context),
        Command::Config => commands::print_config(&config),
        Command::Queue {
            action: QueueAction::Status,
        } => {
            let db_path = ConfigManager::queue_db_path(&config)?;
            commands::queue_status(&db_path, !args.offline).await
        }
        Command::Queue {
            action: QueueAction::Drain,
        } => {
            let db_path = ConfigManager::queue_db_path(&config)?;
            let services = build_services(&config, &db_path, args.offline).await?;
            commands::queue_drain(&services, config.follow_up_delay()).await
        }
        Command::Edit {
            image,
            prompt,
            context,
            options,
        } => {
            let db_path = ConfigManager::queue_db_path(&config)?;
            let services = build_services(&config, &db_path, args.offline).await?;
            commands::edit(&services, image, prompt, context, options.to_options()).await
        }
        Command::Batch {
            images,
            prompt,
            concurrency,
            options,
        } => {
            let db_path = ConfigManager::queue_db_path(&config)?;
            let services = build_services(&config, &db_path, args.offline).await?;
            commands::batch(&services, images, prompt, *concurrency, options.to_options()).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_edit_command() {
        let args = Args::try_parse_from([
            "retouch",
            "edit",
            "photo.jpg",
            "--prompt",
            "brighten",
            "--quality",
            "standard",
            "--iterations",
            "2",
        ])
        .unwrap();

        match args.command {
            Command::Edit {
                image,
                prompt,
                context,
                options,
            } => {
                assert_eq!(image, PathBuf::from("photo.jpg"));
                assert_eq!(prompt, "brighten");
                assert_eq!(context, "chat");
                let opts = options.to_options();
                assert_eq!(opts.quality, Quality::Standard);
                assert_eq!(opts.iterations, 2);
                assert!(opts.preserve_aspect_ratio);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "retouch",
            "queue",
            "status",
            "--offline",
            "--data-dir",
            "/tmp/rt",
        ])
        .unwrap();
        assert!(args.offline);
        assert_eq!(args.data_dir, Some(PathBuf::from("/tmp/rt")));
    }

    #[test]
    fn invalid_quality_rejected() {
        let result = Args::try_parse_from(["retouch", "edit", "a.png", "-p", "x", "--quality", "ultra"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_flags_become_overrides() {
        let args = Args::try_parse_from([
            "retouch",
            "--endpoint",
            "https://edit.example.com/v1/images/edits",
            "--api-key",
            "k",
            "--data-dir",
            "/data",
            "prompts",
        ])
        .unwrap();

        let overrides = args.overrides();
        assert_eq!(
            overrides.endpoint.as_deref(),
            Some("https://edit.example.com/v1/images/edits")
        );
        assert_eq!(overrides.api_key.as_deref(), Some("k"));
        assert_eq!(overrides.data_dir, Some(PathBuf::from("/data")));
    }
}
