//! # retouch-network
//!
//! 원격 이미지 편집 서비스 네트워크 어댑터.
//! `RemoteEditService` 포트의 reqwest multipart 구현과
//! 오프라인 큐가 구독하는 연결 상태 관리자를 제공한다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use retouch_network::edit_service::HttpEditService;
//! use retouch_network::connectivity::ConnectivityManager;
//!
//! let service = HttpEditService::new(&config.remote)?;
//! let connectivity = ConnectivityManager::default();
//! ```

pub mod connectivity;
pub mod edit_service;
