//! 도메인 모델.
//!
//! 모든 모델은 `serde::Serialize` + `serde::Deserialize`를 derive하거나
//! 직렬화 불필요 시 `Debug` + `Clone`만 유지한다.

pub mod cache;
pub mod edit;
pub mod queue;
