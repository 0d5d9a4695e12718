//! 연결 상태 기록 데코레이터.
//!
//! 원격 편집 호출 결과를 `ConnectivityManager`에 기록한다.
//! 오프라인 큐는 관리자의 상태 채널을 구독하므로, 전송 실패가 누적되면
//! 이후 편집은 자동으로 큐에 보관된다.

use async_trait::async_trait;
use retouch_core::error::CoreError;
use retouch_core::ports::edit_service::{EditSubmission, RemoteEditResponse, RemoteEditService};
use retouch_network::connectivity::ConnectivityManager;
use std::sync::Arc;

pub struct MonitoredEditService {
    inner: Arc<dyn RemoteEditService>,
    connectivity: Arc<ConnectivityManager>,
}

impl MonitoredEditService {
    pub fn new(inner: Arc<dyn RemoteEditService>, connectivity: Arc<ConnectivityManager>) -> Self {
        Self {
            inner,
            connectivity,
        }
    }
}

#[async_trait]
impl RemoteEditService for MonitoredEditService {
    async fn submit(
        &self,
        submission: &EditSubmission<'_>,
    ) -> Result<RemoteEditResponse, CoreError> {
        let outcome = self.inner.submit(submission).await;
        self.connectivity.record(&outcome);
        outcome
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
