//! 테스트 공용 가짜 구현 (시계, 원격 서비스, 큐 저장소).

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use image::{DynamicImage, Rgba, RgbaImage};
use parking_lot::Mutex;
use retouch_core::error::CoreError;
use retouch_core::models::edit::{EditMetadata, EditSuccess, ImageSize};
use retouch_core::models::queue::OfflineQueueEntry;
use retouch_core::ports::clock::Clock;
use retouch_core::ports::edit_service::{EditSubmission, RemoteEditResponse, RemoteEditService};
use retouch_core::ports::queue_store::QueueStore;
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

// ============================================================
// 시계
// ============================================================

/// 수동으로 전진시키는 시계
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

// ============================================================
// 원격 편집 서비스
// ============================================================

/// 스크립트 가능한 원격 서비스
///
/// `script`가 비면 항상 성공. 호출 수와 최대 동시 호출 수를 기록한다.
pub struct FakeEditService {
    script: Mutex<VecDeque<Result<RemoteEditResponse, CoreError>>>,
    latency: std::time::Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeEditService {
    pub fn succeeding() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            latency: std::time::Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// 앞에서부터 순서대로 반환할 결과 지정
    pub fn scripted(outcomes: Vec<Result<RemoteEditResponse, CoreError>>) -> Self {
        let svc = Self::succeeding();
        *svc.script.lock() = outcomes.into();
        svc
    }

    pub fn with_latency(mut self, latency: std::time::Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

pub fn response_for(instruction: &str) -> RemoteEditResponse {
    RemoteEditResponse {
        edited_image_url: format!("https://cdn.example.com/edited/{instruction}.jpg"),
        edited_image_id: format!("edited-{instruction}"),
        confidence: Some(0.9),
        model_version: None,
        iterations: None,
        image_width: 64,
        image_height: 64,
        file_size: 2048,
    }
}

#[async_trait]
impl RemoteEditService for FakeEditService {
    async fn submit(
        &self,
        submission: &EditSubmission<'_>,
    ) -> Result<RemoteEditResponse, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(submission.instruction.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(response_for(submission.instruction)))
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}

// ============================================================
// 큐 저장소
// ============================================================

/// 인메모리 큐 저장소
#[derive(Default)]
pub struct MemoryQueueStore {
    rows: Mutex<Vec<OfflineQueueEntry>>,
}

impl MemoryQueueStore {
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn retry_count(&self, id: Uuid) -> Option<u32> {
        self.rows
            .lock()
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.retry_count)
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn insert(&self, entry: &OfflineQueueEntry) -> Result<(), CoreError> {
        let mut rows = self.rows.lock();
        rows.retain(|e| e.id != entry.id);
        rows.push(entry.clone());
        Ok(())
    }

    async fn update_retry_count(&self, id: Uuid, retry_count: u32) -> Result<(), CoreError> {
        let mut rows = self.rows.lock();
        match rows.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.retry_count = retry_count;
                Ok(())
            }
            None => Err(CoreError::NotFound {
                resource_type: "QueueEntry".to_string(),
                id: id.to_string(),
            }),
        }
    }

    async fn remove(&self, id: Uuid) -> Result<(), CoreError> {
        self.rows.lock().retain(|e| e.id != id);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<OfflineQueueEntry>, CoreError> {
        Ok(self.rows.lock().clone())
    }
}

// ============================================================
// 데이터
// ============================================================

/// 작은 단색 PNG (seed마다 다른 바이트)
pub fn tiny_png(seed: u8) -> Vec<u8> {
    let img = RgbaImage::from_pixel(8, 8, Rgba([seed, 255 - seed, 128, 255]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

pub fn success_for(prompt: &str) -> EditSuccess {
    EditSuccess {
        edited_image_url: format!("https://cdn.example.com/edited/{prompt}.jpg"),
        edited_image_id: format!("edited-{prompt}"),
        metadata: EditMetadata {
            original_image_id: "00000000deadbeef".to_string(),
            prompt: prompt.to_string(),
            processing_time_ms: 10,
            confidence: None,
            model_version: "fake-model".to_string(),
            iterations: 1,
            image_size: ImageSize {
                width: 64,
                height: 64,
                file_size: 2048,
            },
        },
    }
}
