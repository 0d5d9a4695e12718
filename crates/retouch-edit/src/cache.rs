//! 콘텐츠 캐시.
//!
//! (정규화 이미지 식별자, 지시문 해시) → 성공 편집 결과.
//! 만료는 조회 시점에 게으르게 처리하고, 용량이 차면 가장 오래된 항목을
//! 일괄 축출한다. 모든 변경은 단일 mutex 아래에서 일어난다.

use chrono::Duration;
use parking_lot::Mutex;
use retouch_core::config::CacheConfig;
use retouch_core::models::cache::{CacheEntry, CacheEntrySummary, CacheKey, CacheStats};
use retouch_core::models::edit::EditSuccess;
use retouch_core::ports::cache::EditCache;
use retouch_core::ports::clock::{Clock, SystemClock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 인메모리 콘텐츠 캐시: `EditCache` 포트 구현
pub struct ContentCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    max_entries: usize,
    eviction_batch: usize,
}

impl ContentCache {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            ttl: config.ttl(),
            max_entries: config.max_entries.max(1),
            eviction_batch: config.eviction_batch.max(1),
        }
    }

    /// 시스템 시계 사용
    pub fn with_system_clock(config: &CacheConfig) -> Self {
        Self::new(config, Arc::new(SystemClock))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// 전체 비우기
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        let removed = entries.len();
        entries.clear();
        debug!(removed, "캐시 비움");
    }

    /// 만료 항목 일괄 제거. 제거된 수 반환
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| now - entry.stored_at <= self.ttl);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "만료 캐시 항목 제거");
        }
        removed
    }

    /// 저장 시각이 가장 오래된 `eviction_batch`개 제거
    fn evict_oldest(&self, entries: &mut HashMap<CacheKey, CacheEntry>) {
        let mut by_age: Vec<_> = entries
            .values()
            .map(|e| (e.stored_at, e.key.clone()))
            .collect();
        by_age.sort_by(|a, b| a.0.cmp(&b.0));

        let victims = by_age.into_iter().take(self.eviction_batch);
        let mut evicted = 0;
        for (_, key) in victims {
            entries.remove(&key);
            evicted += 1;
        }
        debug!(evicted, remaining = entries.len(), "캐시 용량 초과: 오래된 항목 축출");
    }
}

impl EditCache for ContentCache {
    fn lookup(&self, key: &CacheKey) -> Option<EditSuccess> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let expired = match entries.get_mut(key) {
            None => {
                debug!(key = %key, "캐시 미스");
                return None;
            }
            Some(entry) if now - entry.stored_at > self.ttl => true,
            Some(entry) => {
                entry.access_count += 1;
                debug!(key = %key, hits = entry.access_count, "캐시 적중");
                return Some(entry.result.clone());
            }
        };

        if expired {
            entries.remove(key);
            debug!(key = %key, "만료된 캐시 항목 제거");
        }
        None
    }

    fn store(&self, key: CacheKey, result: EditSuccess) {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            self.evict_oldest(&mut entries);
        }

        debug!(key = %key, "캐시 저장");
        entries.insert(
            key.clone(),
            CacheEntry {
                key,
                result,
                stored_at: now,
                access_count: 0,
            },
        );
    }

    fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        let mut summaries: Vec<CacheEntrySummary> = entries
            .values()
            .map(|e| CacheEntrySummary {
                key: e.key.to_string(),
                stored_at: e.stored_at,
                access_count: e.access_count,
            })
            .collect();
        summaries.sort_by(|a, b| a.stored_at.cmp(&b.stored_at));

        CacheStats {
            size: entries.len(),
            max_size: self.max_entries,
            entries: summaries,
        }
    }
}
