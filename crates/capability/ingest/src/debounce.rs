//! 设备数据包防抖缓存。
//!
//! 进程内 `device_id → 最近一次接受时间`。检查与写入在同一把锁内完成，
//! 同一设备的并发数据包只有一个能通过。

use crate::IngestError;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug)]
pub struct DebounceCache {
    interval: Duration,
    capacity: usize,
    entries: Mutex<HashMap<String, Instant>>,
}

impl DebounceCache {
    pub fn new(interval: Duration) -> Self {
        Self::with_capacity(interval, DEFAULT_CAPACITY)
    }

    /// 条目数达到 `capacity` 时，插入前先清理已过期条目。
    pub fn with_capacity(interval: Duration, capacity: usize) -> Self {
        Self {
            interval,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn check_and_record(&self, device_id: &str) -> Result<(), IngestError> {
        self.check_and_record_at(device_id, Instant::now())
    }

    /// 距上次接受不超过间隔时拒绝，且不刷新记录时间。
    pub fn check_and_record_at(&self, device_id: &str, now: Instant) -> Result<(), IngestError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| IngestError::Handler("lock failed".to_string()))?;
        if let Some(prior) = entries.get(device_id) {
            if now.saturating_duration_since(*prior) <= self.interval {
                return Err(IngestError::RateLimited(device_id.to_string()));
            }
        }
        if entries.len() >= self.capacity && !entries.contains_key(device_id) {
            let interval = self.interval;
            entries.retain(|_, seen| now.saturating_duration_since(*seen) <= interval);
        }
        entries.insert(device_id.to_string(), now);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inside_interval_and_accepts_after() {
        let cache = DebounceCache::new(Duration::from_secs(1));
        let start = Instant::now();

        cache.check_and_record_at("d1", start).expect("first");
        let err = cache
            .check_and_record_at("d1", start + Duration::from_millis(500))
            .expect_err("too soon");
        assert!(matches!(err, IngestError::RateLimited(device) if device == "d1"));

        // 被拒绝的数据包不刷新记录时间
        cache
            .check_and_record_at("d1", start + Duration::from_millis(1001))
            .expect("after interval");
    }

    #[test]
    fn boundary_is_inclusive() {
        let cache = DebounceCache::new(Duration::from_secs(1));
        let start = Instant::now();
        cache.check_and_record_at("d1", start).expect("first");
        assert!(cache
            .check_and_record_at("d1", start + Duration::from_secs(1))
            .is_err());
    }

    #[test]
    fn devices_are_independent() {
        let cache = DebounceCache::new(Duration::from_secs(1));
        let start = Instant::now();
        cache.check_and_record_at("d1", start).expect("d1");
        cache.check_and_record_at("d2", start).expect("d2");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn full_cache_drops_expired_entries() {
        let cache = DebounceCache::with_capacity(Duration::from_secs(1), 2);
        let start = Instant::now();
        cache.check_and_record_at("d1", start).expect("d1");
        cache.check_and_record_at("d2", start).expect("d2");

        cache
            .check_and_record_at("d3", start + Duration::from_secs(5))
            .expect("d3");
        assert_eq!(cache.len(), 1);
    }
}
