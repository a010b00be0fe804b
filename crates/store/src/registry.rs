use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use trylens_core::ids::TryId;
use trylens_core::model::record::{TryRecord, TryStatus};

/// Tracks the lifecycle of every trace-capture session this process has
/// issued. Pending at sampling time; completed once a fetch returns spans.
/// Backend errors never transition a record anywhere: they stay pending.
#[derive(Clone, Default)]
pub struct TryRegistry {
    records: Arc<RwLock<HashMap<String, TryRecord>>>,
}

impl TryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly sampled unit of work.
    pub fn begin(&self, try_id: &TryId) {
        let mut records = self.records.write().expect("registry lock poisoned");
        records
            .entry(try_id.as_str().to_string())
            .or_insert_with(|| TryRecord::pending(try_id.as_str()));
    }

    /// Marks a session analyzed. Idempotent: repeated completions refresh the
    /// same totals.
    pub fn complete(
        &self,
        try_id: &TryId,
        trace_id: Option<String>,
        total_duration_ms: i64,
        span_count: usize,
        issue_count: usize,
    ) {
        let mut records = self.records.write().expect("registry lock poisoned");
        let record = records
            .entry(try_id.as_str().to_string())
            .or_insert_with(|| TryRecord::pending(try_id.as_str()));
        record.trace_id = trace_id;
        record.status = TryStatus::Completed;
        record.analyzed_at = Some(Utc::now());
        record.total_duration_ms = total_duration_ms;
        record.span_count = span_count;
        record.issue_count = issue_count;
    }

    pub fn get(&self, try_id: &TryId) -> Option<TryRecord> {
        let records = self.records.read().expect("registry lock poisoned");
        records.get(try_id.as_str()).cloned()
    }

    /// Drops records whose last activity (analysis, falling back to creation)
    /// is older than `ttl`, then the oldest records past `max_tries`. Applies
    /// to completed and stale-pending sessions alike.
    pub fn run_retention(&self, ttl: Duration, max_tries: usize) {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(ttl).unwrap_or(chrono::TimeDelta::MAX);
        let mut records = self.records.write().expect("registry lock poisoned");
        let before = records.len();

        records.retain(|_, record| last_activity(record) > Some(cutoff));

        if records.len() > max_tries {
            let mut by_age: Vec<(Option<DateTime<Utc>>, String)> = records
                .iter()
                .map(|(id, record)| (last_activity(record), id.clone()))
                .collect();
            by_age.sort();
            for (_, id) in &by_age[..records.len() - max_tries] {
                records.remove(id);
            }
        }

        let evicted = before - records.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = records.len(), "try records evicted");
        }
    }
}

fn last_activity(record: &TryRecord) -> Option<DateTime<Utc>> {
    record.analyzed_at.or(record.created_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_then_complete_transitions() {
        let registry = TryRegistry::new();
        let id = TryId::generate();

        registry.begin(&id);
        let pending = registry.get(&id).unwrap();
        assert_eq!(pending.status, TryStatus::Pending);
        assert!(pending.analyzed_at.is_none());

        registry.complete(&id, Some("abc123".into()), 1800, 7, 2);
        let done = registry.get(&id).unwrap();
        assert_eq!(done.status, TryStatus::Completed);
        assert_eq!(done.trace_id.as_deref(), Some("abc123"));
        assert_eq!(done.span_count, 7);
        assert_eq!(done.issue_count, 2);
        assert!(done.analyzed_at.is_some());
    }

    #[test]
    fn begin_twice_keeps_first_record() {
        let registry = TryRegistry::new();
        let id = TryId::generate();
        registry.begin(&id);
        let first = registry.get(&id).unwrap();
        registry.begin(&id);
        assert_eq!(registry.get(&id).unwrap().created_at, first.created_at);
    }

    #[test]
    fn unknown_id_is_none() {
        assert!(TryRegistry::new().get(&TryId::generate()).is_none());
    }

    #[test]
    fn retention_evicts_stale_pending_and_completed_records() {
        let registry = TryRegistry::new();
        let pending = TryId::generate();
        let completed = TryId::generate();
        registry.begin(&pending);
        registry.begin(&completed);
        registry.complete(&completed, None, 100, 1, 0);

        std::thread::sleep(Duration::from_millis(5));
        registry.run_retention(Duration::from_millis(1), 1024);
        assert!(registry.get(&pending).is_none());
        assert!(registry.get(&completed).is_none());
    }

    #[test]
    fn retention_caps_the_record_count_oldest_first() {
        let registry = TryRegistry::new();
        let ids: Vec<TryId> = (0..3).map(|_| TryId::generate()).collect();
        for id in &ids {
            registry.begin(id);
            std::thread::sleep(Duration::from_millis(2));
        }

        registry.run_retention(Duration::from_secs(3600), 2);
        assert!(registry.get(&ids[0]).is_none());
        assert!(registry.get(&ids[1]).is_some());
        assert!(registry.get(&ids[2]).is_some());
    }

    #[test]
    fn retention_keeps_fresh_records() {
        let registry = TryRegistry::new();
        let id = TryId::generate();
        registry.begin(&id);

        registry.run_retention(Duration::from_secs(3600), 1024);
        assert!(registry.get(&id).is_some());
    }
}
