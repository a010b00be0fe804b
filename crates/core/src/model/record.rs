use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TryStatus {
    Pending,
    Completed,
    // Never produced today: backend errors and "not yet indexed" both read as
    // Pending. Kept so the wire shape is stable if a failure path is added.
    Failed,
}

/// One trace-capture session. Created pending when a sampled unit of work
/// begins; completed once spans come back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryRecord {
    pub try_id: String,
    pub trace_id: Option<String>,
    pub status: TryStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub total_duration_ms: i64,
    pub span_count: usize,
    pub issue_count: usize,
}

impl TryRecord {
    pub fn pending(try_id: &str) -> Self {
        Self {
            try_id: try_id.to_string(),
            trace_id: None,
            status: TryStatus::Pending,
            created_at: Some(Utc::now()),
            analyzed_at: None,
            total_duration_ms: 0,
            span_count: 0,
            issue_count: 0,
        }
    }

    /// Summary view for a try id the registry has never seen: pending, all
    /// zeros, no creation time.
    pub fn unknown(try_id: &str) -> Self {
        Self {
            created_at: None,
            ..Self::pending(try_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_record_is_zeroed() {
        let rec = TryRecord::pending("abc");
        assert_eq!(rec.status, TryStatus::Pending);
        assert_eq!(rec.span_count, 0);
        assert!(rec.created_at.is_some());
        assert!(rec.analyzed_at.is_none());
    }

    #[test]
    fn unknown_record_has_no_created_at() {
        assert!(TryRecord::unknown("abc").created_at.is_none());
    }
}
