use serde::{Deserialize, Serialize};

use crate::methods::MethodItem;
use crate::model::issue::Issue;
use crate::model::node::SpanNode;
use crate::model::record::TryStatus;

/// `GET /tries/{try_id}/trace`: the reconstructed forest, no issue analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceView {
    pub try_id: String,
    pub trace_id: Option<String>,
    pub status: TryStatus,
    pub total_duration_ms: i64,
    pub roots: Vec<SpanNode>,
}

/// `GET /tries/{try_id}/issues`: ranked findings, no tree materialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuesView {
    pub try_id: String,
    pub status: TryStatus,
    pub total_duration_ms: i64,
    pub issues: Vec<Issue>,
}

/// `GET /tries/{try_id}/methods`: self-duration-sorted, paginated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodsView {
    pub try_id: String,
    pub trace_id: Option<String>,
    pub status: TryStatus,
    pub total_duration_ms: i64,
    pub total_count: usize,
    pub page: usize,
    pub size: usize,
    pub has_more: bool,
    pub items: Vec<MethodItem>,
}
