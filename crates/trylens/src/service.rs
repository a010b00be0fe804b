use trylens_core::analyze::analyze;
use trylens_core::ids::TryId;
use trylens_core::methods::list_methods;
use trylens_core::model::record::{TryRecord, TryStatus};
use trylens_core::query::{IssuesView, MethodsView, TraceView};
use trylens_core::tree::{build_tree, total_duration_ms};
use trylens_store::{FetchedTrace, TraceStore, TryRegistry};

/// The result façade: four independent, side-effect-free read views computed
/// from whatever the trace store currently returns. Store and backend
/// failures degrade to a pending view; only the HTTP layer rejects input.
#[derive(Clone)]
pub struct TryService {
    store: TraceStore,
    registry: TryRegistry,
}

impl TryService {
    pub fn new(store: TraceStore, registry: TryRegistry) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &TryRegistry {
        &self.registry
    }

    /// Counts and status only. A successful fetch also settles the registry
    /// record to completed.
    pub async fn summary(&self, try_id: &TryId) -> TryRecord {
        match self.fetch(try_id).await {
            Some(trace) => {
                let total = total_duration_ms(&trace.spans);
                let issues = analyze(&trace.spans, total);
                self.registry.complete(
                    try_id,
                    trace.trace_id.clone(),
                    total,
                    trace.spans.len(),
                    issues.len(),
                );
                self.registry
                    .get(try_id)
                    .unwrap_or_else(|| TryRecord::unknown(try_id.as_str()))
            }
            None => self
                .registry
                .get(try_id)
                .unwrap_or_else(|| TryRecord::unknown(try_id.as_str())),
        }
    }

    /// The reconstructed forest; skips issue analysis.
    pub async fn trace(&self, try_id: &TryId) -> TraceView {
        match self.fetch(try_id).await {
            Some(trace) => {
                let tree = build_tree(&trace.spans);
                TraceView {
                    try_id: try_id.as_str().to_string(),
                    trace_id: trace.trace_id,
                    status: TryStatus::Completed,
                    total_duration_ms: tree.total_duration_ms,
                    roots: tree.roots,
                }
            }
            None => TraceView {
                try_id: try_id.as_str().to_string(),
                trace_id: None,
                status: TryStatus::Pending,
                total_duration_ms: 0,
                roots: Vec::new(),
            },
        }
    }

    /// Ranked findings over the flat span list; skips tree materialization.
    pub async fn issues(&self, try_id: &TryId) -> IssuesView {
        match self.fetch(try_id).await {
            Some(trace) => {
                let total = total_duration_ms(&trace.spans);
                IssuesView {
                    try_id: try_id.as_str().to_string(),
                    status: TryStatus::Completed,
                    total_duration_ms: total,
                    issues: analyze(&trace.spans, total),
                }
            }
            None => IssuesView {
                try_id: try_id.as_str().to_string(),
                status: TryStatus::Pending,
                total_duration_ms: 0,
                issues: Vec::new(),
            },
        }
    }

    /// Self-duration-sorted method list. Pagination input is validated by the
    /// HTTP layer.
    pub async fn methods(&self, try_id: &TryId, page: usize, size: usize) -> MethodsView {
        match self.fetch(try_id).await {
            Some(trace) => {
                let listed = list_methods(&trace.spans, page, size);
                MethodsView {
                    try_id: try_id.as_str().to_string(),
                    trace_id: trace.trace_id,
                    status: TryStatus::Completed,
                    total_duration_ms: listed.total_duration_ms,
                    total_count: listed.total_count,
                    page,
                    size,
                    has_more: listed.has_more,
                    items: listed.items,
                }
            }
            None => MethodsView {
                try_id: try_id.as_str().to_string(),
                trace_id: None,
                status: TryStatus::Pending,
                total_duration_ms: 0,
                total_count: 0,
                page,
                size,
                has_more: false,
                items: Vec::new(),
            },
        }
    }

    async fn fetch(&self, try_id: &TryId) -> Option<FetchedTrace> {
        match self.store.fetch(try_id).await {
            Ok(trace) => trace,
            Err(err) => {
                tracing::warn!(try_id = try_id.as_str(), error = %err, "fetch degraded to pending");
                None
            }
        }
    }
}
