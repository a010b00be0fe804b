pub mod backend;
pub mod decode;
pub mod memory;
pub mod registry;

use std::time::Duration;

use trylens_core::Result;
use trylens_core::ids::TryId;
use trylens_core::model::span::Span;

pub use backend::BackendStore;
pub use memory::MemoryStore;
pub use registry::TryRegistry;

/// Spans retrieved for one try. The backend-assigned trace id is absent while
/// the trace is pending (and always for the in-process strategy before any
/// span lands).
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedTrace {
    pub trace_id: Option<String>,
    pub spans: Vec<Span>,
}

/// The two interchangeable storage strategies, selected by configuration.
#[derive(Clone)]
pub enum TraceStore {
    Memory(MemoryStore),
    Backend(BackendStore),
}

impl TraceStore {
    /// Records a closed span. In backend mode spans are exported out-of-band
    /// by the instrumentation layer, so this is a no-op there.
    pub fn record(&self, try_id: &TryId, span: Span) {
        match self {
            Self::Memory(store) => store.record(try_id, span),
            Self::Backend(_) => {
                tracing::debug!(try_id = try_id.as_str(), "backend mode: span exported out-of-band");
            }
        }
    }

    /// Retrieves the span set for a try. The memory strategy answers
    /// immediately; the backend strategy polls with backoff under its wait
    /// budget. Absent means "no data yet", never a hard failure.
    pub async fn fetch(&self, try_id: &TryId) -> Result<Option<FetchedTrace>> {
        match self {
            Self::Memory(store) => Ok(store.fetch(try_id)),
            Self::Backend(store) => store.fetch(try_id).await,
        }
    }

    /// Evicts expired and over-cap trace buffers. The backend owns its own
    /// retention, so this only touches the in-process strategy.
    pub fn run_retention(&self, ttl: Duration, max_tries: usize) {
        if let Self::Memory(store) = self {
            store.run_retention(ttl, max_tries);
        }
    }
}
