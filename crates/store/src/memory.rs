use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use trylens_core::ids::TryId;
use trylens_core::model::span::Span;

use crate::FetchedTrace;

/// In-process strategy: a bounded per-try span buffer. Partitioned by try id
/// so concurrent records and fetches of unrelated tries never share a lock.
/// Data is lost on restart; that is the accepted trade-off of this mode.
#[derive(Clone)]
pub struct MemoryStore {
    buffers: Arc<RwLock<HashMap<String, Arc<Mutex<TraceBuffer>>>>>,
    span_cap: usize,
}

struct TraceBuffer {
    spans: Vec<Span>,
    dropped: usize,
    created_at: Instant,
}

impl TraceBuffer {
    fn new() -> Self {
        Self {
            spans: Vec::new(),
            dropped: 0,
            created_at: Instant::now(),
        }
    }
}

impl MemoryStore {
    pub fn new(span_cap: usize) -> Self {
        Self {
            buffers: Arc::new(RwLock::new(HashMap::new())),
            span_cap: span_cap.max(1),
        }
    }

    pub fn record(&self, try_id: &TryId, span: Span) {
        let buffer = self.buffer_for(try_id);
        let mut guard = buffer.lock().expect("trace buffer mutex poisoned");
        if guard.spans.len() >= self.span_cap {
            guard.dropped += 1;
            if guard.dropped == 1 {
                tracing::warn!(
                    try_id = try_id.as_str(),
                    cap = self.span_cap,
                    "trace buffer full, dropping spans"
                );
            }
            return;
        }
        guard.spans.push(span);
    }

    pub fn fetch(&self, try_id: &TryId) -> Option<FetchedTrace> {
        let buffers = self.buffers.read().expect("buffer map lock poisoned");
        let buffer = buffers.get(try_id.as_str())?;
        let guard = buffer.lock().expect("trace buffer mutex poisoned");
        if guard.spans.is_empty() {
            return None;
        }
        Some(FetchedTrace {
            trace_id: Some(try_id.as_str().to_string()),
            spans: guard.spans.clone(),
        })
    }

    /// Drops trace buffers older than `ttl`, then the oldest buffers past
    /// `max_tries`. The per-trace span cap bounds one try; this bounds the
    /// set of tries, so a long-running process cannot accumulate sessions
    /// forever.
    pub fn run_retention(&self, ttl: Duration, max_tries: usize) {
        let now = Instant::now();
        let mut buffers = self.buffers.write().expect("buffer map lock poisoned");
        let before = buffers.len();

        buffers.retain(|_, buffer| {
            let created = buffer.lock().expect("trace buffer mutex poisoned").created_at;
            now.saturating_duration_since(created) < ttl
        });

        if buffers.len() > max_tries {
            let mut by_age: Vec<(Instant, String)> = buffers
                .iter()
                .map(|(id, buffer)| {
                    let created = buffer.lock().expect("trace buffer mutex poisoned").created_at;
                    (created, id.clone())
                })
                .collect();
            by_age.sort();
            for (_, id) in &by_age[..buffers.len() - max_tries] {
                buffers.remove(id);
            }
        }

        let evicted = before - buffers.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = buffers.len(), "trace buffers evicted");
        }
    }

    fn buffer_for(&self, try_id: &TryId) -> Arc<Mutex<TraceBuffer>> {
        {
            let buffers = self.buffers.read().expect("buffer map lock poisoned");
            if let Some(buffer) = buffers.get(try_id.as_str()) {
                return buffer.clone();
            }
        }
        let mut buffers = self.buffers.write().expect("buffer map lock poisoned");
        buffers
            .entry(try_id.as_str().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TraceBuffer::new())))
            .clone()
    }
}
