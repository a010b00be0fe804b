use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use trylens_core::ids::TryId;

/// The ambient state of one sampled unit of work: the correlation handle,
/// the open-span stack (for parent linkage), and the one-outbound-frame flag.
/// Shared by clone across handoffs so continuations keep contributing to the
/// same session.
#[derive(Clone)]
pub struct ActiveTry {
    id: TryId,
    spans: Arc<Mutex<Vec<String>>>,
    outbound_used: Arc<AtomicBool>,
}

impl ActiveTry {
    pub fn new(id: TryId) -> Self {
        Self {
            id,
            spans: Arc::new(Mutex::new(Vec::new())),
            outbound_used: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> &TryId {
        &self.id
    }

    pub(crate) fn current_span(&self) -> Option<String> {
        self.spans.lock().expect("span stack poisoned").last().cloned()
    }

    pub(crate) fn push_span(&self, span_id: String) {
        self.spans.lock().expect("span stack poisoned").push(span_id);
    }

    pub(crate) fn pop_span(&self, span_id: &str) {
        let mut stack = self.spans.lock().expect("span stack poisoned");
        if stack.last().map(String::as_str) == Some(span_id) {
            stack.pop();
            return;
        }
        // Out-of-order end; drop the matching entry wherever it sits.
        if let Some(pos) = stack.iter().rposition(|id| id == span_id) {
            stack.remove(pos);
        }
    }

    /// True exactly once per session, across all handoffs.
    pub(crate) fn claim_outbound(&self) -> bool {
        !self.outbound_used.swap(true, Ordering::SeqCst)
    }
}

tokio::task_local! {
    static ACTIVE: ActiveTry;
}

/// The ambient handle, if this task runs inside a sampled scope.
pub fn current() -> Option<TryId> {
    ACTIVE.try_with(|active| active.id.clone()).ok()
}

pub(crate) fn current_active() -> Option<ActiveTry> {
    ACTIVE.try_with(Clone::clone).ok()
}

/// Installs the handle for the lifetime of `fut`. Scopes nest; completion
/// restores whatever was ambient before (possibly nothing), so nothing leaks
/// to the next task scheduled on the same worker.
pub async fn scope<F: Future>(handle: TryId, fut: F) -> F::Output {
    ACTIVE.scope(ActiveTry::new(handle), fut).await
}

/// Same as [`scope`] for a synchronous section.
pub fn sync_scope<R>(handle: TryId, f: impl FnOnce() -> R) -> R {
    ACTIVE.sync_scope(ActiveTry::new(handle), f)
}

pub(crate) async fn scope_active<F: Future>(active: ActiveTry, fut: F) -> F::Output {
    ACTIVE.scope(active, fut).await
}

/// Snapshot of the ambient context, captured at submission time and restored
/// at execution time on whatever worker runs the continuation.
#[derive(Clone)]
pub struct ContextHandoff {
    active: Option<ActiveTry>,
}

impl ContextHandoff {
    pub fn capture() -> Self {
        Self {
            active: current_active(),
        }
    }

    /// Runs a future under the captured context; the context is released when
    /// the future completes.
    pub async fn continue_in<F: Future>(self, fut: F) -> F::Output {
        match self.active {
            Some(active) => ACTIVE.scope(active, fut).await,
            None => fut.await,
        }
    }

    /// Runs a closure (e.g. inside `spawn_blocking`) under the captured
    /// context.
    pub fn run<R>(self, f: impl FnOnce() -> R) -> R {
        match self.active {
            Some(active) => ACTIVE.sync_scope(active, f),
            None => f(),
        }
    }
}
