pub mod context;
pub mod envelope;
pub mod hook;
pub mod sampler;

pub use context::{ContextHandoff, current, scope, sync_scope};
pub use envelope::{CORRELATION_HEADER, MessageEnvelope};
pub use hook::{ParamSpec, TraceHook};
pub use sampler::{Decision, SAMPLE_HEADER, Sampler};
