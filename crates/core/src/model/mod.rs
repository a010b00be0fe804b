pub mod issue;
pub mod node;
pub mod record;
pub mod span;

pub use issue::{Issue, IssueKind, Severity};
pub use node::{Parameter, SpanNode};
pub use record::{TryRecord, TryStatus};
pub use span::{Span, SpanKind};
