use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

impl SpanKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Server => "server",
            Self::Client => "client",
            Self::Producer => "producer",
            Self::Consumer => "consumer",
        }
    }
}

/// One recorded call. Immutable once closed; attributes keep insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub name: String,
    pub kind: SpanKind,
    pub start_nanos: u64,
    pub end_nanos: u64,
    pub attrs: Vec<(String, String)>,
}

impl Span {
    pub fn duration_ms(&self) -> i64 {
        (self.end_nanos.saturating_sub(self.start_nanos) / 1_000_000) as i64
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, key: &str) -> bool {
        self.attrs.iter().any(|(k, _)| k == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: u64, end: u64) -> Span {
        Span {
            span_id: "a".into(),
            parent_span_id: None,
            name: "op".into(),
            kind: SpanKind::Internal,
            start_nanos: start,
            end_nanos: end,
            attrs: vec![("k".into(), "v".into())],
        }
    }

    #[test]
    fn duration_floors_at_zero() {
        assert_eq!(span(0, 100_000_000).duration_ms(), 100);
        assert_eq!(span(100, 50).duration_ms(), 0);
    }

    #[test]
    fn attr_lookup() {
        let s = span(0, 1);
        assert_eq!(s.attr("k"), Some("v"));
        assert_eq!(s.attr("missing"), None);
        assert!(s.has_attr("k"));
    }
}
