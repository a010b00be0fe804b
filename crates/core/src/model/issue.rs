use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    SlowDatabaseCall,
    SlowOutboundCall,
    SlowSpanGeneric,
}

impl IssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SlowDatabaseCall => "slow-database-call",
            Self::SlowOutboundCall => "slow-outbound-call",
            Self::SlowSpanGeneric => "slow-span-generic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Severity depends only on share of total trace duration, regardless of
    /// which heuristic fired.
    pub fn from_percentage(pct: f64) -> Self {
        if pct >= 75.0 {
            Self::Critical
        } else if pct >= 50.0 {
            Self::High
        } else if pct >= 25.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// A flagged bottleneck. Derived from a trace on every query, never persisted
/// on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub summary: String,
    pub span_name: String,
    pub duration_ms: i64,
    pub evidence: Vec<String>,
    pub recommendation: String,
}
