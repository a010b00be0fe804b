use crate::model::issue::{Issue, IssueKind, Severity};
use crate::model::span::Span;

/// Case-insensitive name vocabulary for the database-call heuristic.
const DB_MARKERS: [&str; 5] = ["repository", "jdbc", "query", "execute", "db"];

/// Runs the bottleneck heuristics over the flat span list. The generic rule
/// intentionally overlaps the specific ones, so one span can be flagged more
/// than once. Results are ranked by severity, then duration, descending.
/// A zero total emits nothing (percentages are undefined).
pub fn analyze(spans: &[Span], total_duration_ms: i64) -> Vec<Issue> {
    if total_duration_ms <= 0 {
        return Vec::new();
    }

    let mut issues = Vec::new();
    for span in spans {
        let duration_ms = span.duration_ms();
        let pct = 100.0 * duration_ms as f64 / total_duration_ms as f64;

        if is_database_call(span) && pct > 50.0 && duration_ms > 500 {
            issues.push(issue(
                IssueKind::SlowDatabaseCall,
                span,
                duration_ms,
                pct,
                format!(
                    "database call '{}' took {duration_ms}ms ({pct:.1}% of the trace)",
                    span.name
                ),
                "Check the query plan and indexes; consider caching or batching the call.",
            ));
        }

        if is_outbound_http(span) && pct > 30.0 && duration_ms > 300 {
            issues.push(issue(
                IssueKind::SlowOutboundCall,
                span,
                duration_ms,
                pct,
                format!(
                    "outbound HTTP call '{}' took {duration_ms}ms ({pct:.1}% of the trace)",
                    span.name
                ),
                "Check downstream latency; consider timeouts, parallel calls, or a cache.",
            ));
        }

        if pct > 20.0 && duration_ms > 100 {
            issues.push(issue(
                IssueKind::SlowSpanGeneric,
                span,
                duration_ms,
                pct,
                format!(
                    "'{}' took {duration_ms}ms ({pct:.1}% of the trace)",
                    span.name
                ),
                "Profile this call; it dominates the request.",
            ));
        }
    }

    issues.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.duration_ms.cmp(&a.duration_ms))
    });
    issues
}

fn is_database_call(span: &Span) -> bool {
    let name = span.name.to_ascii_lowercase();
    DB_MARKERS.iter().any(|marker| name.contains(marker))
}

fn is_outbound_http(span: &Span) -> bool {
    span.name.to_ascii_lowercase().starts_with("http")
        || span.has_attr("http.request.method")
        || span.has_attr("http.response.status_code")
}

fn issue(
    kind: IssueKind,
    span: &Span,
    duration_ms: i64,
    pct: f64,
    summary: String,
    recommendation: &str,
) -> Issue {
    Issue {
        kind,
        severity: Severity::from_percentage(pct),
        summary,
        span_name: span.name.clone(),
        duration_ms,
        evidence: vec![
            format!("duration: {duration_ms}ms"),
            format!("kind: {}", span.kind.as_str()),
            format!("name: {}", span.name),
            format!("share of trace: {pct:.2}%"),
        ],
        recommendation: recommendation.to_string(),
    }
}
