use serde::{Deserialize, Serialize};

use crate::model::span::Span;
use crate::tree::{build_tree, flatten};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodItem {
    pub span_id: String,
    pub display_name: String,
    pub class_name: Option<String>,
    pub method_name: Option<String>,
    pub duration_ms: i64,
    pub self_duration_ms: i64,
    pub percentage: f64,
    pub self_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodPage {
    pub total_duration_ms: i64,
    pub total_count: usize,
    pub items: Vec<MethodItem>,
    pub has_more: bool,
}

/// Flattens the call tree and pages it sorted by self-duration descending
/// (span id as a deterministic tie-break). Pagination input is assumed
/// validated by the caller; empty trace data pages to zeros, never an error.
pub fn list_methods(spans: &[Span], page: usize, size: usize) -> MethodPage {
    let tree = build_tree(spans);
    let mut nodes = flatten(&tree);
    nodes.sort_by(|a, b| {
        b.self_duration_ms
            .cmp(&a.self_duration_ms)
            .then_with(|| a.span_id.cmp(&b.span_id))
    });

    let total_count = nodes.len();
    let start = page.saturating_mul(size).min(total_count);
    let end = start.saturating_add(size).min(total_count);

    let items = nodes[start..end]
        .iter()
        .map(|node| MethodItem {
            span_id: node.span_id.clone(),
            display_name: node.display_name.clone(),
            class_name: node.class_name.clone(),
            method_name: node.method_name.clone(),
            duration_ms: node.duration_ms,
            self_duration_ms: node.self_duration_ms,
            percentage: node.percentage,
            self_percentage: node.self_percentage,
        })
        .collect();

    MethodPage {
        total_duration_ms: tree.total_duration_ms,
        total_count,
        items,
        has_more: end < total_count,
    }
}
