use std::collections::{HashMap, HashSet};

use crate::model::node::{SpanNode, resolve_display};
use crate::model::span::Span;

/// A rooted forest reconstructed from a flat, unordered span collection.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceTree {
    pub roots: Vec<SpanNode>,
    pub total_duration_ms: i64,
}

/// Total trace duration: the envelope from the earliest start to the latest
/// end across all spans. Equals the root duration for single-root traces.
pub fn total_duration_ms(spans: &[Span]) -> i64 {
    let Some(min_start) = spans.iter().map(|s| s.start_nanos).min() else {
        return 0;
    };
    let max_end = spans.iter().map(|s| s.end_nanos).max().unwrap_or(0);
    (max_end.saturating_sub(min_start) / 1_000_000) as i64
}

/// Builds the forest. Input order never matters: spans are indexed by id,
/// grouped by parent, and children are ordered by start time (span id as
/// tie-break). A span whose parent is null, empty, all zeros, itself, or
/// absent from the set becomes a root. Spans only reachable through a parent
/// cycle are promoted to roots so every input span appears exactly once.
pub fn build_tree(spans: &[Span]) -> TraceTree {
    let total = total_duration_ms(spans);

    let index: HashMap<&str, &Span> = spans.iter().map(|s| (s.span_id.as_str(), s)).collect();
    let mut by_parent: HashMap<&str, Vec<&Span>> = HashMap::new();
    let mut roots: Vec<&Span> = Vec::new();

    for span in spans {
        match effective_parent(span, &index) {
            Some(parent) => by_parent.entry(parent).or_default().push(span),
            None => roots.push(span),
        }
    }
    for group in by_parent.values_mut() {
        sort_spans(group);
    }
    sort_spans(&mut roots);

    let mut visited: HashSet<&str> = HashSet::new();
    let mut nodes: Vec<SpanNode> = roots
        .iter()
        .map(|&root| materialize(root, &by_parent, &mut visited, total))
        .collect();

    // Parent cycles leave spans unreachable from any root; promote them
    // deterministically by span id.
    while visited.len() < index.len() {
        let Some(orphan) = spans
            .iter()
            .filter(|s| !visited.contains(s.span_id.as_str()))
            .min_by(|a, b| a.span_id.cmp(&b.span_id))
        else {
            break;
        };
        nodes.push(materialize(orphan, &by_parent, &mut visited, total));
    }

    TraceTree {
        roots: nodes,
        total_duration_ms: total,
    }
}

/// Depth-first walk of the forest.
pub fn flatten(tree: &TraceTree) -> Vec<&SpanNode> {
    let mut out = Vec::new();
    for root in &tree.roots {
        push_depth_first(root, &mut out);
    }
    out
}

fn push_depth_first<'a>(node: &'a SpanNode, out: &mut Vec<&'a SpanNode>) {
    out.push(node);
    for child in &node.children {
        push_depth_first(child, out);
    }
}

fn effective_parent<'a>(span: &'a Span, index: &HashMap<&str, &Span>) -> Option<&'a str> {
    let parent = span.parent_span_id.as_deref()?;
    if parent.is_empty() || parent.chars().all(|c| c == '0') {
        return None;
    }
    if parent == span.span_id || !index.contains_key(parent) {
        return None;
    }
    Some(parent)
}

fn sort_spans(spans: &mut [&Span]) {
    spans.sort_by(|a, b| {
        a.start_nanos
            .cmp(&b.start_nanos)
            .then_with(|| a.span_id.cmp(&b.span_id))
    });
}

fn materialize<'a>(
    span: &'a Span,
    by_parent: &HashMap<&'a str, Vec<&'a Span>>,
    visited: &mut HashSet<&'a str>,
    total: i64,
) -> SpanNode {
    visited.insert(span.span_id.as_str());

    let mut children: Vec<SpanNode> = Vec::new();
    if let Some(group) = by_parent.get(span.span_id.as_str()) {
        for &child in group {
            if visited.contains(child.span_id.as_str()) {
                continue;
            }
            children.push(materialize(child, by_parent, visited, total));
        }
    }

    let duration_ms = span.duration_ms();
    let children_ms: i64 = children.iter().map(|c| c.duration_ms).sum();
    let self_duration_ms = (duration_ms - children_ms).max(0);

    let (class_name, method_name, parameters, display_name) = resolve_display(span);

    SpanNode {
        span_id: span.span_id.clone(),
        parent_span_id: span.parent_span_id.clone(),
        name: span.name.clone(),
        kind: span.kind,
        duration_ms,
        self_duration_ms,
        percentage: percentage_of(duration_ms, total),
        self_percentage: percentage_of(self_duration_ms, total),
        class_name,
        method_name,
        parameters,
        display_name,
        children,
    }
}

fn percentage_of(duration_ms: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    round2(100.0 * duration_ms as f64 / total as f64)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
