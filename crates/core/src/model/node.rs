use serde::{Deserialize, Serialize};

use super::span::{Span, SpanKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub type_name: String,
    pub name: Option<String>,
}

/// A span enriched with its place in the call tree and derived display fields.
/// Built once per query and never mutated afterwards.
///
/// `self_duration_ms` assumes direct children do not overlap in time;
/// concurrent children under- or over-state it. Known approximation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanNode {
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub name: String,
    pub kind: SpanKind,
    pub duration_ms: i64,
    pub self_duration_ms: i64,
    pub percentage: f64,
    pub self_percentage: f64,
    pub class_name: Option<String>,
    pub method_name: Option<String>,
    pub parameters: Vec<Parameter>,
    pub display_name: String,
    pub children: Vec<SpanNode>,
}

/// Display resolution, in preference order: structured `code.*` attributes,
/// an HTTP verb + path form for HTTP-looking spans, a dotted
/// `Class.method(Type name, ...)` span name, and finally the raw name.
pub fn resolve_display(span: &Span) -> (Option<String>, Option<String>, Vec<Parameter>, String) {
    if let Some(resolved) = from_code_attrs(span) {
        return resolved;
    }
    if let Some(display) = http_display(span) {
        return (None, None, Vec::new(), display);
    }
    if let Some(resolved) = from_dotted_name(&span.name) {
        return resolved;
    }
    (None, None, Vec::new(), span.name.clone())
}

fn from_code_attrs(span: &Span) -> Option<(Option<String>, Option<String>, Vec<Parameter>, String)> {
    let namespace = span.attr("code.namespace")?;
    let function = span.attr("code.function")?;

    let mut parameters = Vec::new();
    for index in 0.. {
        let Some(type_name) = span.attr(&format!("code.parameter.{index}.type")) else {
            break;
        };
        parameters.push(Parameter {
            type_name: type_name.to_string(),
            name: span
                .attr(&format!("code.parameter.{index}.name"))
                .map(str::to_string),
        });
    }

    let rendered = parameters
        .iter()
        .map(|p| match &p.name {
            Some(name) => format!("{} {name}", p.type_name),
            None => p.type_name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ");

    Some((
        Some(namespace.to_string()),
        Some(function.to_string()),
        parameters,
        format!("{namespace}.{function}({rendered})"),
    ))
}

fn http_display(span: &Span) -> Option<String> {
    let looks_http = matches!(span.kind, SpanKind::Server | SpanKind::Client)
        && (span.has_attr("http.request.method")
            || span.has_attr("http.url")
            || span.has_attr("url.path")
            || span.name.to_ascii_lowercase().starts_with("http"));
    if !looks_http {
        return None;
    }

    let (name_verb, name_path) = split_name(&span.name);
    let verb = span
        .attr("http.request.method")
        .map(str::to_string)
        .or(name_verb)
        .unwrap_or_else(|| "HTTP".to_string());

    let path = span
        .attr("url.path")
        .map(str::to_string)
        .or_else(|| span.attr("http.url").map(path_of_url))
        .or_else(|| span.attr("uri").map(str::to_string))
        .or(name_path)
        .unwrap_or_else(|| span.name.clone());

    Some(format!("{verb} {path}"))
}

/// Splits "HTTP GET /orders" or "GET /orders" style names into verb and
/// remainder, skipping a leading "HTTP" token.
fn split_name(name: &str) -> (Option<String>, Option<String>) {
    let mut tokens = name.split_whitespace();
    let Some(first) = tokens.next() else {
        return (None, None);
    };
    let candidate = if first.eq_ignore_ascii_case("http") {
        match tokens.next() {
            Some(token) => token,
            None => return (None, None),
        }
    } else {
        first
    };

    let upper = candidate.to_ascii_uppercase();
    let known = matches!(
        upper.as_str(),
        "GET" | "POST" | "PUT" | "PATCH" | "DELETE" | "HEAD" | "OPTIONS"
    );
    if !known {
        return (None, None);
    }
    let rest = tokens.collect::<Vec<_>>().join(" ");
    (Some(upper), (!rest.is_empty()).then_some(rest))
}

fn path_of_url(url: &str) -> String {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    match rest.find('/') {
        Some(idx) => rest[idx..].to_string(),
        None => "/".to_string(),
    }
}

fn from_dotted_name(name: &str) -> Option<(Option<String>, Option<String>, Vec<Parameter>, String)> {
    let (head, params_raw) = match name.split_once('(') {
        Some((head, rest)) => (head, Some(rest.trim_end_matches(')'))),
        None => (name, None),
    };

    let (class_name, method_name) = head.rsplit_once('.')?;
    if class_name.is_empty() || method_name.is_empty() {
        return None;
    }

    let parameters = params_raw
        .map(parse_parameters)
        .unwrap_or_default();

    Some((
        Some(class_name.to_string()),
        Some(method_name.to_string()),
        parameters,
        name.to_string(),
    ))
}

fn parse_parameters(raw: &str) -> Vec<Parameter> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| match p.rsplit_once(' ') {
            Some((type_name, name)) => Parameter {
                type_name: type_name.trim().to_string(),
                name: Some(name.trim().to_string()),
            },
            None => Parameter {
                type_name: p.to_string(),
                name: None,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(name: &str, kind: SpanKind, attrs: Vec<(&str, &str)>) -> Span {
        Span {
            span_id: "s".into(),
            parent_span_id: None,
            name: name.into(),
            kind,
            start_nanos: 0,
            end_nanos: 0,
            attrs: attrs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn structured_attrs_win() {
        let s = span(
            "whatever",
            SpanKind::Internal,
            vec![
                ("code.namespace", "orders.OrderService"),
                ("code.function", "checkout"),
                ("code.parameter.0.type", "String"),
                ("code.parameter.0.name", "orderId"),
                ("code.parameter.1.type", "int"),
            ],
        );
        let (class, method, params, display) = resolve_display(&s);
        assert_eq!(class.as_deref(), Some("orders.OrderService"));
        assert_eq!(method.as_deref(), Some("checkout"));
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name.as_deref(), Some("orderId"));
        assert_eq!(params[1].name, None);
        assert_eq!(display, "orders.OrderService.checkout(String orderId, int)");
    }

    #[test]
    fn http_span_renders_verb_and_path() {
        let s = span(
            "HTTP GET",
            SpanKind::Client,
            vec![
                ("http.request.method", "GET"),
                ("http.url", "https://api.example.com/v1/orders?x=1"),
            ],
        );
        let (_, _, _, display) = resolve_display(&s);
        assert_eq!(display, "GET /v1/orders?x=1");
    }

    #[test]
    fn http_prefixed_name_yields_verb_and_path_once() {
        let s = span("HTTP GET /inventory", SpanKind::Client, vec![]);
        let (_, _, _, display) = resolve_display(&s);
        assert_eq!(display, "GET /inventory");
    }

    #[test]
    fn http_span_falls_back_to_uri_attr() {
        let s = span(
            "GET inventory",
            SpanKind::Client,
            vec![("uri", "/inventory/42")],
        );
        let (_, _, _, display) = resolve_display(&s);
        assert_eq!(display, "GET /inventory/42");
    }

    #[test]
    fn dotted_name_parses_class_method_params() {
        let s = span(
            "com.acme.OrderService.checkout(String id, int qty)",
            SpanKind::Internal,
            vec![],
        );
        let (class, method, params, display) = resolve_display(&s);
        assert_eq!(class.as_deref(), Some("com.acme.OrderService"));
        assert_eq!(method.as_deref(), Some("checkout"));
        assert_eq!(
            params,
            vec![
                Parameter {
                    type_name: "String".into(),
                    name: Some("id".into())
                },
                Parameter {
                    type_name: "int".into(),
                    name: Some("qty".into())
                },
            ]
        );
        assert_eq!(display, "com.acme.OrderService.checkout(String id, int qty)");
    }

    #[test]
    fn unstructured_name_is_its_own_display() {
        let s = span("flush", SpanKind::Internal, vec![]);
        let (class, method, params, display) = resolve_display(&s);
        assert_eq!(class, None);
        assert_eq!(method, None);
        assert!(params.is_empty());
        assert_eq!(display, "flush");
    }
}
