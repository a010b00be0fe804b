use opentelemetry_proto::tonic::common::v1::any_value::Value;
use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue};
use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span as OtlpSpan, TracesData};
use prost::Message;
use trylens_core::model::span::{Span, SpanKind};

const BASE_NANOS: u64 = 1_700_000_000_000_000_000;

fn span(
    id: &str,
    parent: Option<&str>,
    name: &str,
    kind: SpanKind,
    start_ms: u64,
    end_ms: u64,
    attrs: Vec<(&str, &str)>,
) -> Span {
    Span {
        span_id: id.to_string(),
        parent_span_id: parent.map(str::to_string),
        name: name.to_string(),
        kind,
        start_nanos: BASE_NANOS + start_ms * 1_000_000,
        end_nanos: BASE_NANOS + end_ms * 1_000_000,
        attrs: attrs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

/// A small realistic trace: one root handling a checkout, a slow repository
/// child, and an outbound HTTP child. Root spans 0-1000ms; the repository
/// call dominates.
pub fn sample_trace() -> Vec<Span> {
    vec![
        span(
            "00000000000000a1",
            None,
            "orders.OrderService.checkout(String orderId)",
            SpanKind::Server,
            0,
            1000,
            vec![
                ("code.namespace", "orders.OrderService"),
                ("code.function", "checkout"),
                ("code.parameter.0.type", "String"),
                ("code.parameter.0.name", "orderId"),
            ],
        ),
        span(
            "00000000000000b2",
            Some("00000000000000a1"),
            "orders.OrderRepository.query(String sql)",
            SpanKind::Client,
            50,
            650,
            vec![],
        ),
        span(
            "00000000000000c3",
            Some("00000000000000a1"),
            "HTTP GET",
            SpanKind::Client,
            700,
            950,
            vec![
                ("http.request.method", "GET"),
                ("http.url", "https://inventory.internal/v1/stock/42"),
            ],
        ),
    ]
}

/// The three-span scenario from the tree-builder contract: root `a` 0-100ms
/// with children `b` 10-60ms and `c` 70-90ms.
pub fn abc_trace() -> Vec<Span> {
    vec![
        span("000000000000000a", None, "demo.Root.handle()", SpanKind::Internal, 0, 100, vec![]),
        span(
            "000000000000000b",
            Some("000000000000000a"),
            "demo.Left.work()",
            SpanKind::Internal,
            10,
            60,
            vec![],
        ),
        span(
            "000000000000000c",
            Some("000000000000000a"),
            "demo.Right.work()",
            SpanKind::Internal,
            70,
            90,
            vec![],
        ),
    ]
}

/// Encodes core spans into the backend's batch -> scope -> span wire shape,
/// tagging every span with the try id attribute the query filters on.
pub fn traces_data(try_id: &str, trace_id_hex: &str, spans: &[Span]) -> TracesData {
    let otlp_spans = spans
        .iter()
        .map(|s| {
            let mut attributes = vec![string_attr("try_id", try_id)];
            attributes.extend(s.attrs.iter().map(|(k, v)| string_attr(k, v)));
            OtlpSpan {
                trace_id: hex_bytes(trace_id_hex),
                span_id: hex_bytes(&s.span_id),
                parent_span_id: s
                    .parent_span_id
                    .as_deref()
                    .map(hex_bytes)
                    .unwrap_or_default(),
                name: s.name.clone(),
                kind: otlp_kind(s.kind),
                start_time_unix_nano: s.start_nanos,
                end_time_unix_nano: s.end_nanos,
                attributes,
                ..Default::default()
            }
        })
        .collect();

    TracesData {
        resource_spans: vec![ResourceSpans {
            scope_spans: vec![ScopeSpans {
                spans: otlp_spans,
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

pub fn encode_traces_data(data: &TracesData) -> Vec<u8> {
    data.encode_to_vec()
}

fn otlp_kind(kind: SpanKind) -> i32 {
    match kind {
        SpanKind::Internal => 1,
        SpanKind::Server => 2,
        SpanKind::Client => 3,
        SpanKind::Producer => 4,
        SpanKind::Consumer => 5,
    }
}

fn string_attr(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(Value::StringValue(value.to_string())),
        }),
    }
}

fn hex_bytes(hex: &str) -> Vec<u8> {
    hex.as_bytes()
        .chunks(2)
        .filter_map(|pair| {
            let high = (pair[0] as char).to_digit(16)?;
            let low = pair.get(1).and_then(|b| (*b as char).to_digit(16))?;
            Some((high * 16 + low) as u8)
        })
        .collect()
}
