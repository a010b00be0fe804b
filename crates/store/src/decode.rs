use opentelemetry_proto::tonic::common::v1::AnyValue;
use opentelemetry_proto::tonic::trace::v1::{Span as OtlpSpan, TracesData};
use trylens_core::model::span::{Span, SpanKind};

/// Flattens the backend's batch -> scope -> span structure into core spans.
/// Returns the backend-assigned trace id (from the first span carrying one)
/// alongside the flat span list. Attribute order is preserved.
pub fn decode_traces(data: &TracesData) -> (Option<String>, Vec<Span>) {
    let mut trace_id = None;
    let mut spans = Vec::new();

    for resource_spans in &data.resource_spans {
        for scope_spans in &resource_spans.scope_spans {
            for span in &scope_spans.spans {
                if trace_id.is_none() {
                    trace_id = bytes_to_hex(&span.trace_id);
                }
                spans.push(decode_span(span));
            }
        }
    }

    (trace_id, spans)
}

pub fn decode_span(span: &OtlpSpan) -> Span {
    let attrs = span
        .attributes
        .iter()
        .map(|kv| (kv.key.clone(), any_value_to_string(kv.value.as_ref())))
        .collect();

    Span {
        span_id: bytes_to_hex(&span.span_id).unwrap_or_default(),
        parent_span_id: bytes_to_hex(&span.parent_span_id),
        name: span.name.clone(),
        kind: decode_kind(span.kind),
        start_nanos: span.start_time_unix_nano,
        end_nanos: span.end_time_unix_nano,
        attrs,
    }
}

fn decode_kind(kind: i32) -> SpanKind {
    match kind {
        2 => SpanKind::Server,
        3 => SpanKind::Client,
        4 => SpanKind::Producer,
        5 => SpanKind::Consumer,
        _ => SpanKind::Internal,
    }
}

fn any_value_to_string(value: Option<&AnyValue>) -> String {
    value
        .and_then(|v| v.value.as_ref())
        .map(|v| match v {
            opentelemetry_proto::tonic::common::v1::any_value::Value::StringValue(s) => s.clone(),
            opentelemetry_proto::tonic::common::v1::any_value::Value::BoolValue(b) => b.to_string(),
            opentelemetry_proto::tonic::common::v1::any_value::Value::IntValue(i) => i.to_string(),
            opentelemetry_proto::tonic::common::v1::any_value::Value::DoubleValue(d) => {
                d.to_string()
            }
            opentelemetry_proto::tonic::common::v1::any_value::Value::BytesValue(b) => {
                String::from_utf8_lossy(b).to_string()
            }
            _ => "<complex>".to_string(),
        })
        .unwrap_or_default()
}

fn bytes_to_hex(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    Some(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}
