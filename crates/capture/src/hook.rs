use chrono::Utc;
use trylens_core::config::Config;
use trylens_core::ids::TryId;
use trylens_core::model::span::{Span, SpanKind};
use trylens_store::TraceStore;
use uuid::Uuid;

use crate::context;

/// The tool's own namespaces are never instrumented (recursion guard).
const OWN_NAMESPACE: &str = "trylens";

/// Declared parameter plus, optionally, the runtime argument's concrete type.
/// Only type names are recorded, never values: attributes stay
/// low-cardinality by construction.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec<'a> {
    pub type_name: &'a str,
    pub name: &'a str,
    pub runtime_type: Option<&'a str>,
}

/// Handle for one open span, returned by `begin` and consumed by `end`.
pub struct SpanToken {
    try_id: TryId,
    span_id: String,
    parent_span_id: Option<String>,
    name: String,
    start_nanos: u64,
    attrs: Vec<(String, String)>,
}

/// The "wrap this call" contract the interception machinery invokes. Opens a
/// span on `begin`, closes and records it on `end`. Skipping (no ambient
/// handle, class outside the allow-list, or the tool's own internals) returns
/// `None` and the wrapped call proceeds untraced.
#[derive(Clone)]
pub struct TraceHook {
    store: TraceStore,
    allow: Vec<String>,
}

impl TraceHook {
    pub fn new(store: TraceStore, allow: Vec<String>) -> Self {
        Self { store, allow }
    }

    /// The embedding entry point: the allow-list comes from the operator's
    /// `allow_namespaces` configuration.
    pub fn from_config(store: TraceStore, cfg: &Config) -> Self {
        Self::new(store, cfg.allow_namespaces.clone())
    }

    pub fn begin(
        &self,
        class_name: &str,
        method_name: &str,
        params: &[ParamSpec<'_>],
    ) -> Option<SpanToken> {
        let active = context::current_active()?;
        if !self.allowed(class_name) {
            return None;
        }

        let mut attrs = Vec::with_capacity(2 + params.len() * 2);
        attrs.push(("code.namespace".to_string(), class_name.to_string()));
        attrs.push(("code.function".to_string(), method_name.to_string()));
        for (index, param) in params.iter().enumerate() {
            attrs.push((
                format!("code.parameter.{index}.type"),
                effective_type(param).to_string(),
            ));
            if !param.name.is_empty() {
                attrs.push((format!("code.parameter.{index}.name"), param.name.to_string()));
            }
        }

        let span_id = Uuid::new_v4().simple().to_string()[..16].to_string();
        let parent_span_id = active.current_span();
        active.push_span(span_id.clone());

        Some(SpanToken {
            try_id: active.id().clone(),
            span_id,
            parent_span_id,
            name: format!("{class_name}.{method_name}"),
            start_nanos: now_nanos(),
            attrs,
        })
    }

    /// Closes the span. The error, if any, is recorded on the span; the hook
    /// never swallows it. Propagation back to the caller is the caller's
    /// (or [`TraceHook::wrap`]'s) job.
    pub fn end(&self, token: SpanToken, error: Option<&str>) {
        if let Some(active) = context::current_active() {
            active.pop_span(&token.span_id);
        }

        let mut attrs = token.attrs;
        if let Some(message) = error {
            attrs.push(("error.message".to_string(), message.to_string()));
        }

        self.store.record(
            &token.try_id,
            Span {
                span_id: token.span_id,
                parent_span_id: token.parent_span_id,
                name: token.name,
                kind: SpanKind::Internal,
                start_nanos: token.start_nanos,
                end_nanos: now_nanos(),
                attrs,
            },
        );
    }

    /// Decorator form: times the call, records success or failure, and
    /// returns the call's result unchanged.
    pub fn wrap<R, E: std::fmt::Display>(
        &self,
        class_name: &str,
        method_name: &str,
        params: &[ParamSpec<'_>],
        call: impl FnOnce() -> std::result::Result<R, E>,
    ) -> std::result::Result<R, E> {
        let token = self.begin(class_name, method_name, params);
        let result = call();
        if let Some(token) = token {
            let error = result.as_ref().err().map(ToString::to_string);
            self.end(token, error.as_deref());
        }
        result
    }

    fn allowed(&self, class_name: &str) -> bool {
        if class_name.starts_with(OWN_NAMESPACE) {
            return false;
        }
        self.allow.iter().any(|prefix| class_name.starts_with(prefix))
    }
}

/// Prefers the runtime argument's concrete type when the declared one is
/// generic or erased.
fn effective_type<'a>(param: &ParamSpec<'a>) -> &'a str {
    match param.runtime_type {
        Some(runtime) if is_erased(param.type_name) => runtime,
        _ => param.type_name,
    }
}

fn is_erased(type_name: &str) -> bool {
    matches!(type_name, "T" | "E" | "K" | "V" | "Object" | "object" | "?")
        || type_name.contains('<')
        || type_name.starts_with("dyn ")
        || type_name.starts_with("impl ")
}

fn now_nanos() -> u64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64
}
