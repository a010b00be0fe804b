use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use serde_json::Value;
use tower::ServiceExt;
use trylens::http::router;
use trylens::service::TryService;
use trylens_capture::hook::TraceHook;
use trylens_capture::sampler::Sampler;
use trylens_capture::{context, sampler};
use trylens_core::config::Config;
use trylens_core::ids::TryId;
use trylens_store::{BackendStore, MemoryStore, TraceStore, TryRegistry};

fn memory_app() -> (Router, MemoryStore, TryRegistry) {
    let memory = MemoryStore::new(256);
    let registry = TryRegistry::new();
    let service = TryService::new(TraceStore::Memory(memory.clone()), registry.clone());
    let app = router(service, Sampler::new(registry.clone()));
    (app, memory, registry)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn unknown_try_id_reads_as_pending() {
    let (app, _, _) = memory_app();
    let id = TryId::generate();

    let (status, body) = get_json(&app, &format!("/tries/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["span_count"], 0);
    assert!(body["created_at"].is_null());
}

#[tokio::test]
async fn malformed_try_id_is_rejected_on_every_endpoint() {
    let (app, _, _) = memory_app();

    for path in [
        "/tries/not-hex",
        "/tries/not-hex/trace",
        "/tries/not-hex/issues",
        "/tries/not-hex/methods",
    ] {
        let (status, body) = get_json(&app, path).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
        assert!(body["error"].is_string(), "{path}");
    }
}

#[tokio::test]
async fn sampled_request_echoes_correlation_header_and_registers() {
    let (app, _, registry) = memory_app();
    let probe = TryId::generate();

    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/tries/{probe}"))
                .header(sampler::SAMPLE_HEADER, "on")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let echoed = response
        .headers()
        .get("x-try-id")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    let minted = TryId::parse(echoed).unwrap();
    assert!(registry.get(&minted).is_some());
}

#[tokio::test]
async fn malformed_sample_marker_is_rejected_before_the_handler() {
    let (app, _, _) = memory_app();
    let probe = TryId::generate();

    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/tries/{probe}"))
                .header(sampler::SAMPLE_HEADER, "definitely-not-an-id")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn recorded_trace_flows_through_all_read_endpoints() {
    let (app, memory, _) = memory_app();
    let id = TryId::generate();
    for span in testkit::sample_trace() {
        memory.record(&id, span);
    }

    let (status, summary) = get_json(&app, &format!("/tries/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["status"], "completed");
    assert_eq!(summary["span_count"], 3);
    assert_eq!(summary["total_duration_ms"], 1000);
    assert!(summary["issue_count"].as_u64().unwrap() >= 1);

    let (_, trace) = get_json(&app, &format!("/tries/{id}/trace")).await;
    assert_eq!(trace["roots"].as_array().unwrap().len(), 1);
    let root = &trace["roots"][0];
    assert_eq!(root["class_name"], "orders.OrderService");
    assert_eq!(root["method_name"], "checkout");
    assert_eq!(root["children"].as_array().unwrap().len(), 2);

    // The repository call takes 600 of 1000ms: a database issue.
    let (_, issues) = get_json(&app, &format!("/tries/{id}/issues")).await;
    let kinds: Vec<&str> = issues["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["kind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"slow-database-call"), "{kinds:?}");

    let (_, methods) = get_json(&app, &format!("/tries/{id}/methods?page=0&size=2")).await;
    assert_eq!(methods["total_count"], 3);
    assert_eq!(methods["items"].as_array().unwrap().len(), 2);
    assert_eq!(methods["has_more"], true);
    // Self-duration descending: the repository span leads.
    assert_eq!(methods["items"][0]["span_id"], "00000000000000b2");
}

#[tokio::test]
async fn hook_spans_reach_the_api_with_parent_links() {
    let (app, memory, registry) = memory_app();
    let mut cfg = Config::default();
    cfg.allow_namespaces = vec!["orders".to_string()];
    let hook = TraceHook::from_config(TraceStore::Memory(memory.clone()), &cfg);
    let sampler = Sampler::new(registry);
    let id = TryId::generate();

    sampler
        .sampled_scope(sampler::Decision::Sampled(id.clone()), async {
            let outer = hook.begin("orders.OrderService", "checkout", &[]).unwrap();
            let inner = hook.begin("orders.OrderRepository", "query", &[]).unwrap();
            hook.end(inner, None);
            hook.end(outer, None);
            assert_eq!(context::current(), Some(id.clone()));
        })
        .await;

    let (_, trace) = get_json(&app, &format!("/tries/{id}/trace")).await;
    assert_eq!(trace["status"], "completed");
    let roots = trace["roots"].as_array().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["display_name"], "orders.OrderService.checkout()");
    assert_eq!(roots[0]["children"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn pagination_bounds_are_enforced() {
    let (app, _, _) = memory_app();
    let id = TryId::generate();

    for query in ["size=0", "size=101"] {
        let (status, body) = get_json(&app, &format!("/tries/{id}/methods?{query}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{query}");
        assert!(body["error"].is_string());
    }

    let (status, body) = get_json(&app, &format!("/tries/{id}/methods?page=3&size=100")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], 3);
    assert_eq!(body["size"], 100);
}

#[derive(Clone)]
struct StubState {
    attempts: Arc<AtomicUsize>,
    not_found_attempts: usize,
    payload: Arc<Vec<u8>>,
}

async fn stub_query(State(state): State<StubState>) -> axum::response::Response {
    let attempt = state.attempts.fetch_add(1, Ordering::SeqCst);
    if attempt < state.not_found_attempts {
        return StatusCode::NOT_FOUND.into_response();
    }
    state.payload.as_ref().clone().into_response()
}

async fn spawn_stub_backend(not_found_attempts: usize, payload: Vec<u8>) -> (String, Arc<AtomicUsize>) {
    let attempts = Arc::new(AtomicUsize::new(0));
    let stub = Router::new()
        .route("/api/traces:query", post(stub_query))
        .with_state(StubState {
            attempts: attempts.clone(),
            not_found_attempts,
            payload: Arc::new(payload),
        });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, stub).await.unwrap();
    });
    (format!("http://{addr}"), attempts)
}

#[tokio::test]
async fn backend_mode_polls_until_the_trace_is_indexed() {
    let id = TryId::generate();
    let trace_id = "0af7651916cd43dd8448eb211c80319c";
    let payload =
        testkit::encode_traces_data(&testkit::traces_data(id.as_str(), trace_id, &testkit::sample_trace()));
    let (endpoint, attempts) = spawn_stub_backend(2, payload).await;

    let store = BackendStore::new(
        endpoint,
        Duration::from_millis(10),
        Duration::from_millis(40),
        Duration::from_secs(5),
    );
    let registry = TryRegistry::new();
    let service = TryService::new(TraceStore::Backend(store), registry.clone());
    let app = router(service, Sampler::new(registry));

    let (status, summary) = get_json(&app, &format!("/tries/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["status"], "completed");
    assert_eq!(summary["trace_id"], trace_id);
    assert_eq!(summary["span_count"], 3);
    assert!(attempts.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn backend_mode_degrades_to_pending_when_the_budget_runs_out() {
    let id = TryId::generate();
    let (endpoint, _) = spawn_stub_backend(usize::MAX, Vec::new()).await;

    let store = BackendStore::new(
        endpoint,
        Duration::from_millis(5),
        Duration::from_millis(10),
        Duration::from_millis(60),
    );
    let registry = TryRegistry::new();
    let service = TryService::new(TraceStore::Backend(store), registry.clone());
    let app = router(service, Sampler::new(registry));

    let (status, summary) = get_json(&app, &format!("/tries/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["status"], "pending");
    assert_eq!(summary["span_count"], 0);
}
