use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;
use trylens_capture::envelope::CORRELATION_HEADER;
use trylens_capture::sampler::{decide, Decision, Sampler, SAMPLE_HEADER};
use trylens_core::ids::TryId;
use trylens_core::model::record::TryRecord;
use trylens_core::query::{IssuesView, MethodsView, TraceView};

use crate::service::TryService;

const MAX_PAGE_SIZE: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub service: TryService,
    pub sampler: Sampler,
}

pub fn router(service: TryService, sampler: Sampler) -> Router {
    let state = AppState { service, sampler };
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);
    Router::new()
        .route("/tries/{try_id}", get(summary))
        .route("/tries/{try_id}/trace", get(trace))
        .route("/tries/{try_id}/issues", get(issues))
        .route("/tries/{try_id}/methods", get(methods))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            sample_request,
        ))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .on_request(tower_http::trace::DefaultOnRequest::new().level(Level::INFO))
                .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Sampling decision for every request. A malformed marker is rejected before
/// the handler runs; a sampled request gets its try id echoed back in the
/// correlation header.
async fn sample_request(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let marker = req
        .headers()
        .get(SAMPLE_HEADER)
        .and_then(|v| v.to_str().ok());
    let decision = match decide(marker) {
        Ok(decision) => decision,
        Err(err) => return ApiError::bad_request(err.to_string()).into_response(),
    };

    match decision {
        Decision::Sampled(id) => {
            let mut response = state
                .sampler
                .sampled_scope(Decision::Sampled(id.clone()), next.run(req))
                .await;
            if let Ok(value) = HeaderValue::from_str(id.as_str()) {
                response.headers_mut().insert(CORRELATION_HEADER, value);
            }
            response
        }
        Decision::Unsampled => next.run(req).await,
    }
}

async fn summary(
    State(state): State<AppState>,
    Path(try_id): Path<String>,
) -> Result<Json<TryRecord>, ApiError> {
    let id = parse_id(&try_id)?;
    Ok(Json(state.service.summary(&id).await))
}

async fn trace(
    State(state): State<AppState>,
    Path(try_id): Path<String>,
) -> Result<Json<TraceView>, ApiError> {
    let id = parse_id(&try_id)?;
    Ok(Json(state.service.trace(&id).await))
}

async fn issues(
    State(state): State<AppState>,
    Path(try_id): Path<String>,
) -> Result<Json<IssuesView>, ApiError> {
    let id = parse_id(&try_id)?;
    Ok(Json(state.service.issues(&id).await))
}

#[derive(Debug, Deserialize)]
struct MethodsParams {
    page: Option<usize>,
    size: Option<usize>,
}

async fn methods(
    State(state): State<AppState>,
    Path(try_id): Path<String>,
    Query(params): Query<MethodsParams>,
) -> Result<Json<MethodsView>, ApiError> {
    let id = parse_id(&try_id)?;
    let page = params.page.unwrap_or(0);
    let size = params.size.unwrap_or(20);
    if size == 0 || size > MAX_PAGE_SIZE {
        return Err(ApiError::bad_request(format!(
            "size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    Ok(Json(state.service.methods(&id, page, size).await))
}

fn parse_id(raw: &str) -> Result<TryId, ApiError> {
    TryId::parse(raw).map_err(|err| ApiError::bad_request(err.to_string()))
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}
