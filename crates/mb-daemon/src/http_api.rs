use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{StatusCode, Uri},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use mb_core::planning::{NewLog, NewPlan, NewSnapshot, NewTask, PlanningStore};
use mb_core::types::{ModelHealthSource, RequestOutcome};
use mb_harness::memory_sink::MemorySink;
use mb_telemetry::tracing_setup::request_id_middleware;
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api_error::ApiError;
use crate::daemon::Monitor;

/// Shared state behind every route.
pub struct ApiState {
    pub monitor: Arc<Monitor>,
    pub store: Arc<PlanningStore>,
    pub sink: Arc<dyn MemorySink>,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(monitor: Arc<Monitor>, store: Arc<PlanningStore>, sink: Arc<dyn MemorySink>) -> Self {
        Self {
            monitor,
            store,
            sink,
            started_at: Instant::now(),
        }
    }

    /// Mirror a freshly created record to the memory sink without blocking
    /// the response.
    fn mirror<T: Serialize>(&self, entity_type: &'static str, id: i64, input: &T) {
        let mut data = serde_json::to_value(input).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut data {
            map.insert("id".into(), json!(id));
        }
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            sink.persist(entity_type, &data).await;
        });
    }
}

pub fn api_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/mama-bear/metrics", get(get_metrics))
        .route("/api/mama-bear/status", get(get_status))
        .route("/api/mama-bear/outcomes", post(post_outcome))
        .route(
            "/podplay-planning/podplay_logs",
            get(list_logs).post(create_log),
        )
        .route(
            "/podplay-planning/podplay_tasks",
            get(list_tasks).post(create_task),
        )
        .route(
            "/podplay-planning/podplay_plans",
            get(list_plans).post(create_plan),
        )
        .route(
            "/podplay-planning/podplay_context_snapshots",
            get(list_snapshots).post(create_snapshot),
        )
        .fallback(not_found)
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Monitoring
// ---------------------------------------------------------------------------

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("no route for {}", uri.path()))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn get_metrics(State(state): State<Arc<ApiState>>) -> Json<Value> {
    let reporter = &state.monitor.reporter;
    Json(json!({
        "success": true,
        "current_metrics": reporter.current_metrics(),
        "daily_report": reporter.generate_report(),
        "timestamp": Utc::now(),
    }))
}

async fn get_status(State(state): State<Arc<ApiState>>) -> Json<Value> {
    Json(json!({
        "success": true,
        "status": {
            "uptime_seconds": state.started_at.elapsed().as_secs(),
            "model_health": state.monitor.health.model_status(),
            "quota_usage": state.monitor.ledger.get_status(),
        },
        "timestamp": Utc::now(),
    }))
}

async fn post_outcome(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<RequestOutcome>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(outcome) = body?;
    state.monitor.ingest(outcome);
    Ok((StatusCode::ACCEPTED, Json(json!({ "success": true }))))
}

// ---------------------------------------------------------------------------
// Planning records
// ---------------------------------------------------------------------------

fn created(id: i64) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(json!({ "id": id })))
}

async fn list_logs(State(state): State<Arc<ApiState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.list_logs().await?))
}

async fn create_log(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<NewLog>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(input) = body?;
    let id = state.store.create_log(input.clone()).await?;
    state.mirror("log", id, &input);
    Ok(created(id))
}

async fn list_tasks(State(state): State<Arc<ApiState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.list_tasks().await?))
}

async fn create_task(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<NewTask>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(input) = body?;
    let id = state.store.create_task(input.clone()).await?;
    state.mirror("task", id, &input);
    Ok(created(id))
}

async fn list_plans(State(state): State<Arc<ApiState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.list_plans().await?))
}

async fn create_plan(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<NewPlan>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(input) = body?;
    let id = state.store.create_plan(input.clone()).await?;
    state.mirror("plan", id, &input);
    Ok(created(id))
}

async fn list_snapshots(State(state): State<Arc<ApiState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.list_snapshots().await?))
}

async fn create_snapshot(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<NewSnapshot>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(input) = body?;
    let id = state.store.create_snapshot(input.clone()).await?;
    state.mirror("context_snapshot", id, &input);
    Ok(created(id))
}
