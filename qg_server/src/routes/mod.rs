//! Quality-gate service HTTP routes: builds, quality gates, webhook.

pub mod api;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::{get, post, put};
use axum::Router;
use chrono::Utc;

use crate::config::QgConfig;
use crate::error::WaitError;
use crate::models::analysis::AnalysisHandle;
use crate::models::installation::Installations;
use crate::services::build_registry::BuildRegistry;
use crate::services::project_resolver::{ProjectResolver, ResolveProject};
use crate::services::quality_gate_waiter::{QualityGateOutcome, QualityGateWaiter};
use crate::services::transport::HttpTransport;
use crate::services::webhook_service::WebhookHub;

/// Shared state for route handlers.
#[derive(Clone)]
pub struct QgRouterState {
    pub config: QgConfig,
    pub resolver: Arc<dyn ResolveProject>,
    pub registry: Arc<BuildRegistry>,
    pub waiter: QualityGateWaiter,
    pub hub: WebhookHub,
}

impl QgRouterState {
    /// Wire the web-service backed services around one transport.
    pub fn new(
        config: QgConfig,
        transport: Arc<dyn HttpTransport>,
        installations: Arc<Installations>,
    ) -> Self {
        let hub = WebhookHub::default();
        let resolver = ProjectResolver::new(transport.clone(), installations.clone());
        let waiter = QualityGateWaiter::new(transport, installations, hub.clone());
        let registry = BuildRegistry::new(config.cache_policy(), config.max_builds);
        Self {
            config,
            resolver: Arc::new(resolver),
            registry: Arc::new(registry),
            waiter,
            hub,
        }
    }
}

/// Build the service's Axum router.
pub fn qg_router(state: QgRouterState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Webhook
        .route("/sonarqube-webhook", post(webhook_handler))
        // Build API
        .route(
            "/api/builds/{build_id}",
            put(put_build).get(get_build).delete(delete_build),
        )
        .route("/api/builds/{build_id}/analyses", post(add_analysis))
        .route("/api/builds/{build_id}/quality-gates", get(build_quality_gates))
        // Quality gate API
        .route("/api/quality-gate/{task_id}", get(wait_quality_gate))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

// ── Webhook ──

async fn webhook_handler(
    State(state): State<QgRouterState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, StatusCode> {
    webhook::handle_webhook(&state, &headers, body).await
}

// ── Build API ──

async fn put_build(
    State(state): State<QgRouterState>,
    Path(build_id): Path<String>,
    Json(req): Json<api::BuildRequest>,
) -> Json<api::BuildJson> {
    let completed_at = req.completed_at.unwrap_or_else(Utc::now);
    let record = state
        .registry
        .upsert(&build_id, completed_at, req.analyses)
        .await;
    Json(api::BuildJson::from_record(&record).await)
}

async fn get_build(
    State(state): State<QgRouterState>,
    Path(build_id): Path<String>,
) -> Result<Json<api::BuildJson>, StatusCode> {
    let record = state.registry.get(&build_id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(api::BuildJson::from_record(&record).await))
}

async fn delete_build(
    State(state): State<QgRouterState>,
    Path(build_id): Path<String>,
) -> StatusCode {
    if state.registry.remove(&build_id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn add_analysis(
    State(state): State<QgRouterState>,
    Path(build_id): Path<String>,
    Json(handle): Json<AnalysisHandle>,
) -> (StatusCode, Json<api::BuildJson>) {
    let record = state
        .registry
        .add_analysis(&build_id, handle, Utc::now())
        .await;
    (
        StatusCode::CREATED,
        Json(api::BuildJson::from_record(&record).await),
    )
}

async fn build_quality_gates(
    State(state): State<QgRouterState>,
    Path(build_id): Path<String>,
) -> Result<Json<api::QualityGatesJson>, StatusCode> {
    let record = state.registry.get(&build_id).ok_or(StatusCode::NOT_FOUND)?;
    let projects = record.project_information(state.resolver.as_ref()).await;

    Ok(Json(api::QualityGatesJson {
        build_id,
        projects: projects
            .iter()
            .map(|p| api::ProjectInformationJson::from(p.as_ref()))
            .collect(),
    }))
}

// ── Quality gate API ──

async fn wait_quality_gate(
    State(state): State<QgRouterState>,
    Path(task_id): Path<String>,
    Query(query): Query<api::WaitQuery>,
) -> Result<Json<QualityGateOutcome>, StatusCode> {
    let timeout = Duration::from_secs(query.wait_secs.unwrap_or(api::DEFAULT_WAIT_SECS));

    state
        .waiter
        .wait(&query.installation, &task_id, timeout)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::warn!(task_id = %task_id, "Quality gate wait failed: {e}");
            match e {
                WaitError::UnknownInstallation(_) => StatusCode::NOT_FOUND,
                WaitError::Ws(_) => StatusCode::BAD_GATEWAY,
                WaitError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                WaitError::Closed => StatusCode::SERVICE_UNAVAILABLE,
            }
        })
}
