//! SonarQube webhook handler: receives CE task completions.

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;

use crate::error::WebhookError;
use crate::models::ce_task::TaskCompleted;
use crate::services::webhook_service::{self, SIGNATURE_HEADER};

use super::QgRouterState;

/// Handle an incoming SonarQube webhook payload.
pub async fn handle_webhook(
    state: &QgRouterState,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<StatusCode, StatusCode> {
    let event = parse_delivery(state, headers, &body).map_err(|e| {
        crate::metrics::webhook_received("rejected");
        match e {
            WebhookError::InvalidSignature => {
                tracing::warn!("Webhook signature validation failed");
                StatusCode::UNAUTHORIZED
            }
            WebhookError::InvalidPayload(e) => {
                tracing::warn!("Invalid webhook payload: {e}");
                StatusCode::BAD_REQUEST
            }
        }
    })?;

    crate::metrics::webhook_received(event.task_status.metric_label());
    tracing::info!(
        task_id = %event.task_id,
        status = %event.task_status,
        quality_gate = event.quality_gate_status.as_deref().unwrap_or("-"),
        "Received CE task completion"
    );

    let builds = state.registry.apply_task_completion(&event, Utc::now());
    let listeners = state.hub.publish(event);
    tracing::debug!(builds, listeners, "Dispatched task completion");

    Ok(StatusCode::OK)
}

fn parse_delivery(
    state: &QgRouterState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<TaskCompleted, WebhookError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !webhook_service::validate_signature(&state.config.webhook_secret, body, signature) {
        return Err(WebhookError::InvalidSignature);
    }

    webhook_service::parse_payload(body)
}
