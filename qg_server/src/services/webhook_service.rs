//! SonarQube webhook integration.
//!
//! Deliveries are checked against the shared secret, decoded into
//! [`TaskCompleted`] events and fanned out to waiting listeners.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tokio::sync::broadcast;

use crate::error::WebhookError;
use crate::models::ce_task::{CeStatus, TaskCompleted};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC-SHA256 of the raw body.
pub const SIGNATURE_HEADER: &str = "x-sonar-webhook-hmac-sha256";

/// Quality-gate status reported for successful tasks without a gate.
pub const NO_QUALITY_GATE: &str = "NONE";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload {
    task_id: String,
    status: String,
    #[serde(default)]
    quality_gate: Option<QualityGateJson>,
}

#[derive(Deserialize)]
struct QualityGateJson {
    status: String,
}

/// Validate a SonarQube webhook signature.
pub fn validate_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        tracing::debug!("Webhook secret not configured, skipping validation");
        return true;
    }

    let sig_bytes = match hex::decode(signature.trim()) {
        Ok(b) => b,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(payload);

    mac.verify_slice(&sig_bytes).is_ok()
}

/// Parse a webhook body into a task-completion event.
pub fn parse_payload(body: &[u8]) -> Result<TaskCompleted, WebhookError> {
    let payload: WebhookPayload = serde_json::from_slice(body)?;
    let task_status = CeStatus::parse(&payload.status);
    let quality_gate_status = (task_status == CeStatus::Success).then(|| {
        payload
            .quality_gate
            .map(|qg| qg.status)
            .unwrap_or_else(|| NO_QUALITY_GATE.to_string())
    });

    Ok(TaskCompleted {
        task_id: payload.task_id,
        task_status,
        quality_gate_status,
    })
}

/// Fan-out of task-completion events to every waiting listener.
#[derive(Clone)]
pub struct WebhookHub {
    sender: broadcast::Sender<TaskCompleted>,
}

impl Default for WebhookHub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl WebhookHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskCompleted> {
        self.sender.subscribe()
    }

    /// Returns the number of listeners notified.
    pub fn publish(&self, event: TaskCompleted) -> usize {
        // No receivers is a normal state.
        self.sender.send(event).unwrap_or(0)
    }
}
