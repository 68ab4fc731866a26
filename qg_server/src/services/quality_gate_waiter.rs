//! Wait for the quality gate of one CE task.
//!
//! The task is checked once against the server. If it is still queued or
//! running, the waiter parks until the webhook reports the task finished.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::error::WaitError;
use crate::models::ce_task::{CeStatus, TaskCompleted};
use crate::models::installation::Installations;
use crate::services::transport::HttpTransport;
use crate::services::webhook_service::{WebhookHub, NO_QUALITY_GATE};
use crate::services::ws_client::WsClient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityGateOutcome {
    pub task_id: String,
    pub task_status: CeStatus,
    pub quality_gate_status: Option<String>,
}

impl From<TaskCompleted> for QualityGateOutcome {
    fn from(event: TaskCompleted) -> Self {
        Self {
            task_id: event.task_id,
            task_status: event.task_status,
            quality_gate_status: event.quality_gate_status,
        }
    }
}

#[derive(Clone)]
pub struct QualityGateWaiter {
    transport: Arc<dyn HttpTransport>,
    installations: Arc<Installations>,
    hub: WebhookHub,
}

impl QualityGateWaiter {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        installations: Arc<Installations>,
        hub: WebhookHub,
    ) -> Self {
        Self {
            transport,
            installations,
            hub,
        }
    }

    pub async fn wait(
        &self,
        installation_name: &str,
        task_id: &str,
        timeout: Duration,
    ) -> Result<QualityGateOutcome, WaitError> {
        // Subscribe before checking so a notification arriving in between is not lost.
        let mut events = self.hub.subscribe();

        if let Some(outcome) = self.check(installation_name, task_id).await? {
            return Ok(outcome);
        }
        tracing::info!(task_id, "Task not completed yet, waiting for webhook");

        let waiting = async {
            loop {
                match events.recv().await {
                    Ok(event) if event.task_id == task_id => return Ok(event.into()),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(task_id, skipped, "Missed webhook notifications, re-checking task");
                        if let Some(outcome) = self.check(installation_name, task_id).await? {
                            return Ok(outcome);
                        }
                    }
                    Err(RecvError::Closed) => return Err(WaitError::Closed),
                }
            }
        };

        tokio::time::timeout(timeout, waiting)
            .await
            .map_err(|_| WaitError::Timeout(task_id.to_string()))?
    }

    /// `Some` once the task reached a terminal state.
    async fn check(
        &self,
        installation_name: &str,
        task_id: &str,
    ) -> Result<Option<QualityGateOutcome>, WaitError> {
        let inst = self
            .installations
            .get(installation_name)
            .ok_or_else(|| WaitError::UnknownInstallation(installation_name.to_string()))?;
        let client = WsClient::new(
            self.transport.as_ref(),
            &inst.effective_server_url(),
            inst.credentials(),
        );

        let task = client.ce_task(task_id).await?;
        tracing::debug!(task_id, status = %task.status, "Checked CE task");

        let quality_gate_status = match (&task.status, task.analysis_id.as_deref()) {
            (CeStatus::Success, Some(analysis_id)) => {
                Some(client.quality_gate_status(analysis_id).await?)
            }
            (CeStatus::Success, None) => Some(NO_QUALITY_GATE.to_string()),
            (status, _) if status.is_terminal() => None,
            _ => return Ok(None),
        };

        Ok(Some(QualityGateOutcome {
            task_id: task_id.to_string(),
            task_status: task.status,
            quality_gate_status,
        }))
    }
}
