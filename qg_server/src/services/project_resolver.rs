//! Project resolution: one end-to-end protocol run for an analysis handle.
//!
//! Every failure is logged and turned into `None`: callers treat absence as
//! "nothing to display", never as a fatal condition.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ResolutionError, WsError};
use crate::models::analysis::AnalysisHandle;
use crate::models::installation::{normalize_url, Installations, ServerInstallation};
use crate::models::project_information::ProjectInformation;
use crate::models::version::Version;
use crate::services::protocol::SQ_5_6;
use crate::services::transport::HttpTransport;
use crate::services::ws_client::WsClient;

/// Resolves a handle into displayable project information.
#[async_trait]
pub trait ResolveProject: Send + Sync {
    async fn resolve(&self, handle: &AnalysisHandle) -> Option<ProjectInformation>;
}

/// Resolver backed by the SonarQube web services.
///
/// Handles with a CE task id go through the CE task protocol; handles that
/// only carry a dashboard URL fall back to the deprecated dashboard path.
#[derive(Clone)]
pub struct ProjectResolver {
    pub(crate) transport: Arc<dyn HttpTransport>,
    pub(crate) installations: Arc<Installations>,
}

impl ProjectResolver {
    pub fn new(transport: Arc<dyn HttpTransport>, installations: Arc<Installations>) -> Self {
        Self {
            transport,
            installations,
        }
    }

    pub async fn try_resolve(
        &self,
        handle: &AnalysisHandle,
    ) -> Result<ProjectInformation, ResolutionError> {
        if handle.ce_task_id.is_none() && handle.dashboard_url.is_some() {
            return self.resolve_dashboard(handle).await;
        }
        self.resolve_ce_task(handle).await
    }

    pub(crate) fn installation(&self, name: &str) -> Result<&ServerInstallation, ResolutionError> {
        self.installations
            .get(name)
            .ok_or_else(|| ResolutionError::UnknownInstallation(name.to_string()))
    }

    async fn resolve_ce_task(
        &self,
        handle: &AnalysisHandle,
    ) -> Result<ProjectInformation, ResolutionError> {
        let inst = self.installation(&handle.installation_name)?;

        let server_url = handle
            .server_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(ResolutionError::NothingTracked)?;
        let task_id = handle
            .ce_task_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(ResolutionError::NothingTracked)?;

        // Credentials only ever go to the installation's own server.
        let server_url = normalize_url(server_url);
        let configured = inst.effective_server_url();
        if server_url != configured {
            return Err(ResolutionError::InconsistentServerUrl {
                parsed: server_url,
                configured,
            });
        }

        let client = WsClient::new(self.transport.as_ref(), &server_url, inst.credentials());

        let raw_version = client.server_version().await?;
        let version =
            Version::parse(&raw_version).ok_or(ResolutionError::InvalidVersion(raw_version))?;
        if !version.is_at_least(SQ_5_6) {
            return Err(ResolutionError::UnsupportedVersion {
                found: version.to_string(),
                minimum: SQ_5_6.to_string(),
            });
        }

        let task = client.ce_task(task_id).await?;
        let key = handle
            .dashboard_project_key()
            .unwrap_or(&task.component_key)
            .to_string();

        let mut info = ProjectInformation::new(Some(key))
            .with_name(task.component_name.as_str())
            .with_url(handle.dashboard_url.clone())
            .with_ce_status(task.status.as_str())
            .with_ce_url(task.url.as_str());

        if let Some(analysis_id) = task.analysis_id.as_deref() {
            let status = client.quality_gate_status(analysis_id).await?;
            info = info.with_status(status);
        }

        Ok(info)
    }
}

#[async_trait]
impl ResolveProject for ProjectResolver {
    async fn resolve(&self, handle: &AnalysisHandle) -> Option<ProjectInformation> {
        match self.try_resolve(handle).await {
            Ok(info) => {
                crate::metrics::resolution("resolved");
                tracing::debug!(
                    installation = %handle.installation_name,
                    task_id = ?handle.ce_task_id,
                    ce_status = ?info.ce_status(),
                    status = ?info.status(),
                    "Resolved project information"
                );
                Some(info)
            }
            Err(e) => {
                crate::metrics::resolution(e.kind());
                log_failure(handle, &e);
                None
            }
        }
    }
}

fn log_failure(handle: &AnalysisHandle, e: &ResolutionError) {
    match e {
        ResolutionError::NothingTracked => {
            tracing::debug!(installation = %handle.installation_name, "No analysis tracked");
        }
        e if e.is_configuration() => {
            tracing::info!(
                installation = %handle.installation_name,
                task_id = ?handle.ce_task_id,
                "Skipping quality gate resolution: {e}"
            );
        }
        ResolutionError::Ws(WsError::Parse { url, body, reason }) => {
            tracing::warn!(
                installation = %handle.installation_name,
                url = %url,
                body = %body,
                "Error fetching project information: unparseable response: {reason}"
            );
        }
        e => {
            tracing::warn!(
                installation = %handle.installation_name,
                task_id = ?handle.ce_task_id,
                error = %e,
                "Error fetching project information"
            );
        }
    }
}
