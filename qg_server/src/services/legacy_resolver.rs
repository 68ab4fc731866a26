//! Deprecated dashboard-URL resolution for handles without a CE task id.
//!
//! The project key and server URL are taken from a
//! `{server}/dashboard/index/{key}` URL and the quality gate is read through
//! whichever protocol variant the server version calls for.

use crate::error::{ResolutionError, WsError};
use crate::models::analysis::{extract_project_key, extract_server_url, AnalysisHandle};
use crate::models::installation::normalize_url;
use crate::models::project_information::ProjectInformation;
use crate::models::version::Version;
use crate::services::project_resolver::ProjectResolver;
use crate::services::protocol::{ProtocolVariant, SQ_5_2};
use crate::services::ws_client::WsClient;

impl ProjectResolver {
    pub(crate) async fn resolve_dashboard(
        &self,
        handle: &AnalysisHandle,
    ) -> Result<ProjectInformation, ResolutionError> {
        let inst = self.installation(&handle.installation_name)?;

        let dashboard_url = handle
            .dashboard_url
            .as_deref()
            .ok_or(ResolutionError::NothingTracked)?;
        let (server_url, project_key) = match (
            extract_server_url(dashboard_url),
            extract_project_key(dashboard_url),
        ) {
            (Some(server), Some(key)) => (normalize_url(server), key),
            _ => return Err(ResolutionError::InvalidDashboardUrl(dashboard_url.to_string())),
        };

        let configured = inst.effective_server_url();
        if configured != server_url {
            return Err(ResolutionError::InconsistentServerUrl {
                parsed: server_url,
                configured,
            });
        }

        let client = WsClient::new(self.transport.as_ref(), &server_url, inst.credentials());

        // An administrator-declared version pins the protocol, even below 5.2.
        let version = match inst.version_override.as_deref() {
            Some(pinned) => Version::parse(pinned)
                .ok_or_else(|| ResolutionError::InvalidVersion(pinned.to_string()))?,
            None => {
                let raw = client.server_version().await?;
                let version = Version::parse(&raw).ok_or(ResolutionError::InvalidVersion(raw))?;
                if !version.is_at_least(SQ_5_2) {
                    return Err(ResolutionError::UnsupportedVersion {
                        found: version.to_string(),
                        minimum: SQ_5_2.to_string(),
                    });
                }
                version
            }
        };

        let variant = ProtocolVariant::for_version(&version);
        tracing::debug!(%version, ?variant, project_key, "Resolving through dashboard url");

        let mut info = ProjectInformation::new(Some(project_key.to_string()))
            .with_url(Some(dashboard_url.to_string()));

        match variant.quality_gate(&client, project_key).await {
            Ok(Some(qg)) => {
                info = info.with_status(qg.status);
                if let Some(name) = qg.project_name {
                    info = info.with_name(name);
                }
            }
            Ok(None) => {}
            // Reported by the server for this project; shown instead of a badge.
            Err(WsError::ServerMessages(messages)) => return Ok(info.with_errors(messages)),
            Err(e) => return Err(e.into()),
        }

        if info.project_name().is_none() {
            if let Some(name) = variant.project_name(&client, project_key).await? {
                info = info.with_name(name);
            }
        }

        Ok(info)
    }
}
