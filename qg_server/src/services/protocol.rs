//! Web-service protocol variants, selected by server version.

use crate::error::WsError;
use crate::models::ce_task::ProjectQualityGate;
use crate::models::version::{StaticVersion, Version};
use crate::services::ws_client::WsClient;

/// First version with CE tasks and the measures API.
pub const SQ_5_2: StaticVersion = StaticVersion::new(5, 2);
/// First version with analysis-id based quality gates.
pub const SQ_5_6: StaticVersion = StaticVersion::new(5, 6);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVariant {
    /// `/api/resources`, before 5.2.
    LegacyResourceApi,
    /// `/api/measures/component`, 5.2 up to 5.6.
    LegacyMeasureApi,
    /// `/api/qualitygates/project_status` and CE tasks, 5.6 and later.
    ModernCeTaskApi,
}

impl ProtocolVariant {
    pub fn for_version(version: &Version) -> Self {
        if version.is_at_least(SQ_5_6) {
            ProtocolVariant::ModernCeTaskApi
        } else if version.is_at_least(SQ_5_2) {
            ProtocolVariant::LegacyMeasureApi
        } else {
            ProtocolVariant::LegacyResourceApi
        }
    }

    pub async fn quality_gate(
        &self,
        client: &WsClient<'_>,
        project_key: &str,
    ) -> Result<Option<ProjectQualityGate>, WsError> {
        match self {
            ProtocolVariant::LegacyResourceApi => client.quality_gate_by_resources(project_key).await,
            ProtocolVariant::LegacyMeasureApi => client.quality_gate_by_measures(project_key).await,
            ProtocolVariant::ModernCeTaskApi => client
                .quality_gate_by_project_key(project_key)
                .await
                .map(Some),
        }
    }

    /// The resources API always reports the name with the quality gate, so a
    /// missing name there means the project has no resource at all.
    pub async fn project_name(
        &self,
        client: &WsClient<'_>,
        project_key: &str,
    ) -> Result<Option<String>, WsError> {
        match self {
            ProtocolVariant::LegacyResourceApi => Ok(None),
            ProtocolVariant::LegacyMeasureApi | ProtocolVariant::ModernCeTaskApi => {
                client.project_name(project_key).await.map(Some)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(v: &str) -> ProtocolVariant {
        ProtocolVariant::for_version(&Version::parse(v).unwrap())
    }

    #[test]
    fn test_variant_selection() {
        assert_eq!(variant("4.5.7"), ProtocolVariant::LegacyResourceApi);
        assert_eq!(variant("5.1"), ProtocolVariant::LegacyResourceApi);
        assert_eq!(variant("5.2"), ProtocolVariant::LegacyMeasureApi);
        assert_eq!(variant("5.5"), ProtocolVariant::LegacyMeasureApi);
        assert_eq!(variant("5.6"), ProtocolVariant::ModernCeTaskApi);
        assert_eq!(variant("9.9.1.69595"), ProtocolVariant::ModernCeTaskApi);
    }
}
