//! REST API payloads for builds and quality gates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::analysis::AnalysisHandle;
use crate::models::project_information::{BadgeStatus, ProjectInformation};
use crate::services::build_registry::BuildRecord;

/// Body of `PUT /api/builds/{build_id}`.
#[derive(Debug, Deserialize)]
pub struct BuildRequest {
    /// Defaults to the time of the request.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub analyses: Vec<AnalysisHandle>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BuildJson {
    pub build_id: String,
    pub completed_at: DateTime<Utc>,
    pub analyses: Vec<AnalysisHandle>,
}

impl BuildJson {
    pub async fn from_record(record: &BuildRecord) -> Self {
        Self {
            build_id: record.id.clone(),
            completed_at: record.completed_at().await,
            analyses: record.analyses().await,
        }
    }
}

/// JSON view of one resolved project.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectInformationJson {
    pub project_key: Option<String>,
    pub project_name: Option<String>,
    pub url: Option<String>,
    pub status: Option<String>,
    pub badge_status: BadgeStatus,
    pub ce_status: Option<String>,
    pub ce_url: Option<String>,
    pub errors: Vec<String>,
    pub has_errors: bool,
    pub created: DateTime<Utc>,
}

impl From<&ProjectInformation> for ProjectInformationJson {
    fn from(info: &ProjectInformation) -> Self {
        Self {
            project_key: info.project_key().map(str::to_string),
            project_name: info.project_name().map(str::to_string),
            url: info.url().map(str::to_string),
            status: info.status().map(str::to_string),
            badge_status: info.badge_status(),
            ce_status: info.ce_status().map(str::to_string),
            ce_url: info.ce_url().map(str::to_string),
            errors: info.errors().to_vec(),
            has_errors: info.has_errors(),
            created: info.created(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QualityGatesJson {
    pub build_id: String,
    pub projects: Vec<ProjectInformationJson>,
}

#[derive(Debug, Deserialize)]
pub struct WaitQuery {
    pub installation: String,
    /// Seconds to wait for the webhook before giving up.
    pub wait_secs: Option<u64>,
}

pub const DEFAULT_WAIT_SECS: u64 = 300;
