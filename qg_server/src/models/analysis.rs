//! Analysis handles recorded by builds once an analysis was submitted.

use serde::{Deserialize, Serialize};

const DASHBOARD_MARKER: &str = "/dashboard";
const DASHBOARD_INDEX_MARKER: &str = "/dashboard/index/";

/// Identifies one analysis attempt of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisHandle {
    pub installation_name: String,
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub dashboard_url: Option<String>,
    /// Absent when no CE task was tracked for this run.
    #[serde(default)]
    pub ce_task_id: Option<String>,
}

impl AnalysisHandle {
    pub fn new(installation_name: impl Into<String>) -> Self {
        Self {
            installation_name: installation_name.into(),
            server_url: None,
            dashboard_url: None,
            ce_task_id: None,
        }
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    pub fn with_dashboard_url(mut self, url: impl Into<String>) -> Self {
        self.dashboard_url = Some(url.into());
        self
    }

    pub fn with_ce_task_id(mut self, id: impl Into<String>) -> Self {
        self.ce_task_id = Some(id.into());
        self
    }

    /// Key under which the resolved result is cached: the CE task id, or the
    /// dashboard URL for handles resolved through the legacy path.
    pub fn cache_key(&self) -> Option<&str> {
        self.ce_task_id
            .as_deref()
            .or(self.dashboard_url.as_deref())
            .filter(|k| !k.is_empty())
    }

    /// Project key embedded in the dashboard URL, if any.
    pub fn dashboard_project_key(&self) -> Option<&str> {
        self.dashboard_url.as_deref().and_then(extract_project_key)
    }
}

/// Everything before `/dashboard`, e.g. `http://sq:9000` for
/// `http://sq:9000/dashboard/index/my:key`.
pub fn extract_server_url(dashboard_url: &str) -> Option<&str> {
    let idx = dashboard_url.find(DASHBOARD_MARKER)?;
    Some(&dashboard_url[..idx]).filter(|s| !s.is_empty())
}

/// Everything after the last `/dashboard/index/`.
pub fn extract_project_key(dashboard_url: &str) -> Option<&str> {
    let idx = dashboard_url.rfind(DASHBOARD_INDEX_MARKER)?;
    Some(&dashboard_url[idx + DASHBOARD_INDEX_MARKER.len()..]).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://localhost:9000/dashboard/index/org.sonarsource.sonarlint:sonarlint-cli";

    #[test]
    fn test_extract_from_dashboard_url() {
        assert_eq!(extract_server_url(URL), Some("http://localhost:9000"));
        assert_eq!(
            extract_project_key(URL),
            Some("org.sonarsource.sonarlint:sonarlint-cli")
        );
    }

    #[test]
    fn test_extract_from_invalid_url() {
        assert_eq!(extract_server_url("invalid"), None);
        assert_eq!(extract_project_key("invalid"), None);
        assert_eq!(extract_project_key("http://sq/dashboard/index/"), None);
        assert_eq!(extract_server_url("/dashboard/index/key"), None);
    }

    #[test]
    fn test_modern_dashboard_url_has_no_key() {
        let url = "http://sq/dashboard?id=my-project";
        assert_eq!(extract_server_url(url), Some("http://sq"));
        assert_eq!(extract_project_key(url), None);
    }

    #[test]
    fn test_cache_key_prefers_task_id() {
        let handle = AnalysisHandle::new("sq")
            .with_dashboard_url(URL)
            .with_ce_task_id("AVx1");
        assert_eq!(handle.cache_key(), Some("AVx1"));

        let legacy = AnalysisHandle::new("sq").with_dashboard_url(URL);
        assert_eq!(legacy.cache_key(), Some(URL));

        assert_eq!(AnalysisHandle::new("sq").cache_key(), None);
    }

    #[test]
    fn test_deserialize_with_missing_fields() {
        let handle: AnalysisHandle =
            serde_json::from_str(r#"{"installation_name":"sq","ce_task_id":"t1"}"#).unwrap();
        assert_eq!(handle.ce_task_id.as_deref(), Some("t1"));
        assert!(handle.server_url.is_none());
    }
}
