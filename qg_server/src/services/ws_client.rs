//! SonarQube web-service client: endpoint URLs and response parsing.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::WsError;
use crate::models::ce_task::{CeStatus, CeTask, ProjectQualityGate};
use crate::models::installation::{normalize_url, Credentials};
use crate::services::transport::HttpTransport;

pub const API_VERSION: &str = "/api/server/version";
pub const API_CE_TASK: &str = "/api/ce/task?id=";
pub const API_PROJECT_STATUS_WITH_ANALYSIS_ID: &str =
    "/api/qualitygates/project_status?analysisId=";
pub const API_PROJECT_STATUS: &str = "/api/qualitygates/project_status?projectKey=";
pub const API_RESOURCES: &str =
    "/api/resources?format=json&depth=0&metrics=alert_status&resource=";
pub const API_MEASURES: &str = "/api/measures/component?metricKeys=alert_status&componentKey=";
pub const API_PROJECT_NAME: &str = "/api/projects/index?format=json&key=";

const ALERT_STATUS: &str = "alert_status";

#[derive(Deserialize)]
struct CeTaskResponse {
    task: CeTaskJson,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CeTaskJson {
    status: String,
    component_name: String,
    component_key: String,
    #[serde(default)]
    analysis_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectStatusResponse {
    project_status: ProjectStatusJson,
}

#[derive(Deserialize)]
struct ProjectStatusJson {
    status: String,
}

#[derive(Deserialize)]
struct ResourceJson {
    name: String,
    #[serde(default)]
    msr: Vec<ResourceMeasureJson>,
}

#[derive(Deserialize)]
struct ResourceMeasureJson {
    key: String,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Deserialize)]
struct MeasuresResponse {
    component: MeasuresComponentJson,
}

#[derive(Deserialize)]
struct MeasuresComponentJson {
    name: String,
    #[serde(default)]
    measures: Vec<MeasureJson>,
}

#[derive(Deserialize)]
struct MeasureJson {
    metric: String,
    #[serde(default)]
    value: Option<String>,
}

/// Old servers report `nm`, newer ones `name`; some send both.
#[derive(Deserialize)]
struct ProjectIndexJson {
    #[serde(default)]
    nm: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Client for one SonarQube server.
pub struct WsClient<'a> {
    transport: &'a dyn HttpTransport,
    server_url: String,
    credentials: Credentials,
}

impl<'a> WsClient<'a> {
    pub fn new(transport: &'a dyn HttpTransport, server_url: &str, credentials: Credentials) -> Self {
        Self {
            transport,
            server_url: normalize_url(server_url),
            credentials,
        }
    }

    /// Plain-text version string; the request is sent without credentials.
    pub async fn server_version(&self) -> Result<String, WsError> {
        let url = format!("{}{API_VERSION}", self.server_url);
        let text = self.transport.get(&url, &Credentials::None).await?;
        Ok(text.trim().to_string())
    }

    /// A missing `analysisId` means the task is still pending.
    pub async fn ce_task(&self, task_id: &str) -> Result<CeTask, WsError> {
        let url = format!("{}{API_CE_TASK}{}", self.server_url, encode(task_id));
        let text = self.get(&url).await?;
        let parsed: CeTaskResponse = parse_json(&url, &text)?;
        let task = parsed.task;
        Ok(CeTask {
            status: CeStatus::parse(&task.status),
            component_name: task.component_name,
            component_key: task.component_key,
            url,
            analysis_id: task.analysis_id.filter(|id| !id.is_empty()),
        })
    }

    pub async fn quality_gate_status(&self, analysis_id: &str) -> Result<String, WsError> {
        let url = format!(
            "{}{API_PROJECT_STATUS_WITH_ANALYSIS_ID}{}",
            self.server_url,
            encode(analysis_id)
        );
        let text = self.get(&url).await?;
        let parsed: ProjectStatusResponse = parse_json(&url, &text)?;
        Ok(parsed.project_status.status)
    }

    /// Quality gate by project key, for servers that have no analysis id at hand.
    pub async fn quality_gate_by_project_key(
        &self,
        project_key: &str,
    ) -> Result<ProjectQualityGate, WsError> {
        let url = format!("{}{API_PROJECT_STATUS}{}", self.server_url, encode(project_key));
        let text = self.get(&url).await?;
        let parsed: ProjectStatusResponse = parse_json(&url, &text)?;
        Ok(ProjectQualityGate::new(None, parsed.project_status.status))
    }

    /// Servers before 5.2. Returns `None` unless exactly one resource matches;
    /// old servers without a default quality gate return an empty array.
    pub async fn quality_gate_by_resources(
        &self,
        project_key: &str,
    ) -> Result<Option<ProjectQualityGate>, WsError> {
        let url = format!("{}{API_RESOURCES}{}", self.server_url, encode(project_key));
        let text = self.get(&url).await?;
        let resources: Vec<ResourceJson> = parse_json(&url, &text)?;

        if resources.len() != 1 {
            tracing::debug!(
                project_key,
                count = resources.len(),
                "Unexpected number of resources"
            );
            return Ok(None);
        }

        let resource = &resources[0];
        let measure = resource
            .msr
            .iter()
            .find(|m| m.key == ALERT_STATUS)
            .and_then(|m| m.data.clone());

        match measure {
            Some(status) => Ok(Some(ProjectQualityGate::new(
                Some(resource.name.clone()),
                status,
            ))),
            None => Err(WsError::parse(&url, &text, "no alert_status measure")),
        }
    }

    /// Servers 5.2 to 5.6. `errors[].msg` in the payload becomes
    /// [`WsError::ServerMessages`].
    pub async fn quality_gate_by_measures(
        &self,
        project_key: &str,
    ) -> Result<Option<ProjectQualityGate>, WsError> {
        let url = format!("{}{API_MEASURES}{}", self.server_url, encode(project_key));
        let text = self.get(&url).await?;
        let value: serde_json::Value = parse_json(&url, &text)?;

        if let Some(errors) = value.get("errors") {
            return Err(WsError::ServerMessages(parse_error_messages(errors)));
        }

        let parsed: MeasuresResponse = serde_json::from_value(value)
            .map_err(|e| WsError::parse(&url, &text, e.to_string()))?;
        let component = parsed.component;
        Ok(component
            .measures
            .into_iter()
            .find(|m| m.metric == ALERT_STATUS)
            .and_then(|m| m.value)
            .map(|status| ProjectQualityGate::new(Some(component.name), status)))
    }

    pub async fn project_name(&self, project_key: &str) -> Result<String, WsError> {
        let url = format!("{}{API_PROJECT_NAME}{}", self.server_url, encode(project_key));
        let text = self.get(&url).await?;
        let mut projects: Vec<ProjectIndexJson> = parse_json(&url, &text)?;
        if projects.len() != 1 {
            return Err(WsError::parse(
                &url,
                &text,
                format!(
                    "can't find project {project_key}, number of projects found: {}",
                    projects.len()
                ),
            ));
        }
        let project = projects.remove(0);
        project
            .nm
            .or(project.name)
            .ok_or_else(|| WsError::parse(&url, &text, "project entry has no name"))
    }

    async fn get(&self, url: &str) -> Result<String, WsError> {
        Ok(self.transport.get(url, &self.credentials).await?)
    }
}

fn parse_json<T: DeserializeOwned>(url: &str, text: &str) -> Result<T, WsError> {
    serde_json::from_str(text).map_err(|e| WsError::parse(url, text, e.to_string()))
}

fn parse_error_messages(errors: &serde_json::Value) -> Vec<String> {
    errors
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|e| e.get("msg").and_then(|m| m.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn encode(param: &str) -> String {
    urlencoding::encode(param).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned bodies by exact URL and records every request.
    #[derive(Default)]
    struct CannedTransport {
        bodies: HashMap<String, String>,
        requests: Mutex<Vec<(String, Credentials)>>,
    }

    impl CannedTransport {
        fn with(mut self, url: &str, body: &str) -> Self {
            self.bodies.insert(url.to_string(), body.to_string());
            self
        }
    }

    #[async_trait]
    impl HttpTransport for CannedTransport {
        async fn get(&self, url: &str, credentials: &Credentials) -> Result<String, TransportError> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), credentials.clone()));
            self.bodies
                .get(url)
                .cloned()
                .ok_or_else(|| TransportError::Http {
                    url: url.to_string(),
                    status: 404,
                    body: String::new(),
                })
        }
    }

    const SQ: &str = "http://sq:9000";

    fn token() -> Credentials {
        Credentials::Token("tok".into())
    }

    #[tokio::test]
    async fn test_server_version_strips_trailing_slash_and_credentials() {
        let transport = CannedTransport::default().with("http://sq:9000/api/server/version", "8.9.0\n");
        let client = WsClient::new(&transport, "http://sq:9000/", token());
        assert_eq!(client.server_version().await.unwrap(), "8.9.0");

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].1, Credentials::None);
    }

    #[tokio::test]
    async fn test_ce_task_success() {
        let body = r#"{"task":{"id":"AVx1","type":"REPORT","componentKey":"my:project",
            "componentName":"My Project","status":"SUCCESS","analysisId":"A1"}}"#;
        let url = format!("{SQ}{API_CE_TASK}AVx1");
        let transport = CannedTransport::default().with(&url, body);
        let client = WsClient::new(&transport, SQ, token());

        let task = client.ce_task("AVx1").await.unwrap();
        assert_eq!(task.status, CeStatus::Success);
        assert_eq!(task.component_name, "My Project");
        assert_eq!(task.component_key, "my:project");
        assert_eq!(task.analysis_id.as_deref(), Some("A1"));
        assert_eq!(task.url, url);
        assert_eq!(transport.requests.lock().unwrap()[0].1, token());
    }

    #[tokio::test]
    async fn test_ce_task_pending_has_no_analysis_id() {
        let body = r#"{"task":{"componentKey":"k","componentName":"n","status":"pending"}}"#;
        let transport = CannedTransport::default().with(&format!("{SQ}{API_CE_TASK}t"), body);
        let client = WsClient::new(&transport, SQ, token());

        let task = client.ce_task("t").await.unwrap();
        assert_eq!(task.status, CeStatus::Pending);
        assert!(task.analysis_id.is_none());
    }

    #[tokio::test]
    async fn test_ce_task_missing_field_is_parse_error() {
        let body = r#"{"task":{"componentKey":"k","status":"SUCCESS"}}"#;
        let url = format!("{SQ}{API_CE_TASK}t");
        let transport = CannedTransport::default().with(&url, body);
        let client = WsClient::new(&transport, SQ, token());

        match client.ce_task("t").await.unwrap_err() {
            WsError::Parse { url: failed, body: raw, .. } => {
                assert_eq!(failed, url);
                assert_eq!(raw, body);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_quality_gate_status_encodes_analysis_id() {
        let url = format!("{SQ}{API_PROJECT_STATUS_WITH_ANALYSIS_ID}A%2B1%20x");
        let transport = CannedTransport::default().with(
            &url,
            r#"{"projectStatus":{"status":"ERROR","conditions":[]}}"#,
        );
        let client = WsClient::new(&transport, SQ, token());
        assert_eq!(client.quality_gate_status("A+1 x").await.unwrap(), "ERROR");
    }

    #[tokio::test]
    async fn test_quality_gate_status_malformed() {
        let url = format!("{SQ}{API_PROJECT_STATUS_WITH_ANALYSIS_ID}A1");
        let transport = CannedTransport::default().with(&url, "<html>oops</html>");
        let client = WsClient::new(&transport, SQ, token());
        assert!(matches!(
            client.quality_gate_status("A1").await,
            Err(WsError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn test_http_error_propagates_unchanged() {
        let transport = CannedTransport::default();
        let client = WsClient::new(&transport, SQ, token());
        assert!(matches!(
            client.ce_task("missing").await,
            Err(WsError::Transport(TransportError::Http { status: 404, .. }))
        ));
    }

    #[tokio::test]
    async fn test_resources_api() {
        let body = r#"[{"id":1,"key":"my:project","name":"SonarLint CLI",
            "msr":[{"key":"alert_status","data":"WARN","frmt_val":"Warning"}]}]"#;
        let transport = CannedTransport::default().with(&format!("{SQ}{API_RESOURCES}my%3Aproject"), body);
        let client = WsClient::new(&transport, SQ, token());

        let qg = client.quality_gate_by_resources("my:project").await.unwrap().unwrap();
        assert_eq!(qg.status, "WARN");
        assert_eq!(qg.project_name.as_deref(), Some("SonarLint CLI"));
    }

    #[tokio::test]
    async fn test_resources_api_empty_array() {
        let transport = CannedTransport::default().with(&format!("{SQ}{API_RESOURCES}k"), "[]");
        let client = WsClient::new(&transport, SQ, token());
        assert!(client.quality_gate_by_resources("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resources_api_without_alert_status() {
        let body = r#"[{"name":"P","msr":[{"key":"ncloc","data":"12"}]}]"#;
        let transport = CannedTransport::default().with(&format!("{SQ}{API_RESOURCES}k"), body);
        let client = WsClient::new(&transport, SQ, token());
        assert!(matches!(
            client.quality_gate_by_resources("k").await,
            Err(WsError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn test_measures_api() {
        let body = r#"{"component":{"key":"k","name":"My Project",
            "measures":[{"metric":"alert_status","value":"OK"}]}}"#;
        let transport = CannedTransport::default().with(&format!("{SQ}{API_MEASURES}k"), body);
        let client = WsClient::new(&transport, SQ, token());

        let qg = client.quality_gate_by_measures("k").await.unwrap().unwrap();
        assert_eq!(qg, ProjectQualityGate::new(Some("My Project".into()), "OK"));
    }

    #[tokio::test]
    async fn test_measures_api_without_measure() {
        let body = r#"{"component":{"key":"k","name":"My Project","measures":[]}}"#;
        let transport = CannedTransport::default().with(&format!("{SQ}{API_MEASURES}k"), body);
        let client = WsClient::new(&transport, SQ, token());
        assert!(client.quality_gate_by_measures("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_measures_api_server_errors() {
        let body = r#"{"errors":[{"msg":"Component key 'k' not found"},{"msg":"second"}]}"#;
        let transport = CannedTransport::default().with(&format!("{SQ}{API_MEASURES}k"), body);
        let client = WsClient::new(&transport, SQ, token());

        match client.quality_gate_by_measures("k").await.unwrap_err() {
            WsError::ServerMessages(msgs) => {
                assert_eq!(msgs, vec!["Component key 'k' not found", "second"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_project_name() {
        let body = r#"[{"id":"1","k":"k","nm":"SonarLint CLI","sc":"PRJ","qu":"TRK"}]"#;
        let transport = CannedTransport::default().with(&format!("{SQ}{API_PROJECT_NAME}k"), body);
        let client = WsClient::new(&transport, SQ, token());
        assert_eq!(client.project_name("k").await.unwrap(), "SonarLint CLI");
    }

    #[tokio::test]
    async fn test_project_name_with_both_name_fields() {
        let url = format!("{SQ}{API_PROJECT_NAME}k");
        let both = CannedTransport::default().with(&url, r#"[{"k":"k","nm":"Short","name":"Long"}]"#);
        let client = WsClient::new(&both, SQ, token());
        assert_eq!(client.project_name("k").await.unwrap(), "Short");

        let modern = CannedTransport::default().with(&url, r#"[{"k":"k","name":"Modern"}]"#);
        let client = WsClient::new(&modern, SQ, token());
        assert_eq!(client.project_name("k").await.unwrap(), "Modern");

        let nameless = CannedTransport::default().with(&url, r#"[{"k":"k"}]"#);
        let client = WsClient::new(&nameless, SQ, token());
        assert!(matches!(
            client.project_name("k").await,
            Err(WsError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn test_project_name_not_found() {
        let transport = CannedTransport::default().with(&format!("{SQ}{API_PROJECT_NAME}k"), "[]");
        let client = WsClient::new(&transport, SQ, token());
        assert!(matches!(
            client.project_name("k").await,
            Err(WsError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn test_quality_gate_by_project_key() {
        let transport = CannedTransport::default().with(
            &format!("{SQ}{API_PROJECT_STATUS}my%3Akey"),
            r#"{"projectStatus":{"status":"OK"}}"#,
        );
        let client = WsClient::new(&transport, SQ, token());
        let qg = client.quality_gate_by_project_key("my:key").await.unwrap();
        assert_eq!(qg.status, "OK");
        assert!(qg.project_name.is_none());
    }
}
