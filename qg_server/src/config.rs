//! Service configuration, loaded from environment variables.

use std::time::Duration;

use crate::error::ConfigError;
use crate::models::installation::{Installations, ServerInstallation};
use crate::services::build_registry::DEFAULT_MAX_BUILDS;
use crate::services::resolution_cache::CachePolicy;

#[derive(Clone, Debug)]
pub struct QgConfig {
    /// Shared secret for SonarQube webhook HMAC validation.
    pub webhook_secret: String,
    /// Minimum seconds between two walks over the analyses of a build.
    pub batch_guard_secs: u32,
    /// Seconds after build completion during which pending results are trusted.
    pub pending_grace_secs: u32,
    pub http_connect_timeout_secs: u64,
    pub http_timeout_secs: u64,
    /// Build records kept in memory before the oldest are evicted.
    pub max_builds: usize,
    /// JSON array of installations.
    pub installations_file: Option<String>,
    /// Single installation declared through `SONAR_*` variables.
    pub sonar_host_url: Option<String>,
    pub sonar_token: Option<String>,
    pub sonar_installation_name: String,
}

impl QgConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let webhook_secret = var("QG_WEBHOOK_SECRET").unwrap_or_default();
        let batch_guard_secs = var("QG_BATCH_GUARD_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);
        let pending_grace_secs = var("QG_PENDING_GRACE_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        let http_connect_timeout_secs = var("QG_HTTP_CONNECT_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);
        let http_timeout_secs = var("QG_HTTP_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);
        let max_builds = var("QG_MAX_BUILDS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_BUILDS);
        let installations_file = var("QG_INSTALLATIONS_FILE").filter(|s| !s.is_empty());
        let sonar_host_url = var("SONAR_HOST_URL").filter(|s| !s.is_empty());
        let sonar_token = var("SONAR_TOKEN").filter(|s| !s.is_empty());
        let sonar_installation_name = var("SONAR_INSTALLATION_NAME")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "default".to_string());

        if webhook_secret.is_empty() {
            tracing::warn!("QG_WEBHOOK_SECRET not set -- webhook signature validation disabled");
        }
        if installations_file.is_none() && sonar_host_url.is_none() {
            tracing::warn!(
                "Neither QG_INSTALLATIONS_FILE nor SONAR_HOST_URL set -- no installation configured"
            );
        }

        Self {
            webhook_secret,
            batch_guard_secs,
            pending_grace_secs,
            http_connect_timeout_secs,
            http_timeout_secs,
            max_builds,
            installations_file,
            sonar_host_url,
            sonar_token,
            sonar_installation_name,
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            batch_guard: chrono::Duration::seconds(i64::from(self.batch_guard_secs)),
            pending_grace: chrono::Duration::seconds(i64::from(self.pending_grace_secs)),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.http_connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Installations from the JSON file, plus the one declared through
    /// `SONAR_HOST_URL` when set.
    pub fn load_installations(&self) -> Result<Installations, ConfigError> {
        let mut installations = match &self.installations_file {
            Some(path) => read_installations_file(path)?,
            None => Vec::new(),
        };

        if let Some(url) = &self.sonar_host_url {
            let mut inst = ServerInstallation::new(&self.sonar_installation_name, url);
            if let Some(token) = &self.sonar_token {
                inst = inst.with_token(token);
            }
            installations.push(inst);
        }

        let installations = Installations::new(installations)?;
        tracing::info!(count = installations.len(), "Loaded SonarQube installations");
        Ok(installations)
    }
}

fn read_installations_file(path: &str) -> Result<Vec<ServerInstallation>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}
