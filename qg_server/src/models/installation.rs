//! SonarQube server installations: named endpoints plus credentials.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Server URL used when an installation leaves it empty.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:9000";

/// Credentials sent with web-service calls.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    None,
    /// Authentication token, sent as the Basic username with an empty password.
    Token(String),
    /// Legacy login/password pair.
    Basic { login: String, password: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::None => f.write_str("None"),
            Credentials::Token(_) => f.write_str("Token(****)"),
            Credentials::Basic { login, .. } => write!(f, "Basic({login}:****)"),
        }
    }
}

/// One administrator-configured SonarQube server.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerInstallation {
    pub name: String,
    #[serde(default)]
    pub server_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Declared server version; replaces the version lookup on the dashboard resolver.
    #[serde(default)]
    pub version_override: Option<String>,
}

impl fmt::Debug for ServerInstallation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerInstallation")
            .field("name", &self.name)
            .field("server_url", &self.server_url)
            .field("credentials", &self.credentials())
            .field("version_override", &self.version_override)
            .finish()
    }
}

impl ServerInstallation {
    pub fn new(name: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server_url: server_url.into(),
            token: None,
            login: None,
            password: None,
            version_override: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_login(mut self, login: impl Into<String>, password: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_version_override(mut self, version: impl Into<String>) -> Self {
        self.version_override = Some(version.into());
        self
    }

    /// Configured URL, falling back to the default, without trailing slashes.
    pub fn effective_server_url(&self) -> String {
        let url = self.server_url.trim();
        let url = if url.is_empty() { DEFAULT_SERVER_URL } else { url };
        normalize_url(url)
    }

    /// A token wins over the legacy login/password pair.
    pub fn credentials(&self) -> Credentials {
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            return Credentials::Token(token.to_string());
        }
        match self.login.as_deref().filter(|l| !l.is_empty()) {
            Some(login) => Credentials::Basic {
                login: login.to_string(),
                password: self.password.clone().unwrap_or_default(),
            },
            None => Credentials::None,
        }
    }
}

/// Strip trailing slashes so endpoint paths can be appended directly.
pub fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Installations indexed by their unique name.
#[derive(Debug, Clone, Default)]
pub struct Installations {
    by_name: HashMap<String, ServerInstallation>,
}

impl Installations {
    pub fn new(installations: Vec<ServerInstallation>) -> Result<Self, ConfigError> {
        let mut by_name = HashMap::with_capacity(installations.len());
        for inst in installations {
            if by_name.contains_key(&inst.name) {
                return Err(ConfigError::DuplicateInstallation(inst.name));
            }
            by_name.insert(inst.name.clone(), inst);
        }
        Ok(Self { by_name })
    }

    pub fn get(&self, name: &str) -> Option<&ServerInstallation> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
