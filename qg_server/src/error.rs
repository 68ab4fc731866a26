//! Error types for the SonarQube client and the resolution pipeline.

use thiserror::Error;

/// Failure of a single HTTP GET against a SonarQube server.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The server answered with a status outside `[200, 300)`.
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },

    /// Connection, DNS, TLS, timeout or body read failure.
    #[error("request to {url} failed: {source}")]
    Io {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Failure of a web-service call: transport problems plus payload problems.
#[derive(Error, Debug)]
pub enum WsError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed JSON or a missing required field.
    #[error("unable to parse response from {url}: {reason}\n{body}")]
    Parse {
        url: String,
        body: String,
        reason: String,
    },

    /// The server reported `errors[].msg` in an otherwise valid payload.
    #[error("server returned errors: {}", .0.join("; "))]
    ServerMessages(Vec<String>),
}

impl WsError {
    pub(crate) fn parse(url: &str, body: &str, reason: impl Into<String>) -> Self {
        WsError::Parse {
            url: url.to_string(),
            body: body.to_string(),
            reason: reason.into(),
        }
    }
}

/// Why a resolution produced nothing. Never crosses the resolver boundary.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("invalid installation name: {0}")]
    UnknownInstallation(String),

    #[error("no analysis tracked for this handle")]
    NothingTracked,

    #[error("failed to parse server version: {0}")]
    InvalidVersion(String),

    #[error("unsupported server version {found} (minimum {minimum})")]
    UnsupportedVersion { found: String, minimum: String },

    #[error("invalid dashboard url '{0}'")]
    InvalidDashboardUrl(String),

    #[error("inconsistent server URL: '{parsed}' parsed, '{configured}' configured")]
    InconsistentServerUrl { parsed: String, configured: String },

    #[error(transparent)]
    Ws(#[from] WsError),
}

impl ResolutionError {
    /// Configuration problems are permanent and logged at INFO; everything
    /// else is logged at WARN.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, ResolutionError::Ws(_))
    }

    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolutionError::UnknownInstallation(_) => "unknown_installation",
            ResolutionError::NothingTracked => "nothing_tracked",
            ResolutionError::InvalidVersion(_) => "invalid_version",
            ResolutionError::UnsupportedVersion { .. } => "unsupported_version",
            ResolutionError::InvalidDashboardUrl(_) => "invalid_dashboard_url",
            ResolutionError::InconsistentServerUrl { .. } => "inconsistent_server_url",
            ResolutionError::Ws(WsError::Transport(TransportError::Http { .. })) => "http_error",
            ResolutionError::Ws(WsError::Transport(TransportError::Io { .. })) => "transport_error",
            ResolutionError::Ws(WsError::Parse { .. }) => "parse_error",
            ResolutionError::Ws(WsError::ServerMessages(_)) => "server_messages",
        }
    }
}

/// Rejected SonarQube webhook delivery.
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid JSON payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Failure while waiting for a task's quality gate.
#[derive(Error, Debug)]
pub enum WaitError {
    #[error("invalid installation name: {0}")]
    UnknownInstallation(String),

    #[error(transparent)]
    Ws(#[from] WsError),

    #[error("no notification for task {0} before the deadline")]
    Timeout(String),

    #[error("webhook notifications are no longer delivered")]
    Closed,
}

/// Configuration loading failure.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read installations file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid installations file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate installation name: {0}")]
    DuplicateInstallation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_classified() {
        assert!(ResolutionError::UnknownInstallation("x".into()).is_configuration());
        assert!(ResolutionError::UnsupportedVersion {
            found: "5.1".into(),
            minimum: "5.6".into()
        }
        .is_configuration());

        let parse = ResolutionError::Ws(WsError::parse("http://sq/api", "{", "eof"));
        assert!(!parse.is_configuration());
        assert_eq!(parse.kind(), "parse_error");
    }

    #[test]
    fn test_parse_error_message_carries_url_and_body() {
        let err = WsError::parse("http://sq/api/ce/task?id=1", "not json", "expected value");
        let msg = err.to_string();
        assert!(msg.contains("http://sq/api/ce/task?id=1"));
        assert!(msg.contains("not json"));
    }

    #[test]
    fn test_http_error_message_carries_status() {
        let err = TransportError::Http {
            url: "http://sq/api/server/version".into(),
            status: 404,
            body: "not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP 404 from http://sq/api/server/version: not found"
        );
    }
}
