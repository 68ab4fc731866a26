//! Resolved project information handed to the display layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Badge category derived from the quality-gate status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BadgeStatus {
    OkMessage,
    WarnMessage,
    ErrorMessage,
    UnknownMessage,
}

impl BadgeStatus {
    /// Case-insensitive exact match on `OK`, `WARN`, `ERROR`; anything else is unknown.
    pub fn from_status(status: Option<&str>) -> Self {
        match status {
            Some(s) if s.eq_ignore_ascii_case("OK") => BadgeStatus::OkMessage,
            Some(s) if s.eq_ignore_ascii_case("WARN") => BadgeStatus::WarnMessage,
            Some(s) if s.eq_ignore_ascii_case("ERROR") => BadgeStatus::ErrorMessage,
            _ => BadgeStatus::UnknownMessage,
        }
    }

    pub fn message_key(&self) -> &'static str {
        match self {
            BadgeStatus::OkMessage => "OK_MESSAGE",
            BadgeStatus::WarnMessage => "WARN_MESSAGE",
            BadgeStatus::ErrorMessage => "ERROR_MESSAGE",
            BadgeStatus::UnknownMessage => "UNKNOWN_MESSAGE",
        }
    }
}

/// Outcome of one resolution. Built by a resolver, then shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInformation {
    created: DateTime<Utc>,
    project_key: Option<String>,
    project_name: Option<String>,
    url: Option<String>,
    status: Option<String>,
    ce_status: Option<String>,
    ce_url: Option<String>,
    errors: Vec<String>,
}

impl ProjectInformation {
    pub fn new(project_key: Option<String>) -> Self {
        Self::created_at(project_key, Utc::now())
    }

    pub fn created_at(project_key: Option<String>, created: DateTime<Utc>) -> Self {
        Self {
            created,
            project_key,
            project_name: None,
            url: None,
            status: None,
            ce_status: None,
            ce_url: None,
            errors: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Stored lower-cased.
    pub fn with_ce_status(mut self, ce_status: &str) -> Self {
        self.ce_status = Some(ce_status.to_lowercase());
        self
    }

    pub fn with_ce_url(mut self, ce_url: impl Into<String>) -> Self {
        self.ce_url = Some(ce_url.into());
        self
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn project_key(&self) -> Option<&str> {
        self.project_key.as_deref()
    }

    pub fn project_name(&self) -> Option<&str> {
        self.project_name.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn ce_status(&self) -> Option<&str> {
        self.ce_status.as_deref()
    }

    pub fn ce_url(&self) -> Option<&str> {
        self.ce_url.as_deref()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn badge_status(&self) -> BadgeStatus {
        BadgeStatus::from_status(self.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_status(status: Option<&str>) -> ProjectInformation {
        let info = ProjectInformation::new(Some("key".into()));
        match status {
            Some(s) => info.with_status(s),
            None => info,
        }
    }

    #[test]
    fn test_badge_status() {
        assert_eq!(with_status(Some("OK")).badge_status(), BadgeStatus::OkMessage);
        assert_eq!(with_status(Some("ok")).badge_status(), BadgeStatus::OkMessage);
        assert_eq!(with_status(Some("WARN")).badge_status(), BadgeStatus::WarnMessage);
        assert_eq!(with_status(Some("warn")).badge_status(), BadgeStatus::WarnMessage);
        assert_eq!(with_status(Some("ERROR")).badge_status(), BadgeStatus::ErrorMessage);
        assert_eq!(with_status(Some("error")).badge_status(), BadgeStatus::ErrorMessage);
        assert_eq!(
            with_status(Some("Something Else")).badge_status(),
            BadgeStatus::UnknownMessage
        );
        assert_eq!(with_status(Some("OKAY")).badge_status(), BadgeStatus::UnknownMessage);
        assert_eq!(with_status(None).badge_status(), BadgeStatus::UnknownMessage);
    }

    #[test]
    fn test_message_keys() {
        assert_eq!(BadgeStatus::OkMessage.message_key(), "OK_MESSAGE");
        assert_eq!(BadgeStatus::UnknownMessage.message_key(), "UNKNOWN_MESSAGE");
        assert_eq!(
            serde_json::to_string(&BadgeStatus::WarnMessage).unwrap(),
            "\"WARN_MESSAGE\""
        );
    }

    #[test]
    fn test_errors() {
        let info = ProjectInformation::new(None);
        assert!(!info.has_errors());
        assert!(info.errors().is_empty());

        let info = info.with_errors(vec!["Component key 'x' not found".into()]);
        assert!(info.has_errors());
        assert_eq!(info.errors().len(), 1);
    }

    #[test]
    fn test_ce_status_is_lower_cased() {
        let info = ProjectInformation::new(None).with_ce_status("IN_PROGRESS");
        assert_eq!(info.ce_status(), Some("in_progress"));
    }
}
