//! SonarQube server versions as reported by `/api/server/version`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static VERSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(?:\.[0-9]+)+").unwrap());

/// Dotted numeric version. Qualifiers after the numeric run are kept for
/// display but ignored for equality.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    parts: Vec<u32>,
}

impl Version {
    /// Parse `"8.9.0.43852"`, `"5.6-SNAPSHOT"`, `"5.1"`; rejects `"55"` and `""`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let numbers = VERSION_REGEX.find(raw)?.as_str();
        let parts = numbers
            .split('.')
            .map(|p| p.parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            raw: raw.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn part(&self, i: usize) -> u32 {
        self.parts.get(i).copied().unwrap_or(0)
    }

    pub fn is_at_least(&self, min: StaticVersion) -> bool {
        (self.part(0), self.part(1)) >= (min.major, min.minor)
    }
}

/// Compile-time `major.minor` threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticVersion {
    pub major: u32,
    pub minor: u32,
}

impl StaticVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for StaticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        let len = self.parts.len().max(other.parts.len());
        (0..len).all(|i| self.part(i) == other.part(i))
    }
}

impl Eq for Version {}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_accepts_qualifiers() {
        assert_eq!(v("8.9.0.43852").as_str(), "8.9.0.43852");
        assert_eq!(v("5.6-SNAPSHOT"), v("5.6"));
        assert_eq!(v(" 7.9\n"), v("7.9"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Version::parse("55").is_none());
        assert!(Version::parse("").is_none());
        assert!(Version::parse("abc").is_none());
        assert!(Version::parse("v5.6").is_none());
    }

    #[test]
    fn test_equality_pads_with_zero() {
        assert_eq!(v("5.6"), v("5.6.0"));
        assert_ne!(v("5.6"), v("5.6.1"));
        assert!(v("5.10").is_at_least(StaticVersion::new(5, 9)));
        assert!(v("10.0").is_at_least(StaticVersion::new(9, 9)));
        assert!(!v("5.1").is_at_least(StaticVersion::new(5, 2)));
    }

    #[test]
    fn test_threshold() {
        let min = StaticVersion::new(5, 6);
        assert!(v("5.6").is_at_least(min));
        assert!(v("6.0").is_at_least(min));
        assert!(v("8.9.0.43852").is_at_least(min));
        assert!(!v("5.5.9").is_at_least(min));
        assert!(!v("5.1").is_at_least(min));
        assert_eq!(min.to_string(), "5.6");
    }
}
