use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a system log entry. Numeric values follow the conventional
/// message levels so rows can be ordered and filtered by threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub const fn value(self) -> i64 {
        match self {
            Self::Debug => 10,
            Self::Info => 20,
            Self::Success => 25,
            Self::Warning => 30,
            Self::Error => 40,
        }
    }

    pub const fn from_value(value: i64) -> Option<LogLevel> {
        match value {
            10 => Some(Self::Debug),
            20 => Some(Self::Info),
            25 => Some(Self::Success),
            30 => Some(Self::Warning),
            40 => Some(Self::Error),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of record a system log entry is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Organization,
    Source,
    Service,
}

impl TargetKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Source => "source",
            Self::Service => "service",
        }
    }

    pub fn parse(s: &str) -> Option<TargetKind> {
        match s {
            "organization" => Some(Self::Organization),
            "source" => Some(Self::Source),
            "service" => Some(Self::Service),
            _ => None,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Warning > LogLevel::Info);
        assert!(LogLevel::Error > LogLevel::Warning);
        assert!(LogLevel::Success > LogLevel::Info);
    }

    #[test]
    fn test_level_value_roundtrip() {
        assert_eq!(LogLevel::from_value(30), Some(LogLevel::Warning));
        assert_eq!(LogLevel::from_value(LogLevel::Success.value()), Some(LogLevel::Success));
        assert_eq!(LogLevel::from_value(15), None);
    }

    #[test]
    fn test_parse_target_kind() {
        assert_eq!(TargetKind::parse("source"), Some(TargetKind::Source));
        assert_eq!(TargetKind::parse("repository"), None);
    }
}
