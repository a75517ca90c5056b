//! Severity levels for business errors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The severity an error is meant to be logged at.
///
/// The level is stored on every [`BizError`](crate::BizError) so that sinks
/// can be routed per severity later. Today every level is dispatched to the
/// same sink call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Expected failure, informational only
    Info,

    /// Degraded but recoverable
    Warn,

    /// Request failed
    #[default]
    Error,
}

impl Level {
    /// Returns the level as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            other => Err(format!("unknown level '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_display() {
        assert_eq!(Level::Info.to_string(), "info");
        assert_eq!(Level::Error.to_string(), "error");
    }

    #[test]
    fn test_default_is_error() {
        assert_eq!(Level::default(), Level::Error);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("WARN".parse::<Level>(), Ok(Level::Warn));
        assert_eq!("warning".parse::<Level>(), Ok(Level::Warn));
        assert!("fatal".parse::<Level>().is_err());
    }
}
