//! Service-wide error defaults loaded from JSON

use crate::options::DEFAULT_STACK_ROWS;
use crate::{ErrorOptions, Level};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Why a profile could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("failed to read profile {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid profile: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Defaults applied to every error a service raises.
///
/// Missing fields take the built-in defaults; unknown fields are rejected.
///
/// ```rust
/// use bizerr_error::{ErrorProfile, Level};
///
/// let profile = ErrorProfile::from_json(r#"{ "level": "warn", "stack_rows": 4 }"#).unwrap();
/// assert_eq!(profile.level, Level::Warn);
/// assert_eq!(profile.stack_rows, 4);
/// assert!(profile.store_stack);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ErrorProfile {
    pub level: Level,
    pub store_stack: bool,
    /// `0` keeps the default row count
    pub stack_rows: usize,
    /// Extra frames to skip, on top of the base depth
    pub skip_depth: usize,
}

impl Default for ErrorProfile {
    fn default() -> Self {
        Self {
            level: Level::Error,
            store_stack: true,
            stack_rows: DEFAULT_STACK_ROWS,
            skip_depth: 0,
        }
    }
}

impl ErrorProfile {
    pub fn from_json(json: &str) -> Result<Self, ProfileError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, ProfileError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Options seeded with this profile
    pub fn options(&self) -> ErrorOptions {
        ErrorOptions::new()
            .with_level(self.level)
            .with_stack(self.store_stack)
            .with_stack_rows(i64::try_from(self.stack_rows).unwrap_or(i64::MAX))
            .with_skip_depth(self.skip_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_object_is_default() {
        let profile = ErrorProfile::from_json("{}").unwrap();
        assert_eq!(profile, ErrorProfile::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ErrorProfile::from_json(r#"{ "levle": "info" }"#).unwrap_err();
        assert!(matches!(err, ProfileError::Parse(_)));
    }

    #[test]
    fn test_bad_level_rejected() {
        assert!(ErrorProfile::from_json(r#"{ "level": "fatal" }"#).is_err());
    }

    #[test]
    fn test_options_follow_profile() {
        let profile = ErrorProfile {
            level: Level::Info,
            store_stack: false,
            stack_rows: 3,
            skip_depth: 1,
        };
        let opts = profile.options();
        assert_eq!(opts.level(), Level::Info);
        assert!(!opts.stores_stack());
        assert_eq!(opts.stack_rows(), 3);
        assert_eq!(opts.skip_depth(), 1);
        assert!(!opts.has_sink());
    }

    #[test]
    fn test_zero_rows_keeps_default() {
        let profile = ErrorProfile::from_json(r#"{ "stack_rows": 0 }"#).unwrap();
        assert_eq!(profile.options().stack_rows(), DEFAULT_STACK_ROWS);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "level": "warn", "store_stack": false }}"#).unwrap();

        let profile = ErrorProfile::load(file.path()).unwrap();
        assert_eq!(profile.level, Level::Warn);
        assert!(!profile.store_stack);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ErrorProfile::load("/nonexistent/bizerr/profile.json").unwrap_err();
        assert!(matches!(err, ProfileError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/bizerr/profile.json"));
    }

    #[test]
    fn test_to_json_round_trips_level_name() {
        let json = ErrorProfile::default().to_json().unwrap();
        assert!(json.contains(r#""level": "error""#));
    }
}
