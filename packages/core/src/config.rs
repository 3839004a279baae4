//! Store configuration.
//!
//! Loaded from JSON. Every field has a default, so `{}` is a valid
//! configuration:
//!
//! ```rust
//! use classfs_core::{CommitPolicy, StoreConfig};
//!
//! let config = StoreConfig::from_json_str(r#"{ "history_depth": 3 }"#).unwrap();
//! assert_eq!(config.history_depth, 3);
//! assert_eq!(config.history_suffix, ".hst");
//! assert_eq!(config.commit_policy, CommitPolicy::ClearAlways);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// What happens to the dirty set when a batch redefinition fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Clear the committed keys whether or not the runtime accepted them.
    #[default]
    ClearAlways,
    /// Leave the keys dirty so the commit can be retried.
    KeepDirtyOnFailure,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of snapshots kept per key.
    pub history_depth: usize,
    /// Suffix of history slot paths; slot `i` of `K` lives at `K<suffix><i>`.
    pub history_suffix: String,
    /// File-name suffix that marks a compiled unit.
    pub unit_suffix: String,
    pub commit_policy: CommitPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_depth: 10,
            history_suffix: ".hst".to_string(),
            unit_suffix: ".class".to_string(),
            commit_policy: CommitPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: StoreConfig =
            serde_json::from_str(json).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| Error::File {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_depth == 0 {
            return Err(Error::config("history_depth must be at least 1"));
        }
        for (field, suffix) in [
            ("history_suffix", &self.history_suffix),
            ("unit_suffix", &self.unit_suffix),
        ] {
            if suffix.is_empty() {
                return Err(Error::config(format!("{} must not be empty", field)));
            }
            if suffix.contains('/') {
                return Err(Error::config(format!(
                    "{} must not contain '/': {:?}",
                    field, suffix
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        assert_eq!(StoreConfig::from_json_str("{}").unwrap(), StoreConfig::default());
    }

    #[test]
    fn commit_policy_parses() {
        let config =
            StoreConfig::from_json_str(r#"{ "commit_policy": "keep_dirty_on_failure" }"#).unwrap();
        assert_eq!(config.commit_policy, CommitPolicy::KeepDirtyOnFailure);
    }

    #[test]
    fn zero_depth_rejected() {
        let err = StoreConfig::from_json_str(r#"{ "history_depth": 0 }"#).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn bad_suffix_rejected() {
        let config = StoreConfig {
            history_suffix: "/h".into(),
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());

        let config = StoreConfig {
            unit_suffix: String::new(),
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_config_error() {
        assert!(matches!(
            StoreConfig::from_json_str("{ nope"),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classfs.json");
        std::fs::write(&path, r#"{ "history_depth": 4, "history_suffix": ".bak" }"#).unwrap();
        let config = StoreConfig::from_path(&path).unwrap();
        assert_eq!(config.history_depth, 4);
        assert_eq!(config.history_suffix, ".bak");

        assert!(matches!(
            StoreConfig::from_path(dir.path().join("missing.json")),
            Err(Error::File { .. })
        ));
    }
}
