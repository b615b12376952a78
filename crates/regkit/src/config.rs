#![deny(missing_docs)]
//! Settings for the `regkit` CLI.
//!
//! #### Example config:
//!
//! ```rust
//! let yaml = r#"---
//!
//! ## Program and arguments run by VIEW_FLAGS. `{key}` becomes HIVE\PATH.
//! flags_command: [reg, FLAGS, "{key}", QUERY]
//!
//! ## Keep at most this many bytes of the flags tool output, minus one.
//! capture_bytes: 4096
//!
//! ## Kill the flags tool if it runs longer than this.
//! timeout_secs: 10
//!
//! ## How deep SEARCH_KEY descends.
//! max_depth: 512
//!
//! ## Work on a snapshot file instead of the live registry.
//! snapshot: /tmp/registry.yaml
//! "#;
//!
//! let _config: regkit::config::RegkitConfig = serde_yaml::from_str(yaml).unwrap();
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::{ProcessChannel, DEFAULT_CAPACITY};
use crate::enumerate::{Enumerator, DEFAULT_MAX_DEPTH};

/// Result of loading a config.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Loading a config failed.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The named file does not exist.
    #[error("No regkit config found at this path: {0}")]
    ConfigMissing(PathBuf),

    /// The file is not a valid config.
    #[error("Config deserialization error: {0}")]
    SerializationError(#[from] serde_yaml::Error),

    /// The file could not be read.
    #[error("Error while reading the regkit config: {0}")]
    IoError(#[from] std::io::Error),
}

/// All regkit settings. Every field is optional in the file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegkitConfig {
    /// Program and arguments run to query key flags.
    /// Every `{key}` is replaced by the full key name.
    pub flags_command: Vec<String>,

    /// Capacity of the output capture. At most `capture_bytes - 1` bytes are kept.
    pub capture_bytes: usize,

    /// Kill the flags tool after this many seconds. Waits forever if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// How many levels a search descends.
    pub max_depth: usize,

    /// Snapshot file to use instead of the live registry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PathBuf>,
}

impl Default for RegkitConfig {
    fn default() -> Self {
        Self {
            flags_command: ["reg", "FLAGS", "{key}", "QUERY"]
                .into_iter()
                .map(String::from)
                .collect(),
            capture_bytes: DEFAULT_CAPACITY,
            timeout_secs: None,
            max_depth: DEFAULT_MAX_DEPTH,
            snapshot: None,
        }
    }
}

fn config_from_yaml<T>(yaml: &str) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    serde_yaml::from_str(yaml).map_err(ConfigError::SerializationError)
}

impl RegkitConfig {
    /// Create a config from a YAML file path.
    pub fn load_yaml(path: &Path) -> ConfigResult<RegkitConfig> {
        let config_yaml = std::fs::read_to_string(path).map_err(|err| match err {
            e @ std::io::Error { .. } if e.kind() == std::io::ErrorKind::NotFound => {
                ConfigError::ConfigMissing(path.into())
            }
            _ => err.into(),
        })?;
        config_from_yaml(&config_yaml)
    }

    /// Load `path` if given, otherwise use the defaults.
    pub fn load(path: Option<&Path>) -> ConfigResult<RegkitConfig> {
        match path {
            Some(path) => Self::load_yaml(path),
            None => Ok(Self::default()),
        }
    }

    /// The configured flags tool timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// A process channel with the configured capacity and timeout.
    pub fn channel(&self) -> ProcessChannel {
        ProcessChannel::new(self.capture_bytes).with_timeout(self.timeout())
    }

    /// An enumerator with the configured depth cap.
    pub fn enumerator(&self) -> Enumerator {
        Enumerator::new(self.max_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_load_yaml() {
        let bad_path = Path::new("fake");
        let result = RegkitConfig::load_yaml(bad_path);
        assert_eq!(
            "Err(ConfigMissing(\"fake\"))".to_string(),
            format!("{:?}", result)
        );
    }

    #[test]
    fn test_config_bad_yaml() {
        let result: ConfigResult<RegkitConfig> = config_from_yaml("this isn't yaml");
        assert!(matches!(result, Err(ConfigError::SerializationError(_))));
    }

    #[test]
    fn test_config_empty_is_default() {
        let result: RegkitConfig = config_from_yaml("---\n{}\n").unwrap();
        assert_eq!(RegkitConfig::default(), result);
        assert_eq!(None, RegkitConfig::load(None).unwrap().timeout());
    }

    #[test]
    fn test_config_complete_config() {
        regkit_trace::test_run().ok();

        let yaml = r#"---
    flags_command: [sh, -c, "echo $0", "{key}"]
    capture_bytes: 128
    timeout_secs: 3
    max_depth: 8
    snapshot: /path/to/registry.yaml
    "#;
        let result: RegkitConfig = config_from_yaml(yaml).unwrap();
        assert_eq!(
            RegkitConfig {
                flags_command: vec!["sh".into(), "-c".into(), "echo $0".into(), "{key}".into()],
                capture_bytes: 128,
                timeout_secs: Some(3),
                max_depth: 8,
                snapshot: Some(PathBuf::from("/path/to/registry.yaml")),
            },
            result
        );
        assert_eq!(Some(Duration::from_secs(3)), result.timeout());
        assert_eq!(8, result.enumerator().max_depth());
        assert_eq!(
            ProcessChannel::new(128).with_timeout(Some(Duration::from_secs(3))),
            result.channel()
        );
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regkit.yaml");
        std::fs::write(&path, "max_depth: 3\n").unwrap();
        let config = RegkitConfig::load(Some(&path)).unwrap();
        assert_eq!(3, config.max_depth);
        assert_eq!(DEFAULT_CAPACITY, config.capture_bytes);
    }
}
