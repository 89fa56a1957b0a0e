//! Configuration types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default value the probe stores when a macro is not a constant
pub const DEFAULT_SENTINEL: i64 = i64::MIN + 1;

/// macroprobe configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Compiler invocation
    pub toolchain: ToolchainConfig,

    /// Probe generation and batching
    pub probe: ProbeConfig,

    /// Header discovery (used by the CLI)
    pub scan: ScanConfig,
}

impl Config {
    /// Load a configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse a configuration from YAML text; missing keys take defaults
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Config =
            serde_yaml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.probe.batch_size == 0 {
            return Err(Error::Config("probe.batch_size must be at least 1".into()));
        }
        if self.toolchain.timeout_secs == 0 {
            return Err(Error::Config("toolchain.timeout_secs must be at least 1".into()));
        }
        Ok(())
    }
}

/// Compiler invocation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Explicit clang executable; auto-detected when unset
    pub clang: Option<PathBuf>,

    /// Target triple passed as `--target`
    pub target: Option<String>,

    /// Include directories (`-I`)
    pub include_dirs: Vec<PathBuf>,

    /// Macro definitions (`-D`), either `NAME` or `NAME=VALUE`
    pub defines: Vec<String>,

    /// Additional compiler arguments
    pub extra_args: Vec<String>,

    /// Wall-clock limit for one compiler invocation
    pub timeout_secs: u64,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            clang: None,
            target: None,
            include_dirs: Vec::new(),
            defines: Vec::new(),
            extra_args: Vec::new(),
            timeout_secs: 30,
        }
    }
}

impl ToolchainConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

/// Probe generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Maximum number of macros per probe unit
    pub batch_size: usize,

    /// Concurrent compiler invocations (0 = one per CPU)
    pub jobs: usize,

    /// Value stored for non-constant macros
    pub sentinel: i64,

    /// Carry the headers' `#include <...>` lines into probe units
    pub keep_system_includes: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            jobs: 0,
            sentinel: DEFAULT_SENTINEL,
            keep_system_includes: true,
        }
    }
}

/// Header discovery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// File extensions treated as headers
    pub extensions: Vec<String>,

    /// Directories to skip while walking
    pub exclude_dirs: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["h".into(), "hh".into(), "hpp".into()],
            exclude_dirs: vec![".git".into(), "build".into(), "target".into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.probe.batch_size, 256);
        assert_eq!(config.probe.sentinel, DEFAULT_SENTINEL);
        assert!(config.probe.keep_system_includes);
        assert_eq!(config.toolchain.timeout_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
toolchain:
  clang: /usr/bin/clang-17
  include_dirs: [include, third_party/include]
  defines: ["NDEBUG", "LEVEL=2"]
probe:
  batch_size: 16
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.toolchain.clang, Some(PathBuf::from("/usr/bin/clang-17")));
        assert_eq!(config.toolchain.include_dirs.len(), 2);
        assert_eq!(config.toolchain.defines, vec!["NDEBUG", "LEVEL=2"]);
        assert_eq!(config.toolchain.timeout_secs, 30);
        assert_eq!(config.probe.batch_size, 16);
        assert_eq!(config.probe.jobs, 0);
        assert_eq!(config.scan, ScanConfig::default());
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::from_yaml_str("probe:\n  batch_size: 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_yaml_str("toolchain: [not, a, map]").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "toolchain:\n  timeout_secs: 5").unwrap();
        let config = Config::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.toolchain.timeout(), std::time::Duration::from_secs(5));
    }
}
