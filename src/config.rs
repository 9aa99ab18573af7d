//! cisync configuration (`cisync.toml`)
//!
//! ```toml
//! installer = "cisync"
//! continue_on_error = false
//!
//! [transport]
//! program = "mql"
//! args = ["-t"]
//!
//! [transport.retry]
//! max_attempts = 3
//! base_delay = 2000   # milliseconds
//!
//! [format]
//! field_separator = "@@|@@"
//! record_separator = "@@;@@"
//!
//! [emit]
//! prefix = "start transaction;"
//! suffix = "commit transaction;"
//! ```

use anyhow::{Context, Result, bail};
use cikit::transport::process::ProcessTransport;
use cikit::{Client, EmitOptions, LiveFormat, RetryConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CisyncConfig {
    /// Value stamped into the `installer` property
    pub installer: String,
    /// Keep going after a CI fails
    pub continue_on_error: bool,
    pub transport: TransportConfig,
    pub format: LiveFormat,
    pub emit: EmitOptions,
}

impl Default for CisyncConfig {
    fn default() -> Self {
        Self {
            installer: "cisync".to_string(),
            continue_on_error: false,
            transport: TransportConfig::default(),
            format: LiveFormat::default(),
            emit: EmitOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Command-line client receiving batches on stdin
    pub program: String,
    pub args: Vec<String>,
    pub retry: RetryConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            program: "mql".to_string(),
            args: Vec::new(),
            retry: RetryConfig::default(),
        }
    }
}

/// A loaded config and the file it came from.
#[derive(Debug)]
pub struct Loaded {
    pub config: CisyncConfig,
    pub source: Option<PathBuf>,
}

impl CisyncConfig {
    /// Load the first config file found, or defaults if there is none.
    pub fn load(explicit: Option<&Path>) -> Result<Loaded> {
        let candidates = paths::config_candidates(explicit)?;
        let required = explicit.is_some() || std::env::var(paths::ENV_CONFIG).is_ok();

        for path in candidates {
            if path.is_file() {
                log::debug!("Loading config from {}", path.display());
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("Could not read {}", path.display()))?;
                let config = Self::parse(&content)
                    .with_context(|| format!("Invalid config in {}", path.display()))?;
                return Ok(Loaded {
                    config,
                    source: Some(path),
                });
            }
            if required {
                bail!("Config file not found: {}", path.display());
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Loaded {
            config: Self::default(),
            source: None,
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Build a platform client from this config.
    pub fn client(&self) -> Client {
        let program = paths::expand(&self.transport.program);
        let transport =
            ProcessTransport::new(program.to_string_lossy(), self.transport.args.clone());
        Client::new(Box::new(transport))
            .with_retry(self.transport.retry.clone())
            .with_format(self.format.clone())
            .with_emit_options(self.emit.clone())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = CisyncConfig::parse("").unwrap();
        assert_eq!(config, CisyncConfig::default());
        assert_eq!(config.transport.retry.max_attempts, 1);
        assert_eq!(config.format.field_separator, "@@|@@");
    }

    #[test]
    fn test_parse_full_config() {
        let config = CisyncConfig::parse(
            r#"
installer = "ops"
continue_on_error = true

[transport]
program = "~/bin/mql"
args = ["-t", "-c", "set context user creator;"]

[transport.retry]
max_attempts = 3
base_delay = 500

[format]
record_separator = "<<END>>"

[emit]
prefix = "start transaction;"
suffix = "commit transaction;"
"#,
        )
        .unwrap();

        assert_eq!(config.installer, "ops");
        assert!(config.continue_on_error);
        assert_eq!(config.transport.args.len(), 3);
        assert_eq!(config.transport.retry.max_attempts, 3);
        assert_eq!(config.transport.retry.base_delay, Duration::from_millis(500));
        assert_eq!(config.format.field_separator, "@@|@@");
        assert_eq!(config.format.record_separator, "<<END>>");
        assert_eq!(config.emit.suffix, "commit transaction;");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(CisyncConfig::parse("continue_on_error = \"yes\"").is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = CisyncConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(CisyncConfig::parse(&text).unwrap(), config);
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "installer = \"ci-bot\"\n").unwrap();

        let loaded = CisyncConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.config.installer, "ci-bot");
        assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CisyncConfig::load(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
