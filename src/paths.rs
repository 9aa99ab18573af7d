//! Path resolution for cisync
//!
//! # Environment Variables
//!
//! - `CISYNC_CONFIG` - Explicit config file (same as `--config`)
//! - `CISYNC_CONFIG_DIR` - Override config directory
//!
//! # Config File Lookup
//!
//! 1. `--config` flag or `CISYNC_CONFIG`
//! 2. `./cisync.toml`
//! 3. `<config dir>/config.toml`, where the config dir is
//!    `CISYNC_CONFIG_DIR`, then `XDG_CONFIG_HOME/cisync`, then
//!    `~/.config/cisync`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for an explicit config file
pub const ENV_CONFIG: &str = "CISYNC_CONFIG";

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "CISYNC_CONFIG_DIR";

/// Config file looked up in the working directory
pub const LOCAL_CONFIG: &str = "cisync.toml";

/// Get the cisync config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("cisync");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("cisync"))
}

/// Config files to try, in priority order.
///
/// An explicit path is returned alone: a missing explicit file is an error,
/// never a silent fallback.
pub fn config_candidates(explicit: Option<&Path>) -> Result<Vec<PathBuf>> {
    if let Some(path) = explicit {
        return Ok(vec![expand(&path.to_string_lossy())]);
    }
    if let Ok(path) = std::env::var(ENV_CONFIG) {
        return Ok(vec![expand(&path)]);
    }
    Ok(vec![
        PathBuf::from(LOCAL_CONFIG),
        config_dir()?.join("config.toml"),
    ])
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Directory of `path` relative to `root`, `/`-separated.
///
/// Empty when the file sits directly in `root` or outside it.
pub fn sub_path(root: &Path, path: &Path) -> String {
    path.parent()
        .and_then(|dir| dir.strip_prefix(root).ok())
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}

/// File name used when exporting an object.
///
/// Path separators and other characters that cannot appear in a file name
/// are replaced with `_`.
pub fn file_name_for(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    format!("{safe}.ci")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        let path = expand("~/cis");
        assert!(!path.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_explicit_config_is_only_candidate() {
        let candidates = config_candidates(Some(Path::new("/etc/cisync.toml"))).unwrap();
        assert_eq!(candidates, [PathBuf::from("/etc/cisync.toml")]);
    }

    #[test]
    fn test_sub_path() {
        let root = Path::new("/repo/ci");
        assert_eq!(sub_path(root, Path::new("/repo/ci/rule/R.ci")), "rule");
        assert_eq!(sub_path(root, Path::new("/repo/ci/a/b/R.ci")), "a/b");
        assert_eq!(sub_path(root, Path::new("/repo/ci/R.ci")), "");
        assert_eq!(sub_path(root, Path::new("/elsewhere/R.ci")), "");
    }

    #[test]
    fn test_file_name_for() {
        assert_eq!(file_name_for("Part"), "Part.ci");
        assert_eq!(file_name_for("a/b:c"), "a_b_c.ci");
    }
}
