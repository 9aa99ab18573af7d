//! Discovery of declarative `.ci` files
//!
//! Every file is read once and its header parsed, so the planning phase
//! knows kind and name before touching the platform. Files that cannot be
//! read or whose header is malformed are reported per file instead of
//! aborting the whole run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cikit::CiFile;
use cikit::parser::parse_header;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::paths;

/// Extension of declarative files
pub const EXTENSION: &str = "ci";

/// A discovered file with its contents.
#[derive(Debug, Clone)]
pub struct Source {
    pub file: CiFile,
    pub text: String,
}

/// Result of walking a directory tree.
#[derive(Debug, Default)]
pub struct Discovery {
    pub sources: Vec<Source>,
    pub errors: Vec<(PathBuf, String)>,
}

/// Find all `.ci` files under `root` (or `root` itself if it is a file).
///
/// Hidden directories are skipped. Results are sorted by path.
pub fn discover(root: &Path) -> Result<Discovery> {
    if !root.exists() {
        anyhow::bail!("Path not found: {}", root.display());
    }

    let (base, paths) = if root.is_file() {
        let base = root.parent().map(Path::to_path_buf).unwrap_or_default();
        (base, vec![root.to_path_buf()])
    } else {
        (root.to_path_buf(), walk(root))
    };

    let mut discovery = Discovery::default();
    let mut seen: HashMap<(cikit::Kind, String), PathBuf> = HashMap::new();

    for path in paths {
        match load(&base, &path) {
            Ok(source) => {
                let key = (source.file.kind, source.file.name.clone());
                if let Some(first) = seen.get(&key) {
                    discovery.errors.push((
                        path,
                        format!(
                            "{} '{}' is already declared in {}",
                            key.0,
                            key.1,
                            first.display()
                        ),
                    ));
                    continue;
                }
                seen.insert(key, path);
                discovery.sources.push(source);
            }
            Err(e) => discovery.errors.push((path, format!("{e:#}"))),
        }
    }

    log::debug!(
        "Discovered {} file(s) under {} ({} unreadable)",
        discovery.sources.len(),
        root.display(),
        discovery.errors.len()
    );
    Ok(discovery)
}

fn walk(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| p.extension().is_some_and(|ext| ext == EXTENSION))
        .collect();
    paths.sort();
    paths
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

fn load(base: &Path, path: &Path) -> Result<Source> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    let (kind, name) = parse_header(&text)?;
    let modified: DateTime<Utc> = fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::from)
        .with_context(|| format!("Could not stat {}", path.display()))?;

    Ok(Source {
        file: CiFile {
            kind,
            name,
            path: path.to_path_buf(),
            modified,
            sub_path: paths::sub_path(base, path),
        },
        text,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cikit::Kind;

    fn write(dir: &Path, rel: &str, text: &str) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_discover_tree() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "rule/R.ci", r#"rule "R" { }"#);
        write(dir.path(), "Top.ci", r#"package "Top" { }"#);
        write(dir.path(), "notes.txt", "ignored");
        write(dir.path(), ".git/x.ci", r#"rule "Hidden" { }"#);

        let found = discover(dir.path()).unwrap();
        assert!(found.errors.is_empty());
        let names: Vec<(&str, &str)> = found
            .sources
            .iter()
            .map(|s| (s.file.name.as_str(), s.file.sub_path.as_str()))
            .collect();
        assert_eq!(names, [("Top", ""), ("R", "rule")]);
        assert_eq!(found.sources[1].file.kind, Kind::Rule);
    }

    #[test]
    fn test_bad_header_and_duplicate_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.ci", r#"rule "R" { }"#);
        write(dir.path(), "b.ci", r#"rule "R" { hidden }"#);
        write(dir.path(), "c.ci", r#"widget "W" { }"#);

        let found = discover(dir.path()).unwrap();
        assert_eq!(found.sources.len(), 1);
        assert_eq!(found.errors.len(), 2);
        assert!(found.errors[0].1.contains("already declared"));
    }

    #[test]
    fn test_discover_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "uk/UK.ci", r#"uniquekey "UK" { }"#);

        let found = discover(&path).unwrap();
        assert_eq!(found.sources.len(), 1);
        assert_eq!(found.sources[0].file.sub_path, "");
    }

    #[test]
    fn test_missing_root() {
        assert!(discover(Path::new("/definitely/not/here")).is_err());
    }
}
