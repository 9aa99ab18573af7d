//! Subcommand implementations

pub mod apply;
pub mod check;
pub mod config;
pub mod diff;
pub mod export;
pub mod fmt;

use anyhow::{Context as AnyhowContext, Result};
use cikit::{Client, Kind, Plan, RunCache, Stamp};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::Path;

use crate::Context;
use crate::config::{CisyncConfig, Loaded};
use crate::discovery::{self, Source};
use crate::ui;

/// Outcome of planning one source file.
pub struct Planned<'a> {
    pub source: &'a Source,
    pub result: cikit::Result<Plan>,
}

/// Load the effective config.
pub fn load_config(ctx: &Context) -> Result<CisyncConfig> {
    let Loaded { config, source } = CisyncConfig::load(ctx.config.as_deref())?;
    if ctx.verbose > 0 {
        match source {
            Some(path) => ui::dim(&format!("config: {}", path.display())),
            None => ui::dim("config: defaults"),
        }
    }
    Ok(config)
}

/// Discover source files, reporting the unreadable ones.
///
/// Returns the readable sources and the number of files that failed.
pub fn discover(path: &Path) -> Result<(Vec<Source>, usize)> {
    let found = discovery::discover(path)?;
    for (file, message) in &found.errors {
        ui::error(&format!("{}: {message}", file.display()));
    }
    Ok((found.sources, found.errors.len()))
}

/// Plan every source against the platform.
///
/// Live name listings for all involved kinds are loaded once into a run
/// cache, then sources are planned in parallel. A failing source does not
/// stop the others; its error is kept in its [`Planned`] entry.
pub fn plan_all<'a>(
    client: &Client,
    sources: &'a [Source],
    installer: &str,
    jobs: usize,
    quiet: bool,
) -> Result<Vec<Planned<'a>>> {
    let kinds: Vec<Kind> = sources
        .iter()
        .map(|s| s.file.kind)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut cache = RunCache::new();
    client
        .preload(&mut cache, &kinds)
        .context("Failed to list live objects")?;
    let stamp = Stamp::now(installer);

    let pb = progress_bar(sources.len(), quiet);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("Failed to create planning thread pool")?;

    let planned = pool.install(|| {
        sources
            .par_iter()
            .map(|source| {
                let result = client.plan(&source.file, &source.text, &cache, &stamp);
                pb.set_message(format!("{} {}", source.file.kind, source.file.name));
                pb.inc(1);
                Planned { source, result }
            })
            .collect()
    });

    pb.finish_and_clear();
    cache.clear();
    Ok(planned)
}

fn progress_bar(len: usize, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::with_template("  {spinner} Planning [{bar:30}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

/// Ask before sending anything to the platform.
pub fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cikit::transport::mock::MockTransport;
    use std::fs;

    #[test]
    fn test_plan_all_lists_each_kind_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ci"), r#"rule "A" { }"#).unwrap();
        fs::write(dir.path().join("b.ci"), r#"rule "B" { hidden }"#).unwrap();
        fs::write(dir.path().join("c.ci"), r#"package "C" { }"#).unwrap();
        let sources = discovery::discover(dir.path()).unwrap().sources;

        let mock = MockTransport::new();
        let client = Client::new(Box::new(mock.clone()));
        let planned = plan_all(&client, &sources, "cisync", 2, true).unwrap();

        assert_eq!(planned.len(), 3);
        assert!(planned.iter().all(|p| p.result.as_ref().is_ok_and(|plan| !plan.exists)));
        // one listing per kind, no readback for objects that do not exist
        let batches = mock.batches();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.starts_with("list ")));
    }

    #[test]
    fn test_plan_all_keeps_going_after_a_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ci"), r#"rule "A" { bogus }"#).unwrap();
        fs::write(dir.path().join("b.ci"), r#"rule "B" { }"#).unwrap();
        let sources = discovery::discover(dir.path()).unwrap().sources;

        let client = Client::new(Box::new(MockTransport::new()));
        let planned = plan_all(&client, &sources, "cisync", 1, true).unwrap();

        assert!(planned[0].result.is_err());
        assert!(planned[1].result.is_ok());
    }
}
