//! `cisync check` - offline validation of declarative files

use anyhow::{Result, bail};
use cikit::{check_round_trip, parse_document};
use std::path::Path;

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, path: &Path) -> Result<()> {
    let (sources, mut failed) = super::discover(path)?;
    let total = sources.len() + failed;

    for source in &sources {
        let label = source.file.path.display().to_string();
        match parse_document(&source.text).and_then(|obj| check_round_trip(&obj)) {
            Ok(_) if ctx.verbose > 0 => ui::success(&label),
            Ok(_) => {}
            Err(e) => {
                failed += 1;
                ui::failure(&label, &e);
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {total} file(s) failed validation");
    }
    if !ctx.quiet {
        ui::success(&format!("{total} file(s) valid"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn ctx() -> Context {
        Context {
            verbose: 0,
            quiet: true,
            config: None,
        }
    }

    #[test]
    fn test_valid_tree_passes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("R.ci"),
            r#"rule "R" { access owner {read} }"#,
        )
        .unwrap();
        run(&ctx(), dir.path()).unwrap();
    }

    #[test]
    fn test_syntax_error_fails() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("R.ci"), r#"rule "R" { description "open }"#).unwrap();
        let err = run(&ctx(), dir.path()).unwrap_err();
        assert!(err.to_string().contains("1 of 1"));
    }
}
