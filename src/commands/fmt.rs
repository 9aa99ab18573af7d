//! `cisync fmt` - rewrite declarative files in canonical form
//!
//! Comments are not part of the model and do not survive formatting.

use anyhow::{Context as AnyhowContext, Result, bail};
use cikit::{check_round_trip, parse_document};
use std::fs;
use std::path::Path;

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, path: &Path, check: bool) -> Result<()> {
    let (sources, mut failed) = super::discover(path)?;
    let mut changed = 0;

    for source in &sources {
        let label = source.file.path.display().to_string();
        let canonical = match parse_document(&source.text).and_then(|obj| check_round_trip(&obj))
        {
            Ok(text) => text,
            Err(e) => {
                failed += 1;
                ui::failure(&label, &e);
                continue;
            }
        };
        if canonical == source.text {
            continue;
        }

        changed += 1;
        if check {
            ui::warn(&format!("{label} is not canonical"));
            if ctx.verbose > 0 {
                ui::text_diff(&source.text, &canonical);
            }
        } else {
            fs::write(&source.file.path, &canonical)
                .with_context(|| format!("Could not write {label}"))?;
            if !ctx.quiet {
                ui::success(&format!("formatted {label}"));
            }
        }
    }

    if failed > 0 {
        bail!("{failed} file(s) could not be parsed");
    }
    if check && changed > 0 {
        bail!("{changed} file(s) need formatting");
    }
    if changed == 0 && !ctx.quiet {
        ui::success("All files are canonical");
    }
    Ok(())
}
