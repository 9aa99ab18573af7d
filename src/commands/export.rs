//! `cisync export` - write live objects as declarative files

use anyhow::{Context as AnyhowContext, Result, bail};
use std::fs;

use crate::Context;
use crate::cli::ExportArgs;
use crate::{paths, ui};

pub fn run(ctx: &Context, args: ExportArgs) -> Result<()> {
    let config = super::load_config(ctx)?;
    let client = config.client();

    let names = if args.names.is_empty() {
        client.list_names(args.kind)?
    } else {
        args.names.clone()
    };
    if names.is_empty() {
        ui::info(&format!("No live {} objects", args.kind));
        return Ok(());
    }

    let dir = args.out.join(args.kind.keyword());
    if !args.stdout {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Could not create {}", dir.display()))?;
    }

    let mut failed = 0;
    for name in &names {
        match client.export(args.kind, name) {
            Ok(text) if args.stdout => print!("{text}"),
            Ok(text) => {
                let path = dir.join(paths::file_name_for(name));
                fs::write(&path, &text)
                    .with_context(|| format!("Could not write {}", path.display()))?;
                if !ctx.quiet {
                    ui::success(&format!("{} {} → {}", args.kind, name, path.display()));
                }
            }
            Err(e) => {
                failed += 1;
                ui::failure(&format!("{} {}", args.kind, name), &e);
                if !config.continue_on_error {
                    break;
                }
            }
        }
    }

    if failed > 0 {
        bail!("{failed} object(s) could not be exported");
    }
    Ok(())
}
