//! `cisync apply` - make the platform match the declarative files
//!
//! Planning runs in parallel; batches are sent one CI at a time so each
//! object has a single writer. By default the first failure stops the run;
//! with `--continue-on-error` (or `continue_on_error` in the config) the
//! remaining CIs are still applied and all failures are reported at the end.

use anyhow::{Result, bail};
use cikit::Plan;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::ui;

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let config = super::load_config(ctx)?;
    let continue_on_error = args.continue_on_error || config.continue_on_error;

    let (sources, unreadable) = super::discover(&args.target.path)?;
    if sources.is_empty() && unreadable == 0 {
        ui::info("No .ci files found");
        return Ok(());
    }

    let client = config.client();
    let planned = super::plan_all(
        &client,
        &sources,
        &config.installer,
        args.jobs,
        ctx.quiet || args.json,
    )?;

    let mut summary = ui::Summary {
        failed: unreadable,
        ..Default::default()
    };
    let mut pending: Vec<&Plan> = Vec::new();
    for entry in &planned {
        match &entry.result {
            Ok(plan) if plan.is_noop() => summary.unchanged += 1,
            Ok(plan) => pending.push(plan),
            Err(e) => {
                summary.failed += 1;
                ui::failure(&entry.source.file.path.display().to_string(), e);
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
    } else if !pending.is_empty() {
        ui::header("Planned Changes");
        for plan in &pending {
            ui::plan(plan, false);
        }
    }

    if pending.is_empty() {
        if !summary.is_success() {
            bail!("{} file(s) could not be planned", summary.failed);
        }
        if !args.json {
            println!();
            ui::success("No changes needed");
        }
        return Ok(());
    }

    if !summary.is_success() && !continue_on_error {
        summary.skipped = pending.len();
        ui::summary(&summary, "Nothing applied");
        bail!(
            "{} file(s) could not be planned; use --continue-on-error to apply the rest",
            summary.failed
        );
    }

    if args.dry_run {
        if !args.json {
            println!();
            ui::info("Dry run - commands that would be sent:");
            for plan in &pending {
                ui::kv(plan.kind.keyword(), &plan.name);
                ui::batch(plan);
            }
        }
        return Ok(());
    }

    if !args.yes && !super::confirm_proceed()? {
        println!();
        ui::error("Aborted");
        return Ok(());
    }

    for (i, plan) in pending.iter().enumerate() {
        let label = format!("{} {}", plan.kind, plan.name);
        match client.apply(plan) {
            Ok(_) => {
                summary.count(plan);
                if !ctx.quiet {
                    ui::success(&label);
                }
            }
            Err(e) => {
                summary.failed += 1;
                ui::failure(&label, &e);
                if !continue_on_error {
                    summary.skipped += pending.len() - i - 1;
                    break;
                }
            }
        }
    }

    ui::summary(&summary, "Configuration applied");
    if !summary.is_success() {
        bail!("{} CI(s) failed", summary.failed);
    }
    Ok(())
}
