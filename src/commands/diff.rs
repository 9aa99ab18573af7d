//! `cisync diff` - preview what apply would change

use anyhow::{Result, bail};
use cikit::{CiObject, Client, Plan, apply_operations, write_string};

use crate::Context;
use crate::cli::DiffArgs;
use crate::ui;

pub fn run(ctx: &Context, args: DiffArgs) -> Result<()> {
    let config = super::load_config(ctx)?;
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

    if args.json {
        let plans: Vec<&Plan> = planned
            .iter()
            .filter_map(|p| p.result.as_ref().ok())
            .collect();
        println!("{}", serde_json::to_string_pretty(&plans)?);
    } else {
        ui::header("Configuration Diff");
    }

    for entry in &planned {
        match &entry.result {
            Ok(plan) => {
                summary.count(plan);
                if args.json {
                    continue;
                }
                ui::plan(plan, ctx.verbose > 0);
                if args.text && !plan.is_noop() {
                    preview(&client, plan)?;
                }
            }
            Err(e) => {
                summary.failed += 1;
                ui::failure(&entry.source.file.path.display().to_string(), e);
            }
        }
    }

    if !args.json {
        if summary.total_changes() == 0 && summary.is_success() {
            println!();
            ui::success("No changes needed");
        } else {
            ui::summary(&summary, "Diff complete");
        }
    }

    if !summary.is_success() {
        bail!("{} file(s) could not be planned", summary.failed);
    }
    Ok(())
}

/// Text diff between the live object and the result of replaying the plan.
fn preview(client: &Client, plan: &Plan) -> Result<()> {
    let current = if plan.exists {
        client.fetch(plan.kind, &plan.name)?
    } else {
        CiObject::new(plan.kind, plan.name.clone())
    };
    let after = apply_operations(&current, &plan.operations)?;
    let before = if plan.exists {
        write_string(&current)
    } else {
        String::new()
    };
    ui::text_diff(&before, &write_string(&after));
    Ok(())
}
