use anyhow::Result;

use crate::cli::ConfigCommand;
use crate::config::{CisyncConfig, Loaded};
use crate::paths;
use crate::ui;
use crate::Context;

pub fn run(ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(ctx),
        ConfigCommand::Path => path(ctx),
    }
}

fn show(ctx: &Context) -> Result<()> {
    let Loaded { config, source } = CisyncConfig::load(ctx.config.as_deref())?;

    ui::header("Effective Configuration");
    println!();
    match source {
        Some(path) => ui::kv("Loaded from", &path.display().to_string()),
        None => ui::kv("Loaded from", "built-in defaults"),
    }
    println!();
    print!("{}", config.to_toml()?);
    Ok(())
}

fn path(ctx: &Context) -> Result<()> {
    ui::header("Config Lookup Order");
    println!();

    let candidates = paths::config_candidates(ctx.config.as_deref())?;
    let mut found = false;
    for candidate in candidates {
        let display = candidate.display().to_string();
        if candidate.is_file() && !found {
            found = true;
            ui::success(&format!("{display} (active)"));
        } else if candidate.is_file() {
            ui::dim(&format!("  {display} (shadowed)"));
        } else {
            ui::dim(&format!("  {display} (not found)"));
        }
    }

    if !found {
        println!();
        ui::dim("No config file found; defaults are in effect.");
    }
    Ok(())
}
