use cikit::Kind;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cisync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Keep platform configuration items in sync with declarative files", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ./cisync.toml, then ~/.config/cisync/config.toml)
    #[arg(short, long, global = true, env = "CISYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write live objects as declarative files
    Export(ExportArgs),

    /// Show what apply would change
    Diff(DiffArgs),

    /// Make the platform match the declarative files
    Apply(ApplyArgs),

    /// Validate declarative files without contacting the platform
    Check(PathArgs),

    /// Rewrite declarative files in canonical form
    Fmt(FmtArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

// ============================================================================
// Arguments
// ============================================================================

#[derive(Args)]
pub struct PathArgs {
    /// File or directory of .ci files
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Kind of object (attribute, index, package, rule, uniquekey)
    #[arg(value_parser = parse_kind)]
    pub kind: Kind,

    /// Object names (default: every object of the kind)
    pub names: Vec<String>,

    /// Output directory; files land in <out>/<kind>/<name>.ci
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,

    /// Print to stdout instead of writing files
    #[arg(long, conflicts_with = "out")]
    pub stdout: bool,
}

#[derive(Args)]
pub struct DiffArgs {
    #[command(flatten)]
    pub target: PathArgs,

    /// Show a text diff of each object before and after the update
    #[arg(short, long)]
    pub text: bool,

    /// Print plans as JSON
    #[arg(long)]
    pub json: bool,

    /// Number of parallel jobs for planning
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub target: PathArgs,

    /// Dry run - show the commands without sending them
    #[arg(short, long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Print plans as JSON
    #[arg(long)]
    pub json: bool,

    /// Keep going after a CI fails
    #[arg(long)]
    pub continue_on_error: bool,

    /// Number of parallel jobs for planning
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Args)]
pub struct FmtArgs {
    #[command(flatten)]
    pub target: PathArgs,

    /// Only report files that are not canonical
    #[arg(long)]
    pub check: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// List config file locations in lookup order
    Path,
}

/// Parse a kind keyword for clap.
pub fn parse_kind(s: &str) -> Result<Kind, String> {
    Kind::from_keyword(&s.to_lowercase()).ok_or_else(|| {
        let known: Vec<&str> = Kind::ALL.iter().map(Kind::keyword).collect();
        format!("unknown kind '{s}' (expected one of: {})", known.join(", "))
    })
}
