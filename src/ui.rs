use cikit::{Error, Operation, Plan};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Plans
// ============================================================================

/// Print one plan: a status line, then its operations.
pub fn plan(plan: &Plan, verbose: bool) {
    let title = format!("{} {}", plan.kind, plan.name);
    if plan.is_noop() {
        if verbose {
            println!("  {} {}", "○".dimmed(), title.dimmed());
        }
        return;
    }

    let (symbol, note) = if plan.exists {
        ("~".yellow(), format!("{} change(s)", plan.operations.len()))
    } else {
        ("+".green(), "create".to_string())
    };
    println!("  {} {:<40} {}", symbol, title, note.dimmed());
    for op in &plan.operations {
        println!("      {} {}", operation_symbol(op), op.to_string().dimmed());
    }
}

fn operation_symbol(op: &Operation) -> colored::ColoredString {
    match op {
        Operation::AddSymbolicName { .. }
        | Operation::AddListItem { .. }
        | Operation::AddChild { .. } => "+".green(),
        Operation::RemoveSymbolicName { .. }
        | Operation::RemoveListItem { .. }
        | Operation::RemoveChild { .. }
        | Operation::RemoveProperty { .. } => "-".red(),
        _ => "~".yellow(),
    }
}

/// Print the commands of a plan's batch.
pub fn batch(plan: &Plan) {
    for command in &plan.batch.commands {
        println!("      {}", command.cyan());
    }
}

/// Print a per-CI failure with the category's advice.
pub fn failure(subject: &str, err: &Error) {
    error(&format!("{subject}: {err}"));
    let category = err.category();
    eprintln!(
        "    {} {}",
        category.description().dimmed(),
        format!("({})", category.advice()).dimmed()
    );
    if let Some(batch) = attempted_batch(err) {
        eprintln!("    {}", "attempted batch:".dimmed());
        for line in batch.lines() {
            eprintln!("      {}", line.dimmed());
        }
    }
}

fn attempted_batch(err: &Error) -> Option<&str> {
    match err {
        Error::Transport { batch, .. } => Some(batch.as_str()),
        Error::Ci { source, .. } => attempted_batch(source),
        _ => None,
    }
}

/// Print a line diff between two texts. Returns whether anything differed.
pub fn text_diff(old: &str, new: &str) -> bool {
    let diff = TextDiff::from_lines(old, new);
    let mut has_changes = false;

    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Delete => {
                has_changes = true;
                print!("    {}", format!("- {change}").red());
            }
            ChangeTag::Insert => {
                has_changes = true;
                print!("    {}", format!("+ {change}").green());
            }
            ChangeTag::Equal => {}
        }
    }
    has_changes
}

// ============================================================================
// Summary
// ============================================================================

/// Counts for the end-of-run summary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub created: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Summary {
    pub fn count(&mut self, plan: &Plan) {
        if plan.is_noop() {
            self.unchanged += 1;
        } else if plan.exists {
            self.modified += 1;
        } else {
            self.created += 1;
        }
    }

    pub fn total_changes(&self) -> usize {
        self.created + self.modified
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Print final summary
pub fn summary(summary: &Summary, verb: &str) {
    println!();
    if summary.is_success() {
        println!("  {} {}", "✓".green().bold(), verb);
    } else {
        println!("  {} {} with errors", "⚠".yellow().bold(), verb);
    }

    if summary.created > 0 {
        println!("    • {} created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} modified", summary.modified);
    }
    if summary.unchanged > 0 {
        println!("    • {} unchanged", summary.unchanged);
    }
    if summary.skipped > 0 {
        println!("    • {} skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {}", summary.failed, "failed".red());
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cikit::{CommandBatch, Kind};

    fn make_plan(exists: bool, operations: Vec<Operation>) -> Plan {
        Plan {
            kind: Kind::Rule,
            name: "R".into(),
            exists,
            operations,
            batch: CommandBatch::default(),
        }
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = Summary::default();
        summary.count(&make_plan(true, Vec::new()));
        summary.count(&make_plan(false, Vec::new()));
        summary.count(&make_plan(
            true,
            vec![Operation::RemoveProperty { key: "x".into() }],
        ));

        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.modified, 1);
        assert_eq!(summary.total_changes(), 2);
        assert!(summary.is_success());
    }

    #[test]
    fn test_attempted_batch_is_found_through_context() {
        let err = Error::Transport {
            message: "rejected".into(),
            batch: "modify rule \"R\" hidden;\n".into(),
        }
        .in_ci(Kind::Rule, "R");
        assert_eq!(attempted_batch(&err), Some("modify rule \"R\" hidden;\n"));
    }

    #[test]
    fn test_text_diff_reports_changes() {
        assert!(!text_diff("a\nb\n", "a\nb\n"));
        assert!(text_diff("a\nb\n", "a\nc\n"));
    }
}
