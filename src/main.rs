use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use fleet_patcher::engine::{FileOutcome, PatchEngine, RunReport};
use fleet_patcher::rules::{load_from_path, RuleSet};
use similar::{ChangeTag, TextDiff};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "fleet-patcher")]
#[command(about = "Bulk configuration patching for repository working copies", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a ruleset to a working copy
    Apply {
        /// Path to the working-copy root
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Specific ruleset file to apply (otherwise applies all in rules/)
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Dry run - show what would change without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Evaluate a ruleset without writing anything
    Status {
        /// Path to the working-copy root
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Specific ruleset file to evaluate
        #[arg(long)]
        rules: Option<PathBuf>,
    },

    /// List the rules a ruleset contains
    List {
        /// Path to the working-copy root (used for ruleset discovery)
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Specific ruleset file to list
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fleet_patcher=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            root,
            rules,
            dry_run,
            diff,
        } => cmd_apply(root, rules, dry_run, diff),

        Commands::Status { root, rules } => cmd_apply(root, rules, true, false),

        Commands::List { root, rules } => cmd_list(root, rules),
    }
}

/// Helper: Discover all .toml ruleset files in a rules/ directory.
///
/// Discovery order:
/// 1. `<root>/rules` (allows keeping rulesets alongside the working copy).
/// 2. `./rules` relative to the current working directory (typical when the
///    rulesets live with the operator, not the target).
fn discover_ruleset_files(root: &Path) -> Result<Vec<PathBuf>> {
    let cwd_rules_dir = env::current_dir().ok().map(|cwd| cwd.join("rules"));
    let root_rules_dir = root.join("rules");

    let candidate_dirs: Vec<PathBuf> = std::iter::once(root_rules_dir)
        .chain(cwd_rules_dir)
        .collect();

    for rules_dir in candidate_dirs {
        if !rules_dir.exists() {
            continue;
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&rules_dir).max_depth(1) {
            let entry = entry?;
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
            {
                files.push(entry.path().to_path_buf());
            }
        }

        files.sort();

        if !files.is_empty() {
            return Ok(files);
        }
    }

    anyhow::bail!(
        "No .toml ruleset files found in either ./rules or {}/rules",
        root.display()
    )
}

fn ruleset_files(root: &Path, rules: Option<PathBuf>) -> Result<Vec<PathBuf>> {
    match rules {
        Some(path) => Ok(vec![path]),
        None => discover_ruleset_files(root),
    }
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn cmd_apply(root: PathBuf, rules: Option<PathBuf>, dry_run: bool, show_diff: bool) -> Result<()> {
    let root = root.canonicalize()?;
    let ruleset_paths = ruleset_files(&root, rules)?;

    println!("Working copy: {}", root.display());
    if dry_run {
        println!("{}", "  [DRY RUN - no files will be written]".cyan());
        if show_diff {
            println!("{}", "  (diffs are only shown when changes are written)".dimmed());
        }
    }
    println!();

    let mut total_modified = 0;
    let mut total_unchanged = 0;
    let mut total_missing = 0;
    let mut total_failed = 0;
    let mut all_modified: Vec<PathBuf> = Vec::new();

    for ruleset_path in ruleset_paths {
        println!("Loading ruleset from {}...", ruleset_path.display());

        let ruleset: RuleSet = load_from_path(&ruleset_path)?;
        if !ruleset.meta.name.is_empty() {
            println!("  {}", ruleset.meta.name.bold());
        }

        let engine = PatchEngine::new(&root, ruleset)?.dry_run(dry_run);

        // Capture file contents before applying (for diff output). Only the
        // files the ruleset resolves to, not the whole working copy.
        let mut before: HashMap<PathBuf, String> = HashMap::new();
        if show_diff {
            for relative in engine.target_files() {
                let absolute = root.join(&relative);
                if let Ok(content) = fs::read_to_string(&absolute) {
                    before.insert(relative, content);
                }
            }
        }

        let report = engine.run();
        print_outcomes(&report, dry_run);

        for outcome in &report.outcomes {
            match outcome {
                FileOutcome::Modified { .. } => total_modified += 1,
                FileOutcome::Unchanged { .. } => total_unchanged += 1,
                FileOutcome::Missing { .. } => total_missing += 1,
                FileOutcome::Failed { .. } => total_failed += 1,
            }
        }

        if show_diff && !dry_run {
            for relative in report.modified_files() {
                let Some(original) = before.get(relative) else {
                    continue;
                };
                if let Ok(patched) = fs::read_to_string(root.join(relative)) {
                    if original != &patched {
                        display_diff(relative, original, &patched);
                    }
                }
            }
        }

        for file in report.modified_files() {
            let file = file.to_path_buf();
            if !all_modified.contains(&file) {
                all_modified.push(file);
            }
        }

        println!();
    }

    println!("{}", "Summary:".bold());
    println!("  {} modified", format!("{}", total_modified).green());
    println!("  {} unchanged", format!("{}", total_unchanged).yellow());
    println!("  {} missing", format!("{}", total_missing).cyan());
    println!("  {} failed", format!("{}", total_failed).red());

    if !all_modified.is_empty() {
        println!();
        println!("{}", "Modified files:".bold());
        for file in &all_modified {
            println!("  - {}", file.display());
        }
    }

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn print_outcomes(report: &RunReport, dry_run: bool) {
    for outcome in &report.outcomes {
        match outcome {
            FileOutcome::Modified { file } => {
                let verb = if dry_run { "Would modify" } else { "Modified" };
                println!("{} {} {}", "✓".green(), verb, file.display());
            }
            FileOutcome::Unchanged { file } => {
                println!("{} No change for {}", "⊙".yellow(), file.display());
            }
            FileOutcome::Missing { file } => {
                println!("{} Missing {}", "⊘".cyan(), file.display());
            }
            FileOutcome::Failed { file, reason } => {
                eprintln!("{} Failed on {}: {}", "✗".red(), file.display(), reason);
            }
        }
    }
}

fn cmd_list(root: PathBuf, rules: Option<PathBuf>) -> Result<()> {
    let root = root.canonicalize().unwrap_or(root);
    let ruleset_paths = ruleset_files(&root, rules)?;

    for ruleset_path in ruleset_paths {
        let ruleset = load_from_path(&ruleset_path)?;

        println!("{}", ruleset_path.display().to_string().bold());
        if !ruleset.meta.name.is_empty() {
            println!("  name: {}", ruleset.meta.name);
        }
        if let Some(description) = &ruleset.meta.description {
            println!("  description: {}", description);
        }

        for rule in &ruleset.rules {
            let target = if rule.discover {
                format!("any {}", rule.file)
            } else {
                rule.file.clone()
            };
            println!(
                "  - {} ({}): {} operation(s)",
                target,
                rule.document_type,
                rule.changes.len()
            );
            for change in &rule.changes {
                println!("      {}", change.kind().dimmed());
            }
        }
        println!();
    }

    Ok(())
}
