//! The change dispatcher and idempotency gate.
//!
//! Each rule routes to one strategy: regex substitution for text, structural
//! navigation for JSON and nested YAML, the text-block editor for top-level
//! YAML deletes, and line-oriented upserts for env files. Every strategy
//! computes the full new content in memory; the gate writes back only when
//! the content actually changed.
//!
//! Nothing below the single-file level aborts a run. Parse and I/O failures
//! become `Failed` outcomes for that file, path mismatches inside a document
//! become logged no-ops, and the remaining rules are still attempted.

use crate::block;
use crate::env;
use crate::matcher;
use crate::navigator;
use crate::path::PathExpr;
use crate::rules::{ChangeAction, ChangeRule, DocumentType, RuleSet};
use crate::safety::{SafetyError, WorkspaceGuard};
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use xxhash_rust::xxh3::xxh3_64;

/// Directories never entered during filename discovery, matching the usual
/// vendored/generated trees in application repositories.
const SKIPPED_DIRS: &[&str] = &["node_modules", "vendor", "target", "build"];

/// Result of applying one rule to one resolved target file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "FileOutcome should be checked for failure"]
pub enum FileOutcome {
    /// The file's content changed and (outside dry-run) was written back.
    Modified { file: PathBuf },
    /// Every operation was a no-op for the current content.
    Unchanged { file: PathBuf },
    /// The target file does not exist in this working copy.
    Missing { file: PathBuf },
    /// The file could not be processed; it was left untouched.
    Failed { file: PathBuf, reason: String },
}

impl FileOutcome {
    pub fn file(&self) -> &Path {
        match self {
            FileOutcome::Modified { file }
            | FileOutcome::Unchanged { file }
            | FileOutcome::Missing { file }
            | FileOutcome::Failed { file, .. } => file,
        }
    }
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOutcome::Modified { file } => write!(f, "Modified {}", file.display()),
            FileOutcome::Unchanged { file } => write!(f, "No change for {}", file.display()),
            FileOutcome::Missing { file } => write!(f, "Skipped missing {}", file.display()),
            FileOutcome::Failed { file, reason } => {
                write!(f, "Failed on {}: {}", file.display(), reason)
            }
        }
    }
}

/// Per-run accumulation of outcomes, one per (rule, resolved target).
#[derive(Debug, Clone, Default)]
#[must_use = "RunReport should be checked for modified files and failures"]
pub struct RunReport {
    pub outcomes: Vec<FileOutcome>,
}

impl RunReport {
    /// Relative paths that were modified, deduplicated, in rule order.
    pub fn modified_files(&self) -> Vec<&Path> {
        let mut files: Vec<&Path> = Vec::new();
        for outcome in &self.outcomes {
            if let FileOutcome::Modified { file } = outcome {
                if !files.contains(&file.as_path()) {
                    files.push(file.as_path());
                }
            }
        }
        files
    }

    pub fn changed(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o, FileOutcome::Modified { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o, FileOutcome::Failed { .. }))
    }
}

/// Failure while running a strategy over one file. These never escape the
/// engine; they are converted to [`FileOutcome::Failed`] at the file
/// boundary.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The patch engine: a working-copy root plus the ruleset to apply.
///
/// The engine holds no state between runs; re-running the same ruleset over
/// an already-patched working copy reports no changes.
pub struct PatchEngine {
    guard: WorkspaceGuard,
    ruleset: RuleSet,
    dry_run: bool,
}

impl PatchEngine {
    pub fn new(root: impl AsRef<Path>, ruleset: RuleSet) -> Result<Self, SafetyError> {
        Ok(Self {
            guard: WorkspaceGuard::new(root)?,
            ruleset,
            dry_run: false,
        })
    }

    /// Evaluate every strategy without writing anything back.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn root(&self) -> &Path {
        self.guard.root()
    }

    pub fn ruleset(&self) -> &RuleSet {
        &self.ruleset
    }

    /// All relative target paths the ruleset resolves to in this working
    /// copy, discovery included. Used by callers that capture before-state
    /// (diff display).
    pub fn target_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = Vec::new();
        for rule in &self.ruleset.rules {
            for target in self.resolve_targets(rule) {
                if !files.contains(&target) {
                    files.push(target);
                }
            }
        }
        files
    }

    /// Apply every rule in order, one file at a time.
    pub fn run(&self) -> RunReport {
        let mut report = RunReport::default();
        for rule in &self.ruleset.rules {
            for relative in self.resolve_targets(rule) {
                let outcome = self.apply_rule_to(rule, &relative);
                debug!(%outcome, "rule evaluated");
                report.outcomes.push(outcome);
            }
        }
        report
    }

    /// Resolve a rule to relative target paths: the exact path, or every
    /// file with a matching name when `discover` is set.
    fn resolve_targets(&self, rule: &ChangeRule) -> Vec<PathBuf> {
        if !rule.discover {
            return vec![PathBuf::from(&rule.file)];
        }

        let root = self.guard.root();
        let mut targets: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !skip_during_discovery(entry))
            .filter_map(Result::ok)
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry.file_name().to_str() == Some(rule.file.as_str())
            })
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(root)
                    .ok()
                    .map(Path::to_path_buf)
            })
            .collect();
        targets.sort();
        targets
    }

    fn apply_rule_to(&self, rule: &ChangeRule, relative: &Path) -> FileOutcome {
        let file = relative.to_path_buf();

        if !self.guard.root().join(relative).exists() {
            debug!(file = %file.display(), "target not present; skipping");
            return FileOutcome::Missing { file };
        }

        let absolute = match self.guard.validate_path(relative) {
            Ok(path) => path,
            Err(err) => {
                warn!(file = %file.display(), %err, "unsafe target path");
                return FileOutcome::Failed {
                    file,
                    reason: err.to_string(),
                };
            }
        };

        let original = match fs::read_to_string(&absolute) {
            Ok(content) => content,
            Err(err) => {
                warn!(file = %file.display(), %err, "failed to read target");
                return FileOutcome::Failed {
                    file,
                    reason: err.to_string(),
                };
            }
        };

        let updated = match self.rewrite(rule, &original) {
            Ok(updated) => updated,
            Err(err) => {
                warn!(file = %file.display(), %err, "rule abandoned for this file");
                return FileOutcome::Failed {
                    file,
                    reason: err.to_string(),
                };
            }
        };

        if updated == original {
            return FileOutcome::Unchanged { file };
        }

        if !self.dry_run {
            if let Err(err) = atomic_write(&absolute, updated.as_bytes()) {
                warn!(file = %file.display(), %err, "failed to write target");
                return FileOutcome::Failed {
                    file,
                    reason: err.to_string(),
                };
            }
        }

        info!(file = %file.display(), rule = %self.ruleset.meta.name, "modified");
        FileOutcome::Modified { file }
    }

    fn rewrite(&self, rule: &ChangeRule, original: &str) -> Result<String, StrategyError> {
        match rule.document_type {
            DocumentType::Text => Ok(apply_text(original, &rule.changes)),
            DocumentType::Json => apply_json(original, &rule.changes),
            DocumentType::Yaml => apply_yaml(original, &rule.changes),
            DocumentType::Env => Ok(apply_env(original, &rule.changes)),
        }
    }
}

fn skip_during_discovery(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

/// Regex substitutions applied in order. Structural actions have no meaning
/// in the text domain and are ignored.
fn apply_text(original: &str, changes: &[ChangeAction]) -> String {
    let mut content = original.to_string();
    for change in changes {
        match change {
            ChangeAction::Replace {
                pattern,
                replacement,
            } => match Regex::new(pattern) {
                Ok(re) => content = re.replace_all(&content, replacement.as_str()).into_owned(),
                Err(err) => warn!(%err, "invalid replace pattern; operation skipped"),
            },
            other => warn!(
                action = other.kind(),
                "action not meaningful for text documents; ignored"
            ),
        }
    }
    content
}

/// Parse, navigate, re-serialize with stable key ordering. The file is
/// rewritten only when the document itself changed, so a set to an
/// already-equal value keeps the original bytes.
fn apply_json(original: &str, changes: &[ChangeAction]) -> Result<String, StrategyError> {
    let parsed: serde_json::Value = serde_json::from_str(original)?;
    let mut doc: Value = serde_yaml::to_value(&parsed)?;

    let before = document_signature(&doc)?;
    apply_structural(&mut doc, changes);
    if document_signature(&doc)? == before {
        return Ok(original.to_string());
    }

    let back: serde_json::Value = serde_json::to_value(&doc)?;
    let mut rendered = serde_json::to_string_pretty(&back)?;
    rendered.push('\n');
    Ok(rendered)
}

/// YAML has two strategies. When every operation is a top-level delete, the
/// text-block editor preserves all untouched formatting. Any nested or
/// indexed path, or any set, forces the full parse/re-serialize path, which
/// trades comments and key order for arbitrary-path support.
fn apply_yaml(original: &str, changes: &[ChangeAction]) -> Result<String, StrategyError> {
    if let Some(deletes) = as_blockwise_deletes(changes) {
        return apply_yaml_blockwise(original, &deletes);
    }

    let mut doc = parse_yaml_document(original)?;
    let before = document_signature(&doc)?;
    apply_structural(&mut doc, changes);
    if document_signature(&doc)? == before {
        return Ok(original.to_string());
    }
    Ok(serde_yaml::to_string(&doc)?)
}

/// The rule qualifies for the formatting-preserving path when it consists
/// solely of deletes of plain top-level keys (no dots, no indices).
fn as_blockwise_deletes(changes: &[ChangeAction]) -> Option<Vec<(&str, Option<&Value>)>> {
    if changes.is_empty() {
        return None;
    }
    let mut deletes = Vec::with_capacity(changes.len());
    for change in changes {
        match change {
            ChangeAction::DeleteKey { path, expect }
                if !path.is_empty() && !path.contains('.') && !path.contains('[') =>
            {
                deletes.push((path.as_str(), expect.as_ref()));
            }
            _ => return None,
        }
    }
    Some(deletes)
}

fn apply_yaml_blockwise(
    original: &str,
    deletes: &[(&str, Option<&Value>)],
) -> Result<String, StrategyError> {
    let mut content = original.to_string();
    for (key, expect) in deletes {
        if let Some(pattern) = expect {
            // The parse is only for evaluating the predicate; the deletion
            // itself stays in text space.
            let doc = parse_yaml_document(&content)?;
            let Some(current) = doc.get(*key) else {
                debug!(key, "key not present; delete skipped");
                continue;
            };
            if !matcher::matches(current, pattern) {
                info!(key, "current value does not match expected shape; delete skipped");
                continue;
            }
        }
        content = block::delete_key_block_all(&content, key).content;
    }
    Ok(content)
}

/// Apply structural operations to a parsed document. Navigation failures
/// are logged by the navigator and leave the document untouched; later
/// operations are still attempted.
fn apply_structural(doc: &mut Value, changes: &[ChangeAction]) {
    for change in changes {
        match change {
            ChangeAction::SetKey { path, value } => {
                let path = PathExpr::parse(path);
                if !path.is_empty() {
                    navigator::set_path(doc, &path, value.clone());
                }
            }
            ChangeAction::DeleteKey { path, expect } => {
                let path = PathExpr::parse(path);
                if !path.is_empty() {
                    navigator::delete_path(doc, &path, expect.as_ref());
                }
            }
            ChangeAction::Replace { .. } => {
                warn!("replace is not meaningful for structured documents; ignored");
            }
        }
    }
}

fn apply_env(original: &str, changes: &[ChangeAction]) -> String {
    let mut content = original.to_string();
    for change in changes {
        match change {
            ChangeAction::Replace {
                pattern,
                replacement,
            } => match Regex::new(pattern) {
                Ok(re) => content = re.replace_all(&content, replacement.as_str()).into_owned(),
                Err(err) => warn!(%err, "invalid replace pattern; operation skipped"),
            },
            ChangeAction::SetKey { path, value } => match scalar_to_string(value) {
                Some(rendered) => content = env::upsert_key(&content, path, &rendered),
                None => warn!(
                    key = path.as_str(),
                    "env values must be scalar; operation skipped"
                ),
            },
            ChangeAction::DeleteKey { .. } => {
                warn!("delete-key is not defined for env files; ignored");
            }
        }
    }
    content
}

/// An empty or `null` document reads as an empty mapping so writes against
/// a fresh file have somewhere to land.
fn parse_yaml_document(original: &str) -> Result<Value, serde_yaml::Error> {
    let doc: Value = serde_yaml::from_str(original)?;
    Ok(match doc {
        Value::Null => Value::Mapping(Mapping::new()),
        other => other,
    })
}

/// Canonical content signature of a document, used by the gate to decide
/// whether any operation actually changed it.
fn document_signature(doc: &Value) -> Result<u64, serde_yaml::Error> {
    Ok(xxh3_64(serde_yaml::to_string(doc)?.as_bytes()))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

/// Atomic file write: tempfile in the same directory, fsync, rename.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), std::io::Error> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path has no parent directory",
        )
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
