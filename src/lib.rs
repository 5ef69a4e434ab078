//! Fleet Patcher: bulk configuration patching for multi-repository rollouts
//!
//! A patch engine for applying the same configuration change (YAML, JSON,
//! `.env`, plain text) across many independently-owned repository working
//! copies, reporting exactly which files changed so a surrounding workflow
//! can commit, push, and open pull requests.
//!
//! # Architecture
//!
//! A ruleset ([`RuleSet`]) declares target files and ordered operations.
//! The engine ([`PatchEngine`]) routes each rule to one strategy:
//!
//! - regex substitution for text documents,
//! - structural navigation ([`navigator`]) over a parsed document for JSON
//!   and nested YAML paths,
//! - an indentation-aware text-block editor ([`block`]) for top-level YAML
//!   deletes, preserving comments, key order, and blank lines everywhere
//!   outside the deleted block,
//! - line-oriented key upserts for `.env` files.
//!
//! Conditional deletes are gated by the predicate matcher ([`matcher`]), so
//! a block is only removed while it still has the shape the rule author
//! expected.
//!
//! # Resilience
//!
//! A run across a working copy never aborts on a bad document: parse and
//! I/O failures degrade to per-file "failed, left untouched" outcomes,
//! navigation mismatches degrade to logged no-ops, and rule application is
//! idempotent, so re-running a ruleset over a patched tree reports no
//! changes.
//!
//! # Example
//!
//! ```no_run
//! use fleet_patcher::{load_from_path, PatchEngine};
//!
//! let ruleset = load_from_path("rules/jenkins-library.toml")?;
//! let engine = PatchEngine::new("/checkouts/service-a", ruleset)?;
//! let report = engine.run();
//! for file in report.modified_files() {
//!     println!("modified: {}", file.display());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod block;
pub mod engine;
pub mod env;
pub mod matcher;
pub mod navigator;
pub mod path;
pub mod rules;
pub mod safety;

// Re-exports
pub use engine::{FileOutcome, PatchEngine, RunReport, StrategyError};
pub use path::{PathExpr, PathStep};
pub use rules::{
    load_from_path, load_from_str, ChangeAction, ChangeRule, ConfigError, DocumentType, RuleSet,
};
pub use safety::{SafetyError, WorkspaceGuard};
