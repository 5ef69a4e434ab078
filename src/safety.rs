use std::path::{Path, PathBuf};
use thiserror::Error;

/// Safety checks to prevent a ruleset from editing files outside the
/// working copy it was pointed at.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    /// Absolute path to the working-copy root
    root: PathBuf,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("path is outside the working copy: {path} (root: {root})")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("refusing to edit version-control internals: {path}")]
    VersionControlPath { path: PathBuf },

    #[error("failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl WorkspaceGuard {
    /// Create a guard for the given working-copy root.
    ///
    /// The root is canonicalized so symlinked checkouts are handled
    /// correctly.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let root = root.as_ref().canonicalize()?;
        Ok(Self { root })
    }

    /// Check that a path is safe to edit.
    ///
    /// Relative paths resolve against the working-copy root. Returns the
    /// canonicalized absolute path if it stays inside the root and does not
    /// enter `.git`. Canonicalization fails for files that do not exist;
    /// callers check existence first (a missing target is a skip, not an
    /// error).
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        // Canonicalize to resolve symlinks and .. components
        let canonical = absolute.canonicalize()?;

        if !canonical.starts_with(&self.root) {
            return Err(SafetyError::OutsideRoot {
                path: canonical,
                root: self.root.clone(),
            });
        }

        let relative = canonical.strip_prefix(&self.root).unwrap_or(&canonical);
        if relative.components().any(|c| c.as_os_str() == ".git") {
            return Err(SafetyError::VersionControlPath { path: canonical });
        }

        Ok(canonical)
    }

    /// Get the working-copy root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
