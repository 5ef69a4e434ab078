use serde::Deserialize;
use serde_yaml::Value;
use std::fmt;

/// A full ruleset: metadata plus an ordered list of change rules.
///
/// Rulesets are runtime configuration handed to the engine at construction,
/// never a compile-time table, so one binary can run arbitrary rulesets.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct RuleSet {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub rules: Vec<ChangeRule>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One target file plus the ordered operations applied to it. Later
/// operations see the results of earlier ones.
#[derive(Debug, Deserialize, Clone)]
pub struct ChangeRule {
    /// Path relative to the working-copy root, or a bare file name when
    /// `discover` is set.
    pub file: String,
    #[serde(rename = "type", default)]
    pub document_type: DocumentType,
    /// Apply the rule to every file in the working copy whose name equals
    /// `file`, instead of treating `file` as an exact relative path.
    #[serde(default)]
    pub discover: bool,
    #[serde(default)]
    pub changes: Vec<ChangeAction>,
}

/// Declared document type of a rule target. Unrecognized declarations fall
/// back to `Text`, which only ever applies regex replacements.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
    Json,
    #[serde(alias = "yml")]
    Yaml,
    Env,
    #[default]
    #[serde(other)]
    Text,
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentType::Text => "text",
            DocumentType::Json => "json",
            DocumentType::Yaml => "yaml",
            DocumentType::Env => "env",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ChangeAction {
    /// Regex substitution, text domain only.
    Replace { pattern: String, replacement: String },
    /// Set (creating if absent) the value at a dotted/bracketed path.
    SetKey { path: String, value: Value },
    /// Delete the value at a path; with `expect`, only when the current
    /// value matches the expected shape.
    DeleteKey {
        path: String,
        #[serde(default)]
        expect: Option<Value>,
    },
}

impl ChangeAction {
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeAction::Replace { .. } => "replace",
            ChangeAction::SetKey { .. } => "set-key",
            ChangeAction::DeleteKey { .. } => "delete-key",
        }
    }
}

impl RuleSet {
    /// Field-level validation, collecting every issue instead of stopping
    /// at the first. Mismatched action/type combinations are not rejected
    /// here; the dispatcher ignores them with a warning at apply time.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.rules.is_empty() {
            issues.push(ValidationIssue::EmptyRuleList);
        }

        for rule in &self.rules {
            if rule.file.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_file: None,
                    field: "file",
                });
            }

            for change in &rule.changes {
                match change {
                    ChangeAction::Replace { pattern, .. } => {
                        if pattern.trim().is_empty() {
                            issues.push(ValidationIssue::MissingField {
                                rule_file: Some(rule.file.clone()),
                                field: "changes.pattern",
                            });
                        } else if let Err(err) = regex::Regex::new(pattern) {
                            issues.push(ValidationIssue::InvalidPattern {
                                rule_file: rule.file.clone(),
                                message: err.to_string(),
                            });
                        }
                    }
                    ChangeAction::SetKey { path, .. } | ChangeAction::DeleteKey { path, .. } => {
                        if path.trim().is_empty() {
                            issues.push(ValidationIssue::MissingField {
                                rule_file: Some(rule.file.clone()),
                                field: "changes.path",
                            });
                        }
                    }
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyRuleList,
    MissingField {
        rule_file: Option<String>,
        field: &'static str,
    },
    InvalidPattern {
        rule_file: String,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyRuleList => write!(f, "ruleset contains no rules"),
            ValidationIssue::MissingField { rule_file, field } => match rule_file {
                Some(file) => write!(f, "rule for '{file}' missing required field '{field}'"),
                None => write!(f, "rule missing required field '{field}'"),
            },
            ValidationIssue::InvalidPattern { rule_file, message } => {
                write!(f, "rule for '{rule_file}' has an invalid pattern: {message}")
            }
        }
    }
}
