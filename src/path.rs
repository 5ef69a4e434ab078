use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use tracing::warn;

/// One step of a resolved path: a mapping key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Key(key) => write!(f, "{key}"),
            PathStep::Index(idx) => write!(f, "[{idx}]"),
        }
    }
}

/// A parsed dotted/bracketed path such as `jobs.build.steps[0].uses`.
///
/// Parsing never fails: an empty or all-separator input produces an empty
/// path, which callers must treat as a no-op for the operation that carried
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PathExpr {
    steps: Vec<PathStep>,
}

fn index_regex() -> &'static Regex {
    static INDEX: OnceLock<Regex> = OnceLock::new();
    INDEX.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("index pattern is valid"))
}

impl PathExpr {
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    /// Parse a path string by alternating dotted segments with `[N]` index
    /// captures. Empty segments (leading/trailing/double dots) are discarded.
    pub fn parse(input: &str) -> Self {
        if input.trim().is_empty() {
            warn!("empty path expression; operation will be a no-op");
            return Self::default();
        }

        let re = index_regex();
        let mut steps = Vec::new();
        let mut cursor = 0;

        for caps in re.captures_iter(input) {
            let whole = caps.get(0).expect("capture 0 always present");
            push_dotted(&mut steps, &input[cursor..whole.start()]);
            // \d+ guarantees a digit string; it can still overflow usize.
            match caps[1].parse::<usize>() {
                Ok(idx) => steps.push(PathStep::Index(idx)),
                Err(_) => {
                    warn!(index = &caps[1], "sequence index out of range; path truncated");
                    return Self { steps };
                }
            }
            cursor = whole.end();
        }
        push_dotted(&mut steps, &input[cursor..]);

        Self { steps }
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The key name if this path is a single top-level mapping key with no
    /// nesting and no indices, the shape the YAML text-block strategy
    /// handles.
    pub fn as_top_level_key(&self) -> Option<&str> {
        match self.steps.as_slice() {
            [PathStep::Key(key)] => Some(key),
            _ => None,
        }
    }
}

fn push_dotted(steps: &mut Vec<PathStep>, segment: &str) {
    for part in segment.split('.') {
        if !part.is_empty() {
            steps.push(PathStep::Key(part.to_string()));
        }
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                PathStep::Key(key) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{key}")?;
                }
                PathStep::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}
