//! Indentation-aware deletion of YAML mapping blocks on raw text.
//!
//! Deleting a key through a parse/re-serialize cycle loses comments, key
//! order, and blank-line placement for the whole file. This editor instead
//! removes the key's block directly from the original lines, so every line
//! outside the block survives byte-for-byte.
//!
//! A block is the matched `key:` line plus, when the key has no inline
//! value, every following line that is blank, indented deeper than the key,
//! or a list item at the key's own indentation (YAML's block-sequence
//! convention). The first line at or above the key's indentation that is
//! not a list item ends the block, so a sibling key is never consumed.

/// Outcome of one deletion pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDeletion {
    /// The resulting text. Untouched lines are byte-identical to the input,
    /// and the input's trailing-newline convention is preserved.
    pub content: String,
    /// Whether at least one block was removed.
    pub removed: bool,
}

/// Remove every block for `key` found in a single pass over `content`.
///
/// Callers that must be certain no occurrence remains (repeated keys in
/// malformed documents) use [`delete_key_block_all`], which re-runs the
/// pass until it reports no match.
///
/// If no line matches the key, the input is returned unchanged with
/// `removed == false`; that is a normal outcome, not an error.
pub fn delete_key_block(content: &str, key: &str) -> BlockDeletion {
    let had_trailing_newline = content.ends_with('\n');
    let mut lines: Vec<&str> = content.split('\n').collect();
    if had_trailing_newline {
        lines.pop();
    }

    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut removed = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let Some(block_indent) = match_key_line(line, key) else {
            kept.push(line);
            i += 1;
            continue;
        };

        removed = true;
        i += 1;

        // An inline value means the block is exactly the matched line.
        if has_inline_value(line, key) {
            continue;
        }

        while i < lines.len() {
            let next = lines[i];
            if next.trim().is_empty() {
                i += 1;
                continue;
            }
            let indent = indent_width(next);
            if indent > block_indent {
                i += 1;
                continue;
            }
            if indent == block_indent && next.trim_start().starts_with('-') {
                i += 1;
                continue;
            }
            break;
        }
    }

    let mut result = kept.join("\n");
    if had_trailing_newline && !result.is_empty() {
        result.push('\n');
    }

    BlockDeletion {
        content: result,
        removed,
    }
}

/// Run [`delete_key_block`] until it reports no further match.
pub fn delete_key_block_all(content: &str, key: &str) -> BlockDeletion {
    let mut current = content.to_string();
    let mut any_removed = false;
    loop {
        let pass = delete_key_block(&current, key);
        current = pass.content;
        if !pass.removed {
            break;
        }
        any_removed = true;
    }
    BlockDeletion {
        content: current,
        removed: any_removed,
    }
}

/// Match `<indent><key>:<...>` with an exact key token. Returns the
/// indentation width of the matched line.
fn match_key_line(line: &str, key: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let rest = trimmed.strip_prefix(key)?;
    let after_colon = rest.strip_prefix(':')?;
    // The colon must end the line or be followed by whitespace, so that
    // `tolerations` never matches `tolerationsExtra:`.
    if !(after_colon.is_empty() || after_colon.starts_with([' ', '\t', '\r'])) {
        return None;
    }
    Some(indent_width(line))
}

fn has_inline_value(line: &str, key: &str) -> bool {
    let trimmed = line.trim_start();
    let after_colon = &trimmed[key.len() + 1..];
    let value = after_colon.trim();
    !value.is_empty() && !value.starts_with('#')
}

fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start().len()
}
