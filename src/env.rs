//! Line-oriented editing of `.env` style key=value files.

use regex::Regex;
use tracing::warn;

/// Update the first `KEY=...` line in place, or append `KEY=value` when the
/// key is absent. The key token is anchored at line start and matched
/// exactly, so `API_KEY` never rewrites `API_KEY_VERSION`.
///
/// Returns the new content; equal to the input when nothing changed.
pub fn upsert_key(content: &str, key: &str, value: &str) -> String {
    let pattern = format!(r"(?m)^{}[ \t]*=.*$", regex::escape(key));
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(err) => {
            warn!(key, %err, "failed to build key pattern; upsert skipped");
            return content.to_string();
        }
    };

    let replacement = format!("{key}={value}");
    if re.is_match(content) {
        // Only the first occurrence; duplicate keys after it are left alone.
        return re.replace(content, replacement.as_str()).into_owned();
    }

    let mut updated = content.to_string();
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(&replacement);
    updated.push('\n');
    updated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_existing_key_in_place() {
        let content = "API_KEY=old\nDEBUG=false\n";
        assert_eq!(upsert_key(content, "API_KEY", "new"), "API_KEY=new\nDEBUG=false\n");
    }

    #[test]
    fn appends_missing_key() {
        let content = "API_KEY=old\n";
        assert_eq!(
            upsert_key(content, "API_KEY_VERSION", "3"),
            "API_KEY=old\nAPI_KEY_VERSION=3\n"
        );
    }

    #[test]
    fn similar_key_is_not_a_prefix_match() {
        let content = "API_KEY_VERSION=2\n";
        assert_eq!(
            upsert_key(content, "API_KEY", "x"),
            "API_KEY_VERSION=2\nAPI_KEY=x\n"
        );
    }

    #[test]
    fn append_adds_newline_to_unterminated_file() {
        let content = "FOO=bar";
        assert_eq!(upsert_key(content, "BAZ", "1"), "FOO=bar\nBAZ=1\n");
    }

    #[test]
    fn tolerates_whitespace_before_equals() {
        let content = "API_KEY = old\n";
        assert_eq!(upsert_key(content, "API_KEY", "new"), "API_KEY=new\n");
    }

    #[test]
    fn idempotent_when_value_already_set() {
        let content = "API_KEY=new\n";
        assert_eq!(upsert_key(content, "API_KEY", "new"), content);
    }
}
