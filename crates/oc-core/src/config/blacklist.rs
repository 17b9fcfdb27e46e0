//! Blacklist value parsing.

use serde_json::Value;

/// Parse the `[blacklist] models` value.
///
/// Accepts a JSON array, a comma-separated list, or one name per line.
/// Surrounding quotes on list items are dropped and empty items skipped.
pub fn parse_blacklist(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw) {
        return items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null | Value::Bool(false) => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect();
    }

    let separator = if raw.contains(',') { ',' } else { '\n' };
    raw.split(separator)
        .map(|item| item.trim().trim_matches(|c: char| c == '"' || c == '\'').to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Drop blacklisted names, keeping the original order.
pub fn filter_blacklisted<T, F>(items: Vec<T>, blacklist: &[String], name: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    if blacklist.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| !blacklist.iter().any(|b| b == name(item)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ab() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[test]
    fn test_three_formats_are_equivalent() {
        assert_eq!(parse_blacklist(r#"["a","b"]"#), ab());
        assert_eq!(parse_blacklist("a, b"), ab());
        assert_eq!(parse_blacklist("a\nb"), ab());
    }

    #[test]
    fn test_quotes_and_blanks() {
        assert_eq!(parse_blacklist(r#""a", 'b', "#), ab());
        assert_eq!(parse_blacklist("\n  a\n\n  b\n"), ab());
        assert!(parse_blacklist("   ").is_empty());
        assert!(parse_blacklist("[]").is_empty());
    }

    #[test]
    fn test_single_name() {
        assert_eq!(parse_blacklist("llama2:70b"), vec!["llama2:70b".to_string()]);
    }

    #[test]
    fn test_filter_keeps_order() {
        let names = vec!["c".to_string(), "a".to_string(), "d".to_string()];
        let kept = filter_blacklisted(names, &ab(), |s| s.as_str());
        assert_eq!(kept, vec!["c".to_string(), "d".to_string()]);
    }
}
