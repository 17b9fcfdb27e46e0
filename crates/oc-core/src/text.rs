//! Response text: reasoning blocks, cleaning and segmenting for display.

use std::sync::OnceLock;

use regex::Regex;

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid response pattern"))
}

/// A complete `<think>` / `<thinking>` block; group 1 is the body.
fn think_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?is)<think[^>]*>(.*?)</think[^>]*>")
}

fn unclosed_think() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?is)<think[^>]*>.*")
}

fn stray_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)</?think[^>]*>")
}

fn triple_blank() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\n\s*\n\s*\n")
}

fn blank_lines() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\n\s*\n+")
}

/// Reasoning text from all think blocks, joined by blank lines.
pub fn extract_thinking(response: &str) -> Option<String> {
    let parts: Vec<&str> = think_block()
        .captures_iter(response)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// The answer with think blocks removed.
pub fn strip_thinking(response: &str) -> String {
    let stripped = think_block().replace_all(response, "");
    triple_blank()
        .replace_all(&stripped, "\n\n")
        .trim()
        .to_string()
}

/// Aggressive cleaning for stored benchmark answers: also drops unclosed
/// think tags, stray tags and blank lines.
pub fn clean_benchmark_answer(response: &str) -> String {
    let cleaned = think_block().replace_all(response, "");
    let cleaned = unclosed_think().replace_all(&cleaned, "");
    let cleaned = stray_tag().replace_all(&cleaned, "");
    let cleaned = blank_lines().replace_all(cleaned.trim(), "\n");
    cleaned
        .lines()
        .map(str::trim)
        .collect::<Vec<&str>>()
        .join("\n")
        .trim()
        .to_string()
}

/// A piece of a response for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// A whole think block, tags included.
    Thinking(&'a str),
    Answer(&'a str),
}

/// Split a response into reasoning blocks and answer text, in order.
pub fn segments(response: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut last = 0;
    for m in think_block().find_iter(response) {
        if m.start() > last {
            out.push(Segment::Answer(&response[last..m.start()]));
        }
        out.push(Segment::Thinking(m.as_str()));
        last = m.end();
    }
    if last < response.len() {
        out.push(Segment::Answer(&response[last..]));
    }
    out
}

/// Truncate to `max` characters, appending `...` when cut.
pub fn preview(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = "<think>\nFirst, recall Paris.\n</think>\n\n\n\nThe capital is Paris.";

    #[test]
    fn test_extract_and_strip() {
        assert_eq!(extract_thinking(RESPONSE).as_deref(), Some("First, recall Paris."));
        assert_eq!(strip_thinking(RESPONSE), "The capital is Paris.");
        assert_eq!(extract_thinking("no reasoning here"), None);
        assert_eq!(extract_thinking("<think>   </think>answer"), None);
    }

    #[test]
    fn test_multiple_and_thinking_tags() {
        let response = "<THINKING>a</THINKING>x<think>b</think>y";
        assert_eq!(extract_thinking(response).as_deref(), Some("a\n\nb"));
        assert_eq!(strip_thinking(response), "xy");
    }

    #[test]
    fn test_benchmark_cleaner() {
        assert_eq!(clean_benchmark_answer(RESPONSE), "The capital is Paris.");
        assert_eq!(
            clean_benchmark_answer("Answer: 56\n\n  \nDone <think>still going"),
            "Answer: 56\nDone"
        );
        assert_eq!(clean_benchmark_answer("stray </think> tag"), "stray  tag");
        assert_eq!(clean_benchmark_answer(""), "");
    }

    #[test]
    fn test_segments_cover_response() {
        let parts = segments("pre<think>r</think>post");
        assert_eq!(
            parts,
            vec![
                Segment::Answer("pre"),
                Segment::Thinking("<think>r</think>"),
                Segment::Answer("post"),
            ]
        );
        assert!(segments("").is_empty());
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
    }
}
