//! ANSI escape helpers for colored terminal output.

use oc_core::text::{segments, Segment};

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const CYAN: &str = "\x1b[36m";
pub const GREEN: &str = "\x1b[92m";
pub const YELLOW: &str = "\x1b[93m";
pub const RED: &str = "\x1b[31m";
pub const GRAY: &str = "\x1b[90m";

pub fn paint(text: &str, color: &str) -> String {
    format!("{}{}{}", color, text, RESET)
}

/// Reasoning blocks in gray, the answer in yellow.
pub fn render_response(response: &str) -> String {
    segments(response)
        .into_iter()
        .map(|segment| match segment {
            Segment::Thinking(text) => paint(text, GRAY),
            Segment::Answer(text) => paint(text, YELLOW),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_response_colors_reasoning() {
        let rendered = render_response("<think>hm</think>Paris");
        assert_eq!(
            rendered,
            format!("{}<think>hm</think>{}{}Paris{}", GRAY, RESET, YELLOW, RESET)
        );
    }
}
