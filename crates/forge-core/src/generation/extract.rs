//! Fenced code extraction from model replies.

use crate::session::GeneratedCode;
use once_cell::sync::Lazy;
use regex::Regex;

static MARKUP_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:jsx|tsx|javascript|js)[ \t]*\r?\n(.*?)\r?\n[ \t]*```")
        .expect("MARKUP_BLOCK must be a valid regex")
});

static STYLE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```css[ \t]*\r?\n(.*?)\r?\n[ \t]*```")
        .expect("STYLE_BLOCK must be a valid regex")
});

fn first_block(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extracts the first JSX block and the first CSS block of a model reply.
///
/// Returns `None` when the reply contains neither, so that a plain text
/// answer does not wipe the code currently in the editor.
pub fn extract_generated_code(text: &str) -> Option<GeneratedCode> {
    let markup = first_block(&MARKUP_BLOCK, text);
    let style = first_block(&STYLE_BLOCK, text);
    if markup.is_none() && style.is_none() {
        return None;
    }
    Some(GeneratedCode {
        markup: markup.unwrap_or_default(),
        style: style.unwrap_or_default(),
    })
}
