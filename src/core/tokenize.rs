//! Lexeme splitter for normalized code text.

use std::sync::LazyLock;

use regex::Regex;

// Compound operators are listed before the single-character class so the
// leftmost-first alternation keeps them whole.
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z_]+|[0-9]+|==|!=|<=|>=|->|&&|\|\||[-+*/%=(){}\[\],.;:<>]")
        .expect("static regex")
});

/// Split normalized text into an ordered token sequence.
///
/// Characters outside the recognized lexeme set (quotes, `@`, a lone `!`,
/// non-ASCII text) carry no token. Empty input yields an empty sequence.
pub fn tokenize(normalized: &str) -> Vec<String>
{
    TOKEN
        .find_iter(normalized)
        .map(|m| m.as_str())
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string)
        .collect()
}
