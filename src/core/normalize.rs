//! Code text canonicalization shared by the static scorer and the
//! heuristic judge.
//!
//! The pass is deliberately language-agnostic so that a Python source and a
//! Java-like target land in the same vocabulary:
//!   - `//` and `#` line comments and `/* ... */` blocks are dropped.
//!   - Numeric literals become `NUM`, identifiers become `ID`.
//!   - Keywords from [`KEYWORDS`] and [`WORD_OPERATORS`] survive verbatim.
//!   - Whitespace collapses to single spaces; the result is lowercased.
//!
//! The output is a fixed point: `normalize(normalize(x)) == normalize(x)`.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Cross-language control-flow and declaration keywords kept by the
/// normalizer. Matching is case-sensitive, so `If` is an identifier.
pub const KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "return", "break", "continue", "switch", "case", "try",
    "catch", "finally", "class", "def", "function", "public", "private", "static", "new",
    "import", "from", "package", "throws", "raise", "await", "async", "yield", "lambda",
];

/// Word-spelled boolean operators. They are kept so the operator overlap
/// signal can see `and`/`or` next to `&&`/`||`.
pub const WORD_OPERATORS: &[&str] = &["and", "or", "not"];

/// Placeholder emitted for every numeric literal.
pub const NUM_PLACEHOLDER: &str = "NUM";

/// Placeholder emitted for every non-keyword identifier.
pub const ID_PLACEHOLDER: &str = "ID";

static LINE_SLASH_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)//.*$").expect("static regex"));

static LINE_HASH_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)#.*$").expect("static regex"));

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("static regex"));

// One pass for both literal kinds keeps their boundaries independent of
// each other's replacements.
static LEXEME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<num>\b[0-9]+(?:\.[0-9]+)?\b)|(?P<ident>[A-Za-z_][A-Za-z_0-9]*)")
        .expect("static regex")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// True when `word` survives identifier canonicalization.
pub fn is_reserved(word: &str) -> bool
{
    KEYWORDS.contains(&word) || WORD_OPERATORS.contains(&word)
}

/// Canonicalize raw code text. Never fails; empty input gives empty output.
pub fn normalize(code: &str) -> String
{
    // Comments first, line forms before blocks
    let text = LINE_SLASH_COMMENT.replace_all(code, " ");
    let text = LINE_HASH_COMMENT.replace_all(&text, " ");
    let text = BLOCK_COMMENT.replace_all(&text, " ");

    let text = text.replace('\t', " ");

    let text = LEXEME.replace_all(&text, |caps: &Captures<'_>| canonical_lexeme(caps));

    let text = WHITESPACE.replace_all(&text, " ");

    // ASCII-only lowercasing: every ASCII word left at this point is a
    // keyword or placeholder, and full Unicode folding could mint new
    // ASCII identifiers on a second pass.
    text.trim()
        .to_ascii_lowercase()
}

fn canonical_lexeme(caps: &Captures<'_>) -> String
{
    if caps
        .name("num")
        .is_some()
    {
        return format!(" {NUM_PLACEHOLDER} ");
    }

    let word = caps
        .name("ident")
        .map(|m| m.as_str())
        .unwrap_or_default();

    if is_reserved(word)
    {
        word.to_string()
    }
    // A lowercased placeholder from an earlier pass stays a placeholder
    else if word.eq_ignore_ascii_case(NUM_PLACEHOLDER)
    {
        NUM_PLACEHOLDER.to_string()
    }
    else
    {
        ID_PLACEHOLDER.to_string()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn strips_all_comment_forms()
    {
        let code = "x = 1 # trailing\n// whole line\ny /* inline */ = 2\n/* multi\nline */z";
        assert_eq!(normalize(code), "id = num id = num id");
    }

    #[test]
    fn keeps_keywords_and_canonicalizes_the_rest()
    {
        let code = "def sum_to_n(n):\n\treturn n+1.5";
        assert_eq!(normalize(code), "def id(id): return id+ num");
    }

    #[test]
    fn keyword_matching_is_case_sensitive()
    {
        assert_eq!(normalize("If While"), "id id");
    }

    #[test]
    fn word_operators_survive()
    {
        assert_eq!(normalize("a and not b or c"), "id and not id or id");
    }

    #[test]
    fn digits_glued_to_letters_are_not_numbers()
    {
        assert_eq!(normalize("x1 = 2"), "id = num");
    }

    #[test]
    fn empty_and_blank_inputs_collapse_to_empty()
    {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \t\n  "), "");
    }

    #[test]
    fn output_is_a_fixed_point()
    {
        let once = normalize("int num = 3; // c\nString id = \"x\";");
        assert_eq!(normalize(&once), once);
        assert!(!once.contains('\t'));
        assert!(!once.contains("  "));
    }
}
