//! Syntax-tree shape signal.
//!
//! Both sides are parsed with their Tree-sitter grammar and every named node
//! is mapped to a grammar-independent category (`loop`, `branch`, `call`,
//! ...). The shape score is the n-gram overlap of the two category
//! sequences, so a Python `for_statement` and a C++ `for_range_loop` land on
//! the same symbol.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::similarity::{ngrams, precision_recall_f1, weighted_mean};

/// Languages with a bundled grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceLang
{
    Python,
    Rust,
    Javascript,
    Typescript,
    Go,
    Cpp,
}

impl SourceLang
{
    /// Tree-sitter language handle for this grammar.
    pub fn language(self) -> tree_sitter::Language
    {
        match self
        {
            SourceLang::Python => tree_sitter_python::LANGUAGE.into(),
            SourceLang::Rust => tree_sitter_rust::LANGUAGE.into(),
            SourceLang::Javascript => tree_sitter_javascript::LANGUAGE.into(),
            SourceLang::Typescript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            SourceLang::Go => tree_sitter_go::LANGUAGE.into(),
            SourceLang::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }

    pub fn as_str(self) -> &'static str
    {
        match self
        {
            SourceLang::Python => "python",
            SourceLang::Rust => "rust",
            SourceLang::Javascript => "javascript",
            SourceLang::Typescript => "typescript",
            SourceLang::Go => "go",
            SourceLang::Cpp => "cpp",
        }
    }
}

/// Map a grammar node kind to its shared category.
fn category(kind: &str) -> Option<&'static str>
{
    let cat = match kind
    {
        "function_definition" | "function_item" | "function_declaration" | "method_declaration"
        | "method_definition" | "arrow_function" | "function_expression" | "lambda"
        | "lambda_expression" | "closure_expression" | "func_literal" => "func",

        "for_statement" | "while_statement" | "for_in_statement" | "do_statement"
        | "for_range_loop" | "for_expression" | "while_expression" | "loop_expression" => "loop",

        "if_statement" | "elif_clause" | "if_expression" | "conditional_expression"
        | "ternary_expression" | "match_expression" | "match_statement" | "switch_statement"
        | "expression_switch_statement" => "branch",

        "else_clause" => "else",

        "return_statement" | "return_expression" => "return",

        "call" | "call_expression" => "call",

        "assignment" | "augmented_assignment" | "assignment_expression"
        | "augmented_assignment_expression" | "compound_assignment_expr" | "let_declaration"
        | "init_declarator" | "variable_declarator" | "short_var_declaration"
        | "assignment_statement" => "assign",

        "binary_operator" | "binary_expression" | "boolean_operator" | "comparison_operator" => {
            "binop"
        }

        "unary_operator" | "unary_expression" | "not_operator" | "update_expression"
        | "inc_statement" | "dec_statement" => "unop",

        "try_statement" | "except_clause" | "catch_clause" => "try",

        "class_definition" | "class_declaration" | "class_specifier" | "struct_specifier"
        | "struct_item" | "impl_item" | "type_declaration" => "type",

        "import_statement" | "import_from_statement" | "import_declaration"
        | "use_declaration" | "preproc_include" => "import",

        _ => return None,
    };
    Some(cat)
}

/// Pre-order category sequence of `code`, or `None` if the grammar cannot
/// be loaded or the parser yields no tree.
pub fn shape_sequence(
    code: &str,
    lang: SourceLang,
) -> Option<Vec<&'static str>>
{
    let mut parser = tree_sitter::Parser::new();
    if parser
        .set_language(&lang.language())
        .is_err()
    {
        return None;
    }

    let tree = parser.parse(code, None)?;
    let mut cursor = tree.walk();
    let mut out = Vec::new();

    loop
    {
        let node = cursor.node();
        if node.is_named()
        {
            if let Some(cat) = category(node.kind())
            {
                out.push(cat);
            }
        }

        if cursor.goto_first_child()
        {
            continue;
        }

        // Climb until a sibling exists; leaving the root ends the walk
        loop
        {
            if cursor.goto_next_sibling()
            {
                break;
            }
            if !cursor.goto_parent()
            {
                return Some(out);
            }
        }
    }
}

/// Shape similarity between a source in `src_lang` and a target in
/// `trg_lang`, in [0, 1]. Two shapeless snippets score 1.0.
pub fn ast_shape(
    src: &str,
    src_lang: SourceLang,
    trg: &str,
    trg_lang: SourceLang,
) -> Option<f64>
{
    let src_shape = shape_sequence(src, src_lang)?;
    let trg_shape = shape_sequence(trg, trg_lang)?;

    debug!(
        src_lang = src_lang.as_str(),
        trg_lang = trg_lang.as_str(),
        src_nodes = src_shape.len(),
        trg_nodes = trg_shape.len(),
        "shape sequences"
    );

    if src_shape.is_empty() && trg_shape.is_empty()
    {
        return Some(1.0);
    }

    let uni = precision_recall_f1(&src_shape, &trg_shape).f1;
    let bi = precision_recall_f1(&ngrams(&src_shape, 2), &ngrams(&trg_shape, 2)).f1;

    Some(weighted_mean(&[bi, uni], &[0.6, 0.4]))
}

#[cfg(test)]
mod tests
{
    use super::*;

    const PY_SUM: &str = "def sum_to_n(n):\n    s = 0\n    for i in range(1, n + 1):\n        s += i\n    return s\n";

    #[test]
    fn python_shape_has_loop_and_return()
    {
        let shape = shape_sequence(PY_SUM, SourceLang::Python).expect("python parses");
        assert_eq!(shape.first(), Some(&"func"));
        assert!(shape.contains(&"loop"));
        assert!(shape.contains(&"assign"));
        assert_eq!(shape.last(), Some(&"return"));
    }

    #[test]
    fn identical_code_has_full_shape_overlap()
    {
        let score = ast_shape(PY_SUM, SourceLang::Python, PY_SUM, SourceLang::Python)
            .expect("both sides parse");
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cross_language_loop_shares_structure()
    {
        let cpp = "int sum_to_n(int n) {\n  int s = 0;\n  for (int i = 1; i <= n; i++) {\n    s += i;\n  }\n  return s;\n}\n";
        let score = ast_shape(PY_SUM, SourceLang::Python, cpp, SourceLang::Cpp)
            .expect("both sides parse");
        assert!(score > 0.3, "shape score too low: {score}");
    }

    #[test]
    fn empty_sources_are_shapeless_and_equal()
    {
        assert_eq!(ast_shape("", SourceLang::Python, "", SourceLang::Go), Some(1.0));
    }

    #[test]
    fn identifiers_are_not_categorized()
    {
        assert_eq!(category("identifier"), None);
        assert_eq!(category("for_range_loop"), Some("loop"));
    }
}
