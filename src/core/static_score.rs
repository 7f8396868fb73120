//! Static structural score S.
//!
//! Pipeline per side: normalize -> tokenize. Then four overlap signals are
//! reduced with fixed weights:
//!
//! | signal       | weight | what it sees                         |
//! |--------------|--------|--------------------------------------|
//! | `bi_f1`      | 0.45   | local token order                    |
//! | `uni_f1`     | 0.25   | token vocabulary                     |
//! | `op_jaccard` | 0.15   | arithmetic/comparison/boolean ops    |
//! | `kw_jaccard` | 0.15   | control-flow and declaration words   |
//!
//! The target is the hypothesis: precision divides by target n-grams,
//! recall by source n-grams. An optional syntax-tree shape term joins the
//! mean with its own weight and the weights are renormalized.

use std::sync::Arc;

use indexmap::IndexMap;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::normalize::{KEYWORDS, normalize};
use crate::core::similarity::{jaccard, ngrams, precision_recall_f1, weighted_mean};
use crate::core::structure::{SourceLang, ast_shape};
use crate::core::tokenize::tokenize;

/// Operator vocabulary for `op_jaccard`.
pub const OPERATORS: &[&str] = &[
    "+", "-", "*", "/", "%", "==", "!=", ">=", "<=", "<", ">", "and", "or", "&&", "||",
];

/// Weights for `[bi_f1, uni_f1, op_jaccard, kw_jaccard]`.
pub const BASE_WEIGHTS: [f64; 4] = [0.45, 0.25, 0.15, 0.15];

/// Key of the aggregate inside a [`ScoreBreakdown`].
pub const AGGREGATE_KEY: &str = "S";

/// Named sub-scores of one static comparison, aggregate first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreBreakdown(IndexMap<String, f64>);

impl ScoreBreakdown
{
    fn with_aggregate(s: f64) -> Self
    {
        let mut map = IndexMap::new();
        map.insert(AGGREGATE_KEY.to_string(), s);
        Self(map)
    }

    fn insert(
        &mut self,
        key: &str,
        value: f64,
    )
    {
        self.0
            .insert(key.to_string(), value);
    }

    /// The aggregate S.
    pub fn s(&self) -> f64
    {
        self.get(AGGREGATE_KEY)
            .unwrap_or_default()
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<f64>
    {
        self.0
            .get(key)
            .copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)>
    {
        self.0
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
    }
}

/// Optional syntax-tree shape term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructureSignal
{
    pub src_lang: SourceLang,
    pub trg_lang: SourceLang,
    pub weight: f64,
}

/// Reusable static scorer. Holds no mutable state beyond an optional
/// token-stream memo keyed by raw text.
#[derive(Clone, Default)]
pub struct StaticScorer
{
    structure: Option<StructureSignal>,
    cache: Option<Cache<String, Arc<Vec<String>>>>,
}

impl StaticScorer
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Add the shape term to every comparison.
    pub fn with_structure(
        mut self,
        signal: StructureSignal,
    ) -> Self
    {
        self.structure = Some(signal);
        self
    }

    /// Memoize up to `capacity` token streams.
    pub fn with_cache(
        mut self,
        capacity: u64,
    ) -> Self
    {
        self.cache = Some(Cache::new(capacity));
        self
    }

    pub fn structure(&self) -> Option<StructureSignal>
    {
        self.structure
    }

    /// Compare `src` (reference) with `trg` (hypothesis). Never fails.
    #[instrument(level = "debug", skip_all, fields(src_len = src.len(), trg_len = trg.len()))]
    pub fn score(
        &self,
        src: &str,
        trg: &str,
    ) -> ScoreBreakdown
    {
        let src_tokens: &[String] = &self.tokens(src);
        let trg_tokens: &[String] = &self.tokens(trg);

        let uni = precision_recall_f1(&ngrams(src_tokens, 1), &ngrams(trg_tokens, 1));
        let bi = precision_recall_f1(&ngrams(src_tokens, 2), &ngrams(trg_tokens, 2));
        let op_jaccard = vocabulary_overlap(src_tokens, trg_tokens, OPERATORS);
        let kw_jaccard = vocabulary_overlap(src_tokens, trg_tokens, KEYWORDS);

        let mut values = vec![bi.f1, uni.f1, op_jaccard, kw_jaccard];
        let mut weights = BASE_WEIGHTS.to_vec();

        let shape = self
            .structure
            .and_then(|sig| {
                ast_shape(src, sig.src_lang, trg, sig.trg_lang).map(|v| (v, sig.weight))
            });
        if let Some((value, weight)) = shape
        {
            values.push(value);
            weights.push(weight);
        }

        let s = weighted_mean(&values, &weights);

        debug!(
            s,
            uni_f1 = uni.f1,
            bi_f1 = bi.f1,
            op_jaccard,
            kw_jaccard,
            ast_shape = shape.map(|(v, _)| v),
            "static score"
        );

        let mut out = ScoreBreakdown::with_aggregate(s);
        out.insert("uni_f1", uni.f1);
        out.insert("bi_f1", bi.f1);
        out.insert("op_jaccard", op_jaccard);
        out.insert("kw_jaccard", kw_jaccard);
        out.insert("uni_p", uni.precision);
        out.insert("uni_r", uni.recall);
        out.insert("bi_p", bi.precision);
        out.insert("bi_r", bi.recall);
        if let Some((value, _)) = shape
        {
            out.insert("ast_shape", value);
        }
        out
    }

    fn tokens(
        &self,
        code: &str,
    ) -> Arc<Vec<String>>
    {
        match &self.cache
        {
            Some(cache) => cache.get_with(code.to_string(), || Arc::new(tokenize(&normalize(code)))),
            None => Arc::new(tokenize(&normalize(code))),
        }
    }
}

/// Jaccard overlap restricted to tokens inside `vocabulary`.
fn vocabulary_overlap(
    src: &[String],
    trg: &[String],
    vocabulary: &[&str],
) -> f64
{
    fn pick<'a>(
        tokens: &'a [String],
        vocabulary: &[&str],
    ) -> Vec<&'a str>
    {
        tokens
            .iter()
            .map(String::as_str)
            .filter(|t| vocabulary.contains(t))
            .collect()
    }
    jaccard(&pick(src, vocabulary), &pick(trg, vocabulary))
}

/// One-shot static comparison with the baseline four signals.
pub fn static_score(
    src: &str,
    trg: &str,
) -> ScoreBreakdown
{
    StaticScorer::new().score(src, trg)
}
