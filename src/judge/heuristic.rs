//! Offline stand-in for a semantic judge.
//!
//! Rewards agreement on control-flow keywords and arithmetic symbols and
//! penalizes targets much shorter or longer than the source. It is not a
//! substitute for a model or a human, but it is deterministic and needs
//! nothing installed, which makes it the default judge.

use tracing::debug;

use super::{Judge, JudgeError, JudgeResult};
use crate::core::normalize::normalize;
use crate::core::similarity::{jaccard, weighted_mean};
use crate::core::tokenize::tokenize;
use crate::infra::config::HeuristicConfig;

const CONTROL: &[&str] =
    &["if", "else", "for", "while", "return", "switch", "case", "try", "catch", "finally"];

const ARITHMETIC: &[&str] = &["+", "-", "*", "/", "%", "==", "!=", ">=", "<=", "<", ">"];

/// Keyword/operator/length heuristic judge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicJudge
{
    /// How forgiving the length-ratio penalty is
    pub length_tolerance: f64,
    pub ctrl_weight: f64,
    pub arith_weight: f64,
}

impl Default for HeuristicJudge
{
    fn default() -> Self
    {
        Self { length_tolerance: 0.5, ctrl_weight: 0.6, arith_weight: 0.4 }
    }
}

impl From<&HeuristicConfig> for HeuristicJudge
{
    fn from(cfg: &HeuristicConfig) -> Self
    {
        Self {
            length_tolerance: cfg.length_tolerance,
            ctrl_weight: cfg.ctrl_weight,
            arith_weight: cfg.arith_weight,
        }
    }
}

fn restricted<'a>(
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

impl HeuristicJudge
{
    /// Deterministic judgment; infallible in practice.
    pub fn evaluate(
        &self,
        src: &str,
        trg: &str,
    ) -> JudgeResult
    {
        let s = tokenize(&normalize(src));
        let t = tokenize(&normalize(trg));

        let ctrl = jaccard(&restricted(&s, CONTROL), &restricted(&t, CONTROL));
        let arith = jaccard(&restricted(&s, ARITHMETIC), &restricted(&t, ARITHMETIC));
        let base = weighted_mean(&[ctrl, arith], &[self.ctrl_weight, self.arith_weight]);

        let ratio = t.len() as f64 / s.len().max(1) as f64;
        let penalty = (1.0 - (ratio - 1.0).abs() / (1.0 + self.length_tolerance)).clamp(0.0, 1.0);

        let j = (0.2 + 0.8 * ((base + penalty) / 2.0)).clamp(0.0, 1.0);

        debug!(ctrl, arith, penalty, j, "heuristic judgment");

        JudgeResult::new(j)
            .with_explanation(format!(
                "ctrl={ctrl:.2}, arith={arith:.2}, len_penalty={penalty:.2}"
            ))
            .with_criterion("ctrl", ctrl)
            .with_criterion("arith", arith)
            .with_criterion("length_penalty", penalty)
    }
}

impl Judge for HeuristicJudge
{
    fn name(&self) -> &str
    {
        "heuristic"
    }

    fn judge(
        &self,
        src: &str,
        trg: &str,
    ) -> Result<JudgeResult, JudgeError>
    {
        Ok(self.evaluate(src, trg))
    }
}
