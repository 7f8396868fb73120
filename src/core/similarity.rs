//! Scalar similarity reductions over token sequences.
//!
//! All primitives are total: empty inputs produce defined values and no
//! function divides by zero or returns NaN for finite inputs.

use std::collections::HashSet;
use std::hash::Hash;

/// Additive guard in the F1 denominator.
pub const F1_EPSILON: f64 = 1e-9;

/// Overlapping windows of `n` consecutive tokens, in source order.
///
/// Returns an empty list when `n == 0` or when the sequence is shorter
/// than `n`.
pub fn ngrams<T>(
    tokens: &[T],
    n: usize,
) -> Vec<&[T]>
{
    if n == 0 || tokens.len() < n
    {
        return Vec::new();
    }
    tokens
        .windows(n)
        .collect()
}

/// Intersection over union of the sets built from `a` and `b`.
///
/// Two empty inputs are identical, so the result is 1.0.
pub fn jaccard<T: Hash + Eq>(
    a: &[T],
    b: &[T],
) -> f64
{
    let left: HashSet<&T> = a
        .iter()
        .collect();
    let right: HashSet<&T> = b
        .iter()
        .collect();

    if left.is_empty() && right.is_empty()
    {
        return 1.0;
    }

    let inter = left
        .intersection(&right)
        .count();
    let union = left
        .union(&right)
        .count();

    inter as f64 / union.max(1) as f64
}

/// Harmonic mean with an epsilon-guarded denominator.
pub fn f1(
    precision: f64,
    recall: f64,
) -> f64
{
    (2.0 * precision * recall) / (precision + recall + F1_EPSILON)
}

/// Precision, recall and F1 of one n-gram order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prf
{
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Set-based overlap where `hypothesis` is judged against `reference`.
///
/// Precision divides by the distinct hypothesis items, recall by the
/// distinct reference items; both denominators floor at 1.
pub fn precision_recall_f1<T: Hash + Eq>(
    reference: &[T],
    hypothesis: &[T],
) -> Prf
{
    let reference: HashSet<&T> = reference
        .iter()
        .collect();
    let hypothesis: HashSet<&T> = hypothesis
        .iter()
        .collect();

    let shared = reference
        .intersection(&hypothesis)
        .count() as f64;

    let precision = shared / hypothesis.len().max(1) as f64;
    let recall = shared / reference.len().max(1) as f64;

    Prf { precision, recall, f1: f1(precision, recall) }
}

/// Weight-normalized dot product of `values` and `weights`.
///
/// Pairs are taken positionally. When the weights sum to zero the plain
/// arithmetic mean of `values` is returned instead, or 0.0 for no values.
pub fn weighted_mean(
    values: &[f64],
    weights: &[f64],
) -> f64
{
    let total: f64 = weights
        .iter()
        .sum();

    if total == 0.0
    {
        if values.is_empty()
        {
            return 0.0;
        }
        return values
            .iter()
            .sum::<f64>()
            / values.len() as f64;
    }

    let dot: f64 = values
        .iter()
        .zip(weights)
        .map(|(v, w)| v * w)
        .sum();

    dot / total
}
