//! IMM aggregation: `IMM = alpha * S + (1 - alpha) * J`.

use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::core::static_score::{AGGREGATE_KEY, ScoreBreakdown, StaticScorer};
use crate::infra::config::Config;
use crate::judge::{HeuristicJudge, Judge, JudgeError, JudgeResult, build_judge};

/// Alpha used when none is configured.
pub const DEFAULT_ALPHA: f64 = 0.55;

/// Weight on the static signal, always inside [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Alpha(f64);

impl Alpha
{
    /// Out-of-range values are clamped and NaN falls back to
    /// [`DEFAULT_ALPHA`]; both log a warning.
    pub fn new(value: f64) -> Self
    {
        if value.is_nan()
        {
            warn!(alpha = value, fallback = DEFAULT_ALPHA, "alpha is not a number, using default");
            return Self(DEFAULT_ALPHA);
        }

        let clamped = value.clamp(0.0, 1.0);
        if clamped != value
        {
            warn!(alpha = value, clamped, "alpha outside [0, 1], clamping");
        }
        Self(clamped)
    }

    pub fn get(self) -> f64
    {
        self.0
    }
}

impl Default for Alpha
{
    fn default() -> Self
    {
        Self(DEFAULT_ALPHA)
    }
}

impl From<f64> for Alpha
{
    fn from(value: f64) -> Self
    {
        Self::new(value)
    }
}

impl From<Alpha> for f64
{
    fn from(alpha: Alpha) -> Self
    {
        alpha.0
    }
}

/// Convex blend of a static and a judge score.
pub fn blend(
    s: f64,
    j: f64,
    alpha: Alpha,
) -> f64
{
    let a = alpha.get();
    a * s + (1.0 - a) * j
}

/// Composite result of one scoring call.
///
/// Breakdown keys are prefixed (`S_uni_f1`, `J_risk`) so both maps can be
/// flattened into one record without collisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImmResult
{
    #[serde(rename = "IMM")]
    pub imm: f64,
    #[serde(rename = "S")]
    pub s: f64,
    #[serde(rename = "J")]
    pub j: f64,
    pub alpha: f64,
    #[serde(rename = "S_breakdown")]
    pub s_breakdown: IndexMap<String, f64>,
    #[serde(rename = "J_breakdown", default, skip_serializing_if = "IndexMap::is_empty")]
    pub j_breakdown: IndexMap<String, f64>,
    #[serde(rename = "J_explanation", default, skip_serializing_if = "Option::is_none")]
    pub j_explanation: Option<String>,
}

/// Prefix every sub-score except the aggregate itself.
pub(crate) fn prefixed_static(breakdown: &ScoreBreakdown) -> IndexMap<String, f64>
{
    breakdown
        .iter()
        .filter(|(k, _)| *k != AGGREGATE_KEY)
        .map(|(k, v)| (format!("S_{k}"), v))
        .collect()
}

/// Combine a static breakdown and a judgment. Pure.
pub fn combine(
    breakdown: &ScoreBreakdown,
    judgment: &JudgeResult,
    alpha: Alpha,
) -> ImmResult
{
    let s = breakdown.s();
    let j = judgment.score;

    ImmResult {
        imm: blend(s, j, alpha),
        s,
        j,
        alpha: alpha.get(),
        s_breakdown: prefixed_static(breakdown),
        j_breakdown: judgment
            .breakdown
            .iter()
            .map(|(k, v)| (format!("J_{k}"), *v))
            .collect(),
        j_explanation: judgment
            .explanation
            .clone(),
    }
}

/// The metric: a static scorer, an injected judge and alpha.
pub struct ImmMetric
{
    alpha: Alpha,
    judge: Box<dyn Judge>,
    scorer: StaticScorer,
}

impl Default for ImmMetric
{
    fn default() -> Self
    {
        Self::new(Alpha::default(), Box::new(HeuristicJudge::default()))
    }
}

impl ImmMetric
{
    pub fn new(
        alpha: Alpha,
        judge: Box<dyn Judge>,
    ) -> Self
    {
        Self { alpha, judge, scorer: StaticScorer::new() }
    }

    pub fn with_scorer(
        mut self,
        scorer: StaticScorer,
    ) -> Self
    {
        self.scorer = scorer;
        self
    }

    /// Judge, scorer and alpha as configured.
    pub fn from_config(config: &Config) -> Result<Self>
    {
        let judge = build_judge(config)?;
        Ok(Self::new(Alpha::new(config.alpha), judge).with_scorer(config.static_scorer()))
    }

    pub fn alpha(&self) -> Alpha
    {
        self.alpha
    }

    pub fn judge_name(&self) -> &str
    {
        self.judge
            .name()
    }

    pub fn scorer(&self) -> &StaticScorer
    {
        &self.scorer
    }

    /// Score `trg` as a translation of `src`.
    ///
    /// Judge failures come back unchanged; no score is substituted.
    #[instrument(skip_all, fields(judge = self.judge.name(), alpha = self.alpha.get()))]
    pub fn score(
        &self,
        src: &str,
        trg: &str,
    ) -> Result<ImmResult, JudgeError>
    {
        let breakdown = self
            .scorer
            .score(src, trg);
        let judgment = self
            .judge
            .judge(src, trg)?
            .checked()?;

        let result = combine(&breakdown, &judgment, self.alpha);
        debug!(imm = result.imm, s = result.s, j = result.j, "combined");
        Ok(result)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::static_score::static_score;
    use crate::judge::MalformedOutput;

    struct Fixed(f64);

    impl Judge for Fixed
    {
        fn name(&self) -> &str
        {
            "fixed"
        }

        fn judge(
            &self,
            _src: &str,
            _trg: &str,
        ) -> Result<JudgeResult, JudgeError>
        {
            Ok(JudgeResult::new(self.0).with_explanation("fixed"))
        }
    }

    struct Broken;

    impl Judge for Broken
    {
        fn name(&self) -> &str
        {
            "broken"
        }

        fn judge(
            &self,
            _src: &str,
            _trg: &str,
        ) -> Result<JudgeResult, JudgeError>
        {
            Err(MalformedOutput::NoJsonObject { len: 3 }.into())
        }
    }

    #[test]
    fn alpha_is_clamped()
    {
        assert_eq!(Alpha::new(1.7).get(), 1.0);
        assert_eq!(Alpha::new(-0.3).get(), 0.0);
        assert_eq!(Alpha::new(0.3).get(), 0.3);
        assert_eq!(Alpha::new(f64::NAN).get(), DEFAULT_ALPHA);
        assert_eq!(Alpha::default().get(), 0.55);
    }

    #[test]
    fn blend_endpoints_are_exact()
    {
        for (s, j) in [(0.0, 1.0), (0.37, 0.91), (1.0, 0.0), (0.123456789, 0.987654321)]
        {
            assert_eq!(blend(s, j, Alpha::new(1.0)), s);
            assert_eq!(blend(s, j, Alpha::new(0.0)), j);
        }
    }

    #[test]
    fn combine_prefixes_breakdowns()
    {
        let breakdown = static_score("x = 1", "y = 1;");
        let judgment = JudgeResult::new(0.5)
            .with_criterion("risk", 0.25)
            .with_explanation("ok");
        let r = combine(&breakdown, &judgment, Alpha::new(0.5));

        assert_eq!(r.s, breakdown.s());
        assert_eq!(r.j, 0.5);
        assert!((r.imm - (0.5 * r.s + 0.25)).abs() < 1e-12);
        assert!(r.s_breakdown.contains_key("S_uni_f1"));
        assert!(!r.s_breakdown.contains_key("S_S"));
        assert_eq!(r.j_breakdown["J_risk"], 0.25);
        assert_eq!(r.j_explanation.as_deref(), Some("ok"));
    }

    #[test]
    fn result_serializes_with_report_keys()
    {
        let r = combine(&static_score("a", "a"), &JudgeResult::new(1.0), Alpha::default());
        let v = serde_json::to_value(&r).unwrap();
        for key in ["IMM", "S", "J", "alpha", "S_breakdown"]
        {
            assert!(v.get(key).is_some(), "missing {key}");
        }
        assert!(v.get("J_breakdown").is_none());
        assert!(v.get("J_explanation").is_none());
    }

    #[test]
    fn metric_uses_injected_judge()
    {
        let metric = ImmMetric::new(Alpha::new(0.0), Box::new(Fixed(0.8)));
        let r = metric
            .score("a = 1", "b = 2")
            .unwrap();
        assert_eq!(r.imm, 0.8);
        assert_eq!(metric.judge_name(), "fixed");
    }

    #[test]
    fn metric_propagates_judge_failure()
    {
        let metric = ImmMetric::new(Alpha::default(), Box::new(Broken));
        let err = metric
            .score("a", "a")
            .unwrap_err();
        assert!(matches!(err, JudgeError::Malformed(MalformedOutput::NoJsonObject { .. })));
    }

    #[test]
    fn nan_judgment_is_malformed_not_nan_imm()
    {
        let metric = ImmMetric::new(Alpha::new(0.5), Box::new(Fixed(f64::NAN)));
        let err = metric
            .score("a", "a")
            .unwrap_err();
        assert!(matches!(err, JudgeError::Malformed(MalformedOutput::NonFiniteScore { .. })));
    }

    #[test]
    fn default_metric_is_heuristic()
    {
        let metric = ImmMetric::default();
        assert_eq!(metric.judge_name(), "heuristic");
        assert_eq!(metric.alpha(), Alpha::default());
    }
}
