//! Semantic judgment capability.
//!
//! A judge turns a (source, target) pair into a score J in [0, 1] plus an
//! optional explanation. Implementations are picked at construction time
//! and may be slow or non-deterministic; every failure is a typed
//! [`JudgeError`] and is never replaced by a default score.

pub mod extract;
pub mod heuristic;
pub mod prompt;
pub mod subprocess;

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use extract::{ExtractStage, MalformedOutput};
pub use heuristic::HeuristicJudge;
pub use prompt::PromptTemplate;
pub use subprocess::SubprocessJudge;

use crate::infra::config::Config;

/// One semantic judgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeResult
{
    /// Overall score J, in [0, 1]
    pub score: f64,
    /// Free-text rationale, if the judge gave one
    pub explanation: Option<String>,
    /// Judge-defined sub-scores, each in [0, 1]
    pub breakdown: IndexMap<String, f64>,
}

impl JudgeResult
{
    /// A bare judgment; `score` is clamped to [0, 1].
    pub fn new(score: f64) -> Self
    {
        Self { score: score.clamp(0.0, 1.0), explanation: None, breakdown: IndexMap::new() }
    }

    pub fn with_explanation(
        mut self,
        explanation: impl Into<String>,
    ) -> Self
    {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn with_criterion(
        mut self,
        name: &str,
        value: f64,
    ) -> Self
    {
        self.breakdown
            .insert(name.to_string(), value.clamp(0.0, 1.0));
        self
    }

    /// Reject NaN or infinite values and pull the rest into [0, 1].
    ///
    /// Fields are public, so a judge may build a result that skipped
    /// [`JudgeResult::new`]; the metric runs every judgment through this.
    pub fn checked(mut self) -> Result<Self, MalformedOutput>
    {
        if !self
            .score
            .is_finite()
        {
            return Err(MalformedOutput::NonFiniteScore { field: "score".to_string() });
        }
        self.score = self
            .score
            .clamp(0.0, 1.0);

        for (name, value) in self
            .breakdown
            .iter_mut()
        {
            if !value.is_finite()
            {
                return Err(MalformedOutput::NonFiniteScore { field: name.clone() });
            }
            *value = value.clamp(0.0, 1.0);
        }
        Ok(self)
    }
}

/// Judge failure taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum JudgeError
{
    /// The reply held no usable JSON judgment
    #[error("malformed judge output: {0}")]
    Malformed(#[from] MalformedOutput),

    /// The judge process or endpoint could not be reached or failed
    #[error("judge unavailable: {0}")]
    Unavailable(String),

    /// The judge exceeded its time budget
    #[error("judge timed out after {:.1}s", .after.as_secs_f64())]
    Timeout { after: Duration },
}

impl JudgeError
{
    /// Timeouts are handled like an unreachable judge.
    pub fn is_unavailable(&self) -> bool
    {
        matches!(self, JudgeError::Unavailable(_) | JudgeError::Timeout { .. })
    }
}

/// Semantic judgment strategy.
pub trait Judge: Send + Sync
{
    /// Short label for logs and reports.
    fn name(&self) -> &str;

    /// Score `trg` as a translation of `src`.
    fn judge(
        &self,
        src: &str,
        trg: &str,
    ) -> Result<JudgeResult, JudgeError>;
}

/// Available judge strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum JudgeKind
{
    /// Deterministic offline heuristic
    #[default]
    Heuristic,
    /// Local model through `ollama run <model>`
    Ollama,
    /// Any program that reads the prompt on stdin and prints JSON
    Command,
}

/// Build the configured judge.
pub fn build_judge(config: &Config) -> Result<Box<dyn Judge>>
{
    let jc = &config.judge;
    let timeout = Duration::from_secs(jc.timeout_secs);

    match jc.kind
    {
        JudgeKind::Heuristic => Ok(Box::new(HeuristicJudge::from(&config.heuristic))),
        JudgeKind::Ollama =>
        {
            let prompt = PromptTemplate::load(jc.rubric_path.as_deref())?;
            Ok(Box::new(SubprocessJudge::ollama(&jc.model, timeout, prompt)))
        }
        JudgeKind::Command =>
        {
            let program = jc
                .program
                .clone()
                .ok_or_else(|| anyhow!("judge.program must be set for the command judge"))?;
            let prompt = PromptTemplate::load(jc.rubric_path.as_deref())
                .context("Failed to prepare judge prompt")?;

            // `{model}` in args expands to the configured model name
            let args = jc
                .args
                .iter()
                .map(|a| a.replace("{model}", &jc.model))
                .collect();

            Ok(Box::new(SubprocessJudge::new(program, args, timeout, prompt)))
        }
    }
}
