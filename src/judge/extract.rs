//! Judgment extraction from noisy model output.
//!
//! Stages, tried in order:
//!   1. `Strict`   - the whole (trimmed) text is one JSON object.
//!   2. `Embedded` - scan for objects starting at `{"` and keep the first
//!                   well-formed one that carries a score field.
//!   3. failure    - [`MalformedOutput`] says which stage got how far.

use std::fmt;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::JudgeResult;

/// Field names accepted for the overall score, in priority order.
pub const SCORE_FIELDS: &[&str] = &["final_j_score", "J"];

/// Rubric sub-criteria copied into the judgment breakdown when present.
pub const CRITERIA: &[&str] = &["functionality", "semantic_alignment", "idiomaticity", "risk"];

static OBJECT_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{\s*""#).expect("static regex"));

/// Which extraction stage produced the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractStage
{
    Strict,
    Embedded,
}

impl fmt::Display for ExtractStage
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        match self
        {
            ExtractStage::Strict => f.write_str("strict"),
            ExtractStage::Embedded => f.write_str("embedded"),
        }
    }
}

/// Why a judge reply could not be turned into a score.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedOutput
{
    #[error("no JSON object found in {len} bytes of judge output")]
    NoJsonObject { len: usize },

    #[error("JSON object ({stage} stage) has no `final_j_score` field")]
    MissingScore { stage: ExtractStage },

    #[error("`{field}` is not a number ({stage} stage)")]
    NonNumericScore { stage: ExtractStage, field: String },

    #[error("`{field}` is not a finite number")]
    NonFiniteScore { field: String },
}

/// The object located in the reply and the stage that found it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted
{
    pub stage: ExtractStage,
    pub object: Map<String, Value>,
}

fn has_score(object: &Map<String, Value>) -> bool
{
    SCORE_FIELDS
        .iter()
        .any(|f| object.contains_key(*f))
}

/// Locate the judgment object in `text`.
pub fn extract_object(text: &str) -> Result<Extracted, MalformedOutput>
{
    // Stage 1: the reply is exactly one object
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(text.trim())
    {
        return Ok(Extracted { stage: ExtractStage::Strict, object });
    }

    // Stage 2: first well-formed object with a score somewhere in the noise
    let mut saw_object = false;
    for start in OBJECT_START.find_iter(text)
    {
        let mut stream =
            serde_json::Deserializer::from_str(&text[start.start()..]).into_iter::<Value>();
        if let Some(Ok(Value::Object(object))) = stream.next()
        {
            if has_score(&object)
            {
                return Ok(Extracted { stage: ExtractStage::Embedded, object });
            }
            saw_object = true;
        }
    }

    if saw_object
    {
        Err(MalformedOutput::MissingScore { stage: ExtractStage::Embedded })
    }
    else
    {
        Err(MalformedOutput::NoJsonObject { len: text.len() })
    }
}

/// Decode an extracted object into a judgment.
///
/// The score must be numeric. It and any numeric rubric criteria are
/// clamped to [0, 1]; absent criteria stay absent.
pub fn decode(extracted: &Extracted) -> Result<JudgeResult, MalformedOutput>
{
    let stage = extracted.stage;
    let object = &extracted.object;

    let (field, raw) = SCORE_FIELDS
        .iter()
        .find_map(|f| {
            object
                .get(*f)
                .map(|v| (*f, v))
        })
        .ok_or(MalformedOutput::MissingScore { stage })?;

    let score = raw
        .as_f64()
        .ok_or_else(|| MalformedOutput::NonNumericScore { stage, field: field.to_string() })?;

    let mut breakdown = IndexMap::new();
    for criterion in CRITERIA
    {
        match object
            .get(*criterion)
            .map(Value::as_f64)
        {
            Some(Some(v)) =>
            {
                breakdown.insert(criterion.to_string(), v.clamp(0.0, 1.0));
            }
            Some(None) => debug!(criterion, "ignoring non-numeric rubric criterion"),
            None => {}
        }
    }

    let explanation = object
        .get("explanation")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(JudgeResult { score: score.clamp(0.0, 1.0), explanation, breakdown })
}

/// Extract and decode in one step, reporting the stage that succeeded.
pub fn parse_judgment(text: &str) -> Result<(JudgeResult, ExtractStage), MalformedOutput>
{
    let extracted = extract_object(text)?;
    let result = decode(&extracted)?;
    Ok((result, extracted.stage))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn strict_reply_is_taken_whole()
    {
        let text = r#" {"functionality": 0.9, "semantic_alignment": 0.8, "idiomaticity": 0.7, "risk": 0.2, "final_j_score": 0.75} "#;
        let (j, stage) = parse_judgment(text).unwrap();
        assert_eq!(stage, ExtractStage::Strict);
        assert_eq!(j.score, 0.75);
        assert_eq!(j.breakdown.len(), 4);
        assert_eq!(j.breakdown["risk"], 0.2);
    }

    #[test]
    fn embedded_object_found_inside_commentary()
    {
        let text = "Sure! Here is my verdict {see below}:\n```json\n{\"final_j_score\": 0.6, \"explanation\": \"loop bounds match\"}\n```\nThanks.";
        let (j, stage) = parse_judgment(text).unwrap();
        assert_eq!(stage, ExtractStage::Embedded);
        assert_eq!(j.score, 0.6);
        assert_eq!(j.explanation.as_deref(), Some("loop bounds match"));
        assert!(j.breakdown.is_empty());
    }

    #[test]
    fn skips_objects_without_a_score()
    {
        let text = r#"schema: {"final": "number"} answer: {"J": 0.4}"#;
        let (j, stage) = parse_judgment(text).unwrap();
        assert_eq!(stage, ExtractStage::Embedded);
        assert_eq!(j.score, 0.4);
    }

    #[test]
    fn scores_are_clamped()
    {
        let (j, _) = parse_judgment(r#"{"final_j_score": 7, "risk": -1}"#).unwrap();
        assert_eq!(j.score, 1.0);
        assert_eq!(j.breakdown["risk"], 0.0);
    }

    #[test]
    fn no_object_is_reported_as_such()
    {
        let err = parse_judgment("the model refused").unwrap_err();
        assert_eq!(err, MalformedOutput::NoJsonObject { len: 17 });
    }

    #[test]
    fn object_without_score_is_missing_score()
    {
        assert_eq!(
            parse_judgment(r#"{"functionality": 1.0}"#).unwrap_err(),
            MalformedOutput::MissingScore { stage: ExtractStage::Strict }
        );
        assert_eq!(
            parse_judgment(r#"noise {"functionality": 1.0} noise"#).unwrap_err(),
            MalformedOutput::MissingScore { stage: ExtractStage::Embedded }
        );
    }

    #[test]
    fn string_score_is_rejected()
    {
        let err = parse_judgment(r#"{"final_j_score": "0.8"}"#).unwrap_err();
        assert!(matches!(err, MalformedOutput::NonNumericScore { stage: ExtractStage::Strict, .. }));
    }
}
