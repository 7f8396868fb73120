//! Rubric loading and judge prompt rendering.

use std::path::Path;

use anyhow::{Context, Result};

/// Rubric used when no `judge.rubric_path` is configured.
pub const DEFAULT_RUBRIC: &str = "\
Score each criterion from 0.0 (worst) to 1.0 (best).

functionality: does the target compute the same results as the source for
every input, including edge cases such as empty collections, zero, negative
numbers and loop bounds?

semantic_alignment: does the target preserve the intent, data flow and
control flow of the source, without dropped or invented behavior?

idiomaticity: does the target read like code a fluent developer of the
target language would write?

risk: how likely is the target to hide a defect that a quick review would
miss? 1.0 means no visible risk.

final_j_score: your overall judgment, weighing functionality highest.";

const SCHEMA: &str = r#"{
  "functionality": 0.0,
  "semantic_alignment": 0.0,
  "idiomaticity": 0.0,
  "risk": 0.0,
  "final_j_score": 0.0,
  "explanation": "one sentence"
}"#;

/// Prompt builder for model-backed judges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate
{
    rubric: String,
}

impl Default for PromptTemplate
{
    fn default() -> Self
    {
        Self::new(DEFAULT_RUBRIC)
    }
}

impl PromptTemplate
{
    pub fn new(rubric: impl Into<String>) -> Self
    {
        Self { rubric: rubric.into() }
    }

    /// Load the rubric from `path` (shell-expanded), or use the built-in one.
    pub fn load(path: Option<&Path>) -> Result<Self>
    {
        let Some(path) = path
        else
        {
            return Ok(Self::default());
        };

        let raw = path.to_string_lossy();
        let expanded = shellexpand::full(&raw)
            .with_context(|| format!("Failed to expand rubric path {raw}"))?;
        let text = std::fs::read_to_string(&*expanded)
            .with_context(|| format!("Rubric file not found: {}", expanded))?;

        Ok(Self::new(text))
    }

    pub fn rubric(&self) -> &str
    {
        &self.rubric
    }

    /// Full prompt for one source/target pair.
    pub fn render(
        &self,
        src: &str,
        trg: &str,
    ) -> String
    {
        format!(
            "You are a strict code translation judge. You MUST output ONLY valid JSON.\n\
             No markdown. No commentary outside the JSON object.\n\n\
             Scoring rubric:\n\n{rubric}\n\n\
             Respond with exactly one JSON object with these fields \
             (numbers between 0 and 1):\n\n{SCHEMA}\n\n\
             SOURCE CODE:\n{src}\n\n\
             TARGET CODE:\n{trg}\n\n\
             Output ONLY the JSON object.\n",
            rubric = self.rubric,
        )
    }
}

#[cfg(test)]
mod tests
{
    use std::io::Write;

    use super::*;

    #[test]
    fn render_embeds_rubric_schema_and_code()
    {
        let p = PromptTemplate::new("RUBRIC-TEXT");
        let out = p.render("def f(): pass", "void f() {}");
        assert!(out.contains("RUBRIC-TEXT"));
        assert!(out.contains("\"final_j_score\": 0.0"));
        assert!(out.contains("SOURCE CODE:\ndef f(): pass"));
        assert!(out.contains("TARGET CODE:\nvoid f() {}"));
    }

    #[test]
    fn load_defaults_without_path()
    {
        let p = PromptTemplate::load(None).unwrap();
        assert_eq!(p.rubric(), DEFAULT_RUBRIC);
    }

    #[test]
    fn load_reads_rubric_file()
    {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "custom rubric").unwrap();
        let p = PromptTemplate::load(Some(file.path())).unwrap();
        assert_eq!(p.rubric(), "custom rubric");
    }

    #[test]
    fn missing_rubric_is_an_error()
    {
        let err = PromptTemplate::load(Some(Path::new("/definitely/not/here.md"))).unwrap_err();
        assert!(err.to_string().contains("Rubric file not found"));
    }
}
