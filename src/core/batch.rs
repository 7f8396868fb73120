//! `imm batch` and `imm demo`: score many pairs, persist CSV and JSON.
//!
//! Pairs are scored in parallel with their input order preserved. What
//! happens to a pair whose judge fails is a [`JudgeFailurePolicy`].

use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tabled::{Table, Tabled};
use tracing::{info, warn};

use crate::cli::{AppContext, BatchArgs, DemoArgs, MetricOverrides};
use crate::core::combine::{ImmMetric, ImmResult, prefixed_static};
use crate::core::score::read_code;
use crate::infra::config::{BatchConfig, Config, load_config};
use crate::judge::JudgeError;

/// CSV header of the comparison report.
pub const CSV_HEADER: &str = "example,IMM,S,J";

/// What to do with a pair whose judge call failed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum JudgeFailurePolicy
{
    /// Stop the batch with the first failure
    #[default]
    Abort,
    /// Drop the pair from the report
    Skip,
    /// Report IMM = S and record the judge error
    StaticOnly,
}

/// Manifest file: `[[pairs]]` entries with inline code or file paths.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest
{
    pub pairs: Vec<PairSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PairSpec
{
    pub name: String,
    pub src: Option<String>,
    pub src_file: Option<PathBuf>,
    pub trg: Option<String>,
    pub trg_file: Option<PathBuf>,
}

/// A resolved pair ready for scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair
{
    pub name: String,
    pub src: String,
    pub trg: String,
}

impl Pair
{
    pub fn new(
        name: impl Into<String>,
        src: impl Into<String>,
        trg: impl Into<String>,
    ) -> Self
    {
        Self { name: name.into(), src: src.into(), trg: trg.into() }
    }
}

impl Manifest
{
    /// Parse a manifest (`.json` as JSON, anything else as TOML) and
    /// resolve every pair. Relative file paths are taken from the
    /// manifest's directory.
    pub fn load(path: &Path) -> Result<Vec<Pair>>
    {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;

        let manifest: Manifest = match path
            .extension()
            .and_then(|e| e.to_str())
        {
            Some("json") => serde_json::from_str(&text)
                .with_context(|| format!("Invalid JSON manifest: {}", path.display()))?,
            _ => toml::from_str(&text)
                .with_context(|| format!("Invalid TOML manifest: {}", path.display()))?,
        };

        let base = path
            .parent()
            .unwrap_or_else(|| Path::new("."));
        manifest.resolve(base)
    }

    pub fn resolve(
        self,
        base: &Path,
    ) -> Result<Vec<Pair>>
    {
        let mut seen = HashSet::new();
        let mut pairs = Vec::with_capacity(self.pairs.len());

        for spec in self.pairs
        {
            if !seen.insert(spec.name.clone())
            {
                bail!("Duplicate pair name `{}` in manifest", spec.name);
            }
            let src = side(&spec.name, "src", spec.src, spec.src_file, base)?;
            let trg = side(&spec.name, "trg", spec.trg, spec.trg_file, base)?;
            pairs.push(Pair { name: spec.name, src, trg });
        }

        Ok(pairs)
    }
}

/// Exactly one of inline code or a file must be given for each side.
fn side(
    name: &str,
    which: &str,
    inline: Option<String>,
    file: Option<PathBuf>,
    base: &Path,
) -> Result<String>
{
    match (inline, file)
    {
        (Some(code), None) => Ok(code),
        (None, Some(file)) =>
        {
            let raw = file.to_string_lossy();
            let expanded = PathBuf::from(
                shellexpand::full(&raw)
                    .with_context(|| format!("Failed to expand path {raw}"))?
                    .into_owned(),
            );
            let full = if expanded.is_absolute() { expanded } else { base.join(expanded) };
            read_code(&full).with_context(|| format!("Pair `{name}`: cannot load {which}_file"))
        }
        (Some(_), Some(_)) => bail!("Pair `{name}`: set either `{which}` or `{which}_file`, not both"),
        (None, None) => bail!("Pair `{name}`: missing `{which}` or `{which}_file`"),
    }
}

/// Built-in demonstration pairs: a faithful loop, the same loop with a
/// factorial bug, and an inverted branch condition.
pub fn builtin_pairs() -> Vec<Pair>
{
    const SUM_TO_N: &str = "def sum_to_n(n):\n    s = 0\n    for i in range(1, n+1):\n        s += i\n    return s\n";

    vec![
        Pair::new(
            "sum_to_n",
            SUM_TO_N,
            "int sumToN(int n) {\n    int acc = 0;\n    for (int i = 1; i <= n; i++) {\n        acc = acc + i;\n    }\n    return acc;\n}\n",
        ),
        Pair::new(
            "buggy_sum",
            SUM_TO_N,
            "int sumToN(int n) {\n    int acc = 1;\n    for (int i = 1; i <= n; i++) {\n        acc = acc * i; // factorial bug\n    }\n    return acc;\n}\n",
        ),
        Pair::new(
            "swapped_if",
            "def abs_val(x):\n    if x < 0:\n        return -x\n    else:\n        return x\n",
            "int absVal(int x) {\n    if (x > 0) { // swapped condition bug\n        return -x;\n    } else {\n        return x;\n    }\n}\n",
        ),
    ]
}

/// Static-only stand-in for a pair whose judge failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticOnlyEntry
{
    #[serde(rename = "IMM")]
    pub imm: f64,
    #[serde(rename = "S")]
    pub s: f64,
    #[serde(rename = "S_breakdown")]
    pub s_breakdown: IndexMap<String, f64>,
    pub judge_error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BatchEntry
{
    Scored(ImmResult),
    StaticOnly(StaticOnlyEntry),
}

impl BatchEntry
{
    pub fn imm(&self) -> f64
    {
        match self
        {
            BatchEntry::Scored(r) => r.imm,
            BatchEntry::StaticOnly(e) => e.imm,
        }
    }

    pub fn s(&self) -> f64
    {
        match self
        {
            BatchEntry::Scored(r) => r.s,
            BatchEntry::StaticOnly(e) => e.s,
        }
    }

    /// `None` when the judge failed.
    pub fn j(&self) -> Option<f64>
    {
        match self
        {
            BatchEntry::Scored(r) => Some(r.j),
            BatchEntry::StaticOnly(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchRow
{
    pub name: String,
    pub entry: BatchEntry,
}

/// Judge failure that aborted a batch.
#[derive(Debug, thiserror::Error)]
#[error("judge failed on pair `{name}`")]
pub struct PairError
{
    pub name: String,
    #[source]
    pub source: JudgeError,
}

fn progress_bar(
    len: usize,
    ctx: &AppContext,
) -> ProgressBar
{
    if ctx.quiet
    {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Score every pair under `policy`. Output order follows `pairs`.
pub fn score_pairs(
    metric: &ImmMetric,
    pairs: &[Pair],
    policy: JudgeFailurePolicy,
    ctx: &AppContext,
) -> Result<Vec<BatchRow>, PairError>
{
    let progress = progress_bar(pairs.len(), ctx);

    let scored: Vec<Option<BatchRow>> = pairs
        .par_iter()
        .map(|pair| {
            let outcome = score_one(metric, pair, policy);
            progress.inc(1);
            progress.set_message(pair.name.clone());
            outcome
        })
        .collect::<Result<Vec<_>, PairError>>()?;

    progress.finish_and_clear();

    Ok(scored
        .into_iter()
        .flatten()
        .collect())
}

fn score_one(
    metric: &ImmMetric,
    pair: &Pair,
    policy: JudgeFailurePolicy,
) -> Result<Option<BatchRow>, PairError>
{
    let err = match metric.score(&pair.src, &pair.trg)
    {
        Ok(result) =>
        {
            return Ok(Some(BatchRow { name: pair.name.clone(), entry: BatchEntry::Scored(result) }));
        }
        Err(err) => err,
    };

    match policy
    {
        JudgeFailurePolicy::Abort => Err(PairError { name: pair.name.clone(), source: err }),
        JudgeFailurePolicy::Skip =>
        {
            warn!(pair = %pair.name, error = %err, "judge failed, skipping pair");
            Ok(None)
        }
        JudgeFailurePolicy::StaticOnly =>
        {
            warn!(pair = %pair.name, error = %err, "judge failed, reporting static score only");
            let breakdown = metric
                .scorer()
                .score(&pair.src, &pair.trg);
            let entry = StaticOnlyEntry {
                imm: breakdown.s(),
                s: breakdown.s(),
                s_breakdown: prefixed_static(&breakdown),
                judge_error: err.to_string(),
            };
            Ok(Some(BatchRow { name: pair.name.clone(), entry: BatchEntry::StaticOnly(entry) }))
        }
    }
}

fn csv_field(field: &str) -> String
{
    if field.contains([',', '"', '\n', '\r'])
    {
        format!("\"{}\"", field.replace('"', "\"\""))
    }
    else
    {
        field.to_string()
    }
}

/// CSV text with header `example,IMM,S,J`; J is empty for static-only rows.
pub fn render_csv(rows: &[BatchRow]) -> String
{
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for row in rows
    {
        let j = row
            .entry
            .j()
            .map(|j| j.to_string())
            .unwrap_or_default();
        let _ = writeln!(out, "{},{},{},{}", csv_field(&row.name), row.entry.imm(), row.entry.s(), j);
    }
    out
}

#[derive(Serialize)]
struct ReportMeta<'a>
{
    generated_at: DateTime<Utc>,
    alpha: f64,
    judge: &'a str,
}

#[derive(Serialize)]
struct Report<'a>
{
    meta: ReportMeta<'a>,
    results: IndexMap<&'a str, &'a BatchEntry>,
}

/// JSON report: `meta` plus `results` keyed by pair name.
pub fn render_json(
    rows: &[BatchRow],
    metric: &ImmMetric,
) -> Result<String>
{
    let report = Report {
        meta: ReportMeta {
            generated_at: Utc::now(),
            alpha: metric
                .alpha()
                .get(),
            judge: metric.judge_name(),
        },
        results: rows
            .iter()
            .map(|r| (r.name.as_str(), &r.entry))
            .collect(),
    };
    serde_json::to_string_pretty(&report).context("Failed to serialize JSON report")
}

/// Write `contents` through a temp file in the same directory.
fn write_atomic(
    path: &Path,
    contents: &str,
) -> Result<()>
{
    let dir = path
        .parent()
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(contents.as_bytes())
        .context("Failed to write report")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write both reports into `cfg.output_dir`; returns (csv, json) paths.
pub fn write_reports(
    cfg: &BatchConfig,
    rows: &[BatchRow],
    metric: &ImmMetric,
) -> Result<(PathBuf, PathBuf)>
{
    std::fs::create_dir_all(&cfg.output_dir)
        .with_context(|| format!("Failed to create {}", cfg.output_dir.display()))?;

    let csv_path = cfg
        .output_dir
        .join(&cfg.csv_name);
    let json_path = cfg
        .output_dir
        .join(&cfg.json_name);

    write_atomic(&csv_path, &render_csv(rows))?;
    write_atomic(&json_path, &render_json(rows, metric)?)?;

    info!(csv = %csv_path.display(), json = %json_path.display(), rows = rows.len(), "reports written");
    Ok((csv_path, json_path))
}

#[derive(Tabled)]
struct SummaryRow
{
    example: String,
    #[tabled(rename = "IMM")]
    imm: String,
    #[tabled(rename = "S")]
    s: String,
    #[tabled(rename = "J")]
    j: String,
}

pub fn summary_table(rows: &[BatchRow]) -> String
{
    let rows: Vec<SummaryRow> = rows
        .iter()
        .map(|r| SummaryRow {
            example: r
                .name
                .clone(),
            imm: format!("{:.3}", r.entry.imm()),
            s: format!("{:.3}", r.entry.s()),
            j: r.entry
                .j()
                .map(|j| format!("{j:.3}"))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    Table::new(rows).to_string()
}

fn prepare(
    overrides: &MetricOverrides,
    output_dir: Option<PathBuf>,
    policy: Option<JudgeFailurePolicy>,
) -> Result<Config>
{
    let mut config = load_config()?;
    overrides.apply(&mut config);
    if let Some(dir) = output_dir
    {
        config.batch.output_dir = dir;
    }
    if let Some(policy) = policy
    {
        config.batch.on_judge_error = policy;
    }
    Ok(config)
}

pub fn run(
    args: BatchArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config = prepare(&args.metric, args.output_dir, args.on_judge_error)?;
    let pairs = Manifest::load(&args.manifest)?;
    if pairs.is_empty()
    {
        bail!("Manifest {} lists no pairs", args.manifest.display());
    }

    let metric = ImmMetric::from_config(&config)?;
    let rows = score_pairs(&metric, &pairs, config.batch.on_judge_error, ctx)?;
    let (csv_path, json_path) = write_reports(&config.batch, &rows, &metric)?;

    if !ctx.quiet
    {
        for row in &rows
        {
            let j = row
                .entry
                .j()
                .map(|j| format!("{j:.3}"))
                .unwrap_or_else(|| "-".to_string());
            println!("{}: IMM={:.3}, S={:.3}, J={}", row.name, row.entry.imm(), row.entry.s(), j);
        }
        let done = format!("Results saved to {} and {}", csv_path.display(), json_path.display());
        if ctx.no_color
        {
            println!("{done}");
        }
        else
        {
            println!("{} {done}", "✓".green());
        }
    }
    Ok(())
}

pub fn demo_run(
    args: DemoArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let save = args.save || args.output_dir.is_some();
    let config = prepare(&args.metric, args.output_dir, args.on_judge_error)?;

    let metric = ImmMetric::from_config(&config)?;
    let rows = score_pairs(&metric, &builtin_pairs(), config.batch.on_judge_error, ctx)?;

    println!("{}", summary_table(&rows));

    if save
    {
        let (csv_path, _) = write_reports(&config.batch, &rows, &metric)?;
        if !ctx.quiet
        {
            println!("Results saved to {}", csv_path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::combine::Alpha;
    use crate::judge::{Judge, JudgeResult, MalformedOutput};

    struct FailsOn(&'static str);

    impl Judge for FailsOn
    {
        fn name(&self) -> &str
        {
            "fails-on"
        }

        fn judge(
            &self,
            src: &str,
            _trg: &str,
        ) -> Result<JudgeResult, JudgeError>
        {
            if src == self.0
            {
                Err(MalformedOutput::NoJsonObject { len: 0 }.into())
            }
            else
            {
                Ok(JudgeResult::new(0.5))
            }
        }
    }

    fn quiet() -> AppContext
    {
        AppContext { quiet: true, no_color: true }
    }

    fn pairs() -> Vec<Pair>
    {
        vec![Pair::new("ok", "a = 1", "a = 1;"), Pair::new("bad", "boom", "b"), Pair::new("ok2", "x", "x")]
    }

    fn metric() -> ImmMetric
    {
        ImmMetric::new(Alpha::new(0.5), Box::new(FailsOn("boom")))
    }

    #[test]
    fn abort_reports_failing_pair()
    {
        let err = score_pairs(&metric(), &pairs(), JudgeFailurePolicy::Abort, &quiet()).unwrap_err();
        assert_eq!(err.name, "bad");
        assert!(matches!(err.source, JudgeError::Malformed(_)));
    }

    #[test]
    fn skip_drops_failing_pair_and_keeps_order()
    {
        let rows = score_pairs(&metric(), &pairs(), JudgeFailurePolicy::Skip, &quiet()).unwrap();
        let names: Vec<&str> = rows
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, ["ok", "ok2"]);
    }

    #[test]
    fn static_only_keeps_row_with_s_as_imm()
    {
        let rows = score_pairs(&metric(), &pairs(), JudgeFailurePolicy::StaticOnly, &quiet()).unwrap();
        assert_eq!(rows.len(), 3);
        let bad = &rows[1].entry;
        assert_eq!(bad.j(), None);
        assert_eq!(bad.imm(), bad.s());

        let csv = render_csv(&rows);
        let line = csv
            .lines()
            .nth(2)
            .unwrap();
        assert!(line.starts_with("bad,"));
        assert!(line.ends_with(','));
    }

    #[test]
    fn csv_quotes_awkward_names()
    {
        let rows = score_pairs(
            &metric(),
            &[Pair::new("a,\"b\"", "x", "x")],
            JudgeFailurePolicy::Abort,
            &quiet(),
        )
        .unwrap();
        let csv = render_csv(&rows);
        assert!(csv.starts_with("example,IMM,S,J\n"));
        assert!(csv.contains("\"a,\"\"b\"\"\","));
    }

    #[test]
    fn json_report_has_meta_and_results()
    {
        let m = metric();
        let rows = score_pairs(&m, &pairs(), JudgeFailurePolicy::StaticOnly, &quiet()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&render_json(&rows, &m).unwrap()).unwrap();
        assert_eq!(v["meta"]["alpha"], 0.5);
        assert_eq!(v["meta"]["judge"], "fails-on");
        assert!(v["meta"]["generated_at"].is_string());
        assert!(v["results"]["ok"]["J"].is_number());
        assert!(v["results"]["bad"]["judge_error"].is_string());
        assert!(v["results"]["bad"].get("J").is_none());
    }

    #[test]
    fn manifest_resolves_inline_and_relative_files()
    {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        let manifest = dir.path().join("pairs.toml");
        std::fs::write(
            &manifest,
            "[[pairs]]\nname = \"one\"\nsrc_file = \"a.py\"\ntrg = \"int x = 1;\"\n",
        )
        .unwrap();

        let pairs = Manifest::load(&manifest).unwrap();
        assert_eq!(pairs, [Pair::new("one", "x = 1\n", "int x = 1;")]);
    }

    #[test]
    fn manifest_rejects_bad_pairs()
    {
        let both = Manifest {
            pairs: vec![PairSpec {
                name: "p".into(),
                src: Some("a".into()),
                src_file: Some("a.py".into()),
                trg: Some("b".into()),
                trg_file: None,
            }],
        };
        assert!(both.resolve(Path::new(".")).is_err());

        let dup: Manifest = serde_json::from_str(
            r#"{"pairs": [{"name": "p", "src": "a", "trg": "b"}, {"name": "p", "src": "c", "trg": "d"}]}"#,
        )
        .unwrap();
        let err = dup.resolve(Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));

        let missing: Manifest = serde_json::from_str(r#"{"pairs": [{"name": "p", "src": "a"}]}"#).unwrap();
        assert!(missing.resolve(Path::new(".")).is_err());
    }

    #[test]
    fn builtin_bug_lowers_static_score()
    {
        let m = ImmMetric::default();
        let rows = score_pairs(&m, &builtin_pairs(), JudgeFailurePolicy::Abort, &quiet()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].name, "sum_to_n");
        assert!(rows[1].entry.s() < rows[0].entry.s());
    }

    #[test]
    fn reports_land_in_output_dir()
    {
        let dir = tempfile::tempdir().unwrap();
        let cfg = BatchConfig { output_dir: dir.path().join("out"), ..BatchConfig::default() };
        let m = metric();
        let rows = score_pairs(&m, &pairs()[..1], JudgeFailurePolicy::Abort, &quiet()).unwrap();

        let (csv, json) = write_reports(&cfg, &rows, &m).unwrap();
        assert!(csv.ends_with("metrics_comparison.csv"));
        assert!(std::fs::read_to_string(csv).unwrap().starts_with(CSV_HEADER));
        assert!(json.exists());
    }
}
