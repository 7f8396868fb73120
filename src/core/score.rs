//! `imm score`: one source/target pair from two files.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tabled::{Table, Tabled};
use tracing::info;

use crate::cli::{AppContext, OutputFormat, ScoreArgs};
use crate::core::combine::{ImmMetric, ImmResult};
use crate::core::static_score::ScoreBreakdown;
use crate::infra::config::load_config;

/// Read a code file, expanding `~` and `$VAR` first.
pub(crate) fn read_code(path: &Path) -> Result<String>
{
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw).with_context(|| format!("Failed to expand path {raw}"))?;
    std::fs::read_to_string(&*expanded)
        .with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Score coloring: green from 0.75, yellow from 0.5, red below.
pub(crate) fn paint(
    value: f64,
    ctx: &AppContext,
) -> String
{
    let text = format!("{value:.4}");
    if ctx.no_color
    {
        text
    }
    else if value >= 0.75
    {
        text.green()
            .to_string()
    }
    else if value >= 0.5
    {
        text.yellow()
            .to_string()
    }
    else
    {
        text.red()
            .to_string()
    }
}

#[derive(Tabled)]
struct MetricRow
{
    metric: String,
    value: String,
}

fn row(
    metric: &str,
    value: f64,
) -> MetricRow
{
    MetricRow { metric: metric.to_string(), value: format!("{value:.4}") }
}

pub fn run(
    args: ScoreArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let mut config = load_config()?;
    args.metric
        .apply(&mut config);

    let src = read_code(&args.src)?;
    let trg = read_code(&args.trg)?;

    if args.static_only
    {
        let breakdown = config
            .static_scorer()
            .score(&src, &trg);
        info!(s = breakdown.s(), "static-only score");
        print!("{}", render_static(&breakdown, args.format, ctx)?);
        return Ok(());
    }

    let metric = ImmMetric::from_config(&config)?;
    let result = metric
        .score(&src, &trg)
        .with_context(|| format!("Judge `{}` failed", metric.judge_name()))?;

    print!("{}", render_result(&result, metric.judge_name(), args.format, ctx)?);
    Ok(())
}

pub fn render_static(
    breakdown: &ScoreBreakdown,
    format: OutputFormat,
    ctx: &AppContext,
) -> Result<String>
{
    let out = match format
    {
        OutputFormat::Json =>
        {
            serde_json::to_string_pretty(breakdown).context("Failed to serialize breakdown")? + "\n"
        }
        OutputFormat::Table =>
        {
            let rows: Vec<MetricRow> = breakdown
                .iter()
                .map(|(k, v)| row(k, v))
                .collect();
            format!("{}\n", Table::new(rows))
        }
        OutputFormat::Text =>
        {
            let mut out = format!("S    {}  (static only)\n", paint(breakdown.s(), ctx));
            for (key, value) in breakdown
                .iter()
                .skip(1)
            {
                out.push_str(&format!("  {key:<10} {value:.4}\n"));
            }
            out
        }
    };
    Ok(out)
}

pub fn render_result(
    result: &ImmResult,
    judge: &str,
    format: OutputFormat,
    ctx: &AppContext,
) -> Result<String>
{
    let out = match format
    {
        OutputFormat::Json =>
        {
            serde_json::to_string_pretty(result).context("Failed to serialize result")? + "\n"
        }
        OutputFormat::Table =>
        {
            let mut rows = vec![row("IMM", result.imm), row("S", result.s)];
            rows.extend(
                result
                    .s_breakdown
                    .iter()
                    .map(|(k, v)| row(k, *v)),
            );
            rows.push(row("J", result.j));
            rows.extend(
                result
                    .j_breakdown
                    .iter()
                    .map(|(k, v)| row(k, *v)),
            );
            format!("{}\n", Table::new(rows))
        }
        OutputFormat::Text =>
        {
            let mut out = format!(
                "IMM  {}  (alpha {:.2})\n  S  {}\n  J  {}  [{judge}]\n",
                paint(result.imm, ctx),
                result.alpha,
                paint(result.s, ctx),
                paint(result.j, ctx),
            );
            if let Some(explanation) = &result.j_explanation
            {
                out.push_str(&format!("  {explanation}\n"));
            }
            out
        }
    };
    Ok(out)
}
