use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::batch::JudgeFailurePolicy;
use crate::core::structure::SourceLang;
use crate::infra::config::Config;
use crate::judge::JudgeKind;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
}

#[derive(Parser)]
#[command(name = "imm")]
#[command(about = "Score code translations by blending static similarity (S) with a semantic judge (J)")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score one source/target pair
    Score(ScoreArgs),

    /// Score every pair listed in a manifest and write CSV/JSON reports
    Batch(BatchArgs),

    /// Score the built-in demonstration pairs
    Demo(DemoArgs),

    /// Initialize an imm.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Metric settings that override the loaded configuration
#[derive(Args, Debug, Clone, Default)]
pub struct MetricOverrides {
    /// Weight on the static score, clamped to [0, 1]
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Judge strategy
    #[arg(long, value_enum)]
    pub judge: Option<JudgeKind>,

    /// Model name for model-backed judges
    #[arg(long)]
    pub model: Option<String>,

    /// Judge timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Rubric file for model-backed judges
    #[arg(long)]
    pub rubric: Option<PathBuf>,

    /// Source language; with --trg-lang enables the syntax-tree signal
    #[arg(long, value_enum)]
    pub src_lang: Option<SourceLang>,

    /// Target language; with --src-lang enables the syntax-tree signal
    #[arg(long, value_enum)]
    pub trg_lang: Option<SourceLang>,
}

impl MetricOverrides {
    /// Apply every flag that was given on top of `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(alpha) = self.alpha {
            config.alpha = alpha;
        }
        if let Some(kind) = self.judge {
            config.judge.kind = kind;
        }
        if let Some(model) = &self.model {
            config.judge.model = model.clone();
        }
        if let Some(secs) = self.timeout {
            config.judge.timeout_secs = secs;
        }
        if let Some(path) = &self.rubric {
            config.judge.rubric_path = Some(path.clone());
        }
        if let Some(lang) = self.src_lang {
            config.structure.src_lang = Some(lang);
        }
        if let Some(lang) = self.trg_lang {
            config.structure.trg_lang = Some(lang);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// Full result as JSON
    Json,
    /// Sub-scores as a table
    Table,
}

#[derive(Parser)]
pub struct ScoreArgs {
    /// Source (reference) code file
    pub src: PathBuf,

    /// Target (translated) code file
    pub trg: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Skip the judge and report the static score only
    #[arg(long)]
    pub static_only: bool,

    #[command(flatten)]
    pub metric: MetricOverrides,
}

#[derive(Parser)]
pub struct BatchArgs {
    /// Manifest listing the pairs (TOML or JSON)
    pub manifest: PathBuf,

    /// Directory for the CSV and JSON reports
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// What to do when the judge fails on a pair
    #[arg(long, value_enum)]
    pub on_judge_error: Option<JudgeFailurePolicy>,

    #[command(flatten)]
    pub metric: MetricOverrides,
}

#[derive(Parser)]
pub struct DemoArgs {
    /// Also write the CSV and JSON reports
    #[arg(long)]
    pub save: bool,

    /// Directory for the reports (implies --save)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// What to do when the judge fails on a pair
    #[arg(long, value_enum)]
    pub on_judge_error: Option<JudgeFailurePolicy>,

    #[command(flatten)]
    pub metric: MetricOverrides,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
