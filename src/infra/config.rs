use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};
use crate::core::batch::JudgeFailurePolicy;
use crate::core::combine::DEFAULT_ALPHA;
use crate::core::static_score::{StaticScorer, StructureSignal};
use crate::core::structure::SourceLang;
use crate::judge::JudgeKind;

/// Config files searched in the working directory, first hit wins
pub const CONFIG_FILES: &[&str] = &["imm.toml", "imm.yaml", "imm.json", ".imm.toml"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Weight on the static score S, clamped to [0, 1]
    pub alpha: f64,

    /// Token-stream memo size; 0 disables the cache
    pub cache_capacity: u64,

    /// Judge selection and process settings
    pub judge: JudgeConfig,

    /// Offline heuristic judge tuning
    pub heuristic: HeuristicConfig,

    /// Optional syntax-tree shape signal
    pub structure: StructureConfig,

    /// Batch runner outputs
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig
{
    pub kind: JudgeKind,
    pub model: String,
    /// Program for the `command` judge
    pub program: Option<String>,
    /// Arguments for the `command` judge; `{model}` is substituted
    pub args: Vec<String>,
    pub timeout_secs: u64,
    pub rubric_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig
{
    pub length_tolerance: f64,
    pub ctrl_weight: f64,
    pub arith_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig
{
    pub src_lang: Option<SourceLang>,
    pub trg_lang: Option<SourceLang>,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig
{
    pub output_dir: PathBuf,
    pub csv_name: String,
    pub json_name: String,
    pub on_judge_error: JudgeFailurePolicy,
}

impl Default for Config
{
    fn default() -> Self
    {
        Self {
            alpha: DEFAULT_ALPHA,
            cache_capacity: 512,
            judge: JudgeConfig::default(),
            heuristic: HeuristicConfig::default(),
            structure: StructureConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl Default for JudgeConfig
{
    fn default() -> Self
    {
        Self {
            kind: JudgeKind::Heuristic,
            model: "mistral".to_string(),
            program: None,
            args: Vec::new(),
            timeout_secs: 120,
            rubric_path: None,
        }
    }
}

impl Default for HeuristicConfig
{
    fn default() -> Self
    {
        Self { length_tolerance: 0.5, ctrl_weight: 0.6, arith_weight: 0.4 }
    }
}

impl Default for StructureConfig
{
    fn default() -> Self
    {
        Self { src_lang: None, trg_lang: None, weight: 0.15 }
    }
}

impl Default for BatchConfig
{
    fn default() -> Self
    {
        Self {
            output_dir: PathBuf::from("results"),
            csv_name: "metrics_comparison.csv".to_string(),
            json_name: "metrics_comparison.json".to_string(),
            on_judge_error: JudgeFailurePolicy::Abort,
        }
    }
}

impl StructureConfig
{
    /// The shape signal is on only when both languages are known.
    pub fn signal(&self) -> Option<StructureSignal>
    {
        match (self.src_lang, self.trg_lang)
        {
            (Some(src_lang), Some(trg_lang)) =>
            {
                Some(StructureSignal { src_lang, trg_lang, weight: self.weight })
            }
            _ => None,
        }
    }
}

impl Config
{
    /// Static scorer with the configured cache and shape signal.
    pub fn static_scorer(&self) -> StaticScorer
    {
        let mut scorer = StaticScorer::new();
        if self.cache_capacity > 0
        {
            scorer = scorer.with_cache(self.cache_capacity);
        }
        if let Some(signal) = self
            .structure
            .signal()
        {
            scorer = scorer.with_structure(signal);
        }
        scorer
    }
}

pub fn load_config() -> Result<Config>
{
    load_config_from(Path::new("."))
}

/// Layer the first config file found in `dir` under `IMM__*` env vars.
pub fn load_config_from(dir: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    // Load from config files in priority order
    for name in CONFIG_FILES
    {
        let path = dir.join(name);
        if path.exists()
        {
            builder = builder.add_source(config::File::from(path));
            break;
        }
    }

    // IMM__ALPHA, IMM__JUDGE__KIND, ...
    builder = builder.add_source(config::Environment::with_prefix("IMM").separator("__"));

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join(CONFIG_FILES[0]);

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
