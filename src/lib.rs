//! **imm-metric** - Code translation quality scoring
//!
//! IMM = alpha * S + (1 - alpha) * J, where S is a deterministic static
//! similarity between source and target code and J comes from a pluggable
//! semantic judge.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Static scoring, aggregation and the score/batch commands
pub mod core {
    /// Comment stripping and identifier/literal canonicalization
    pub mod normalize;
    pub use normalize::normalize;

    /// Lexeme splitting of normalized text
    pub mod tokenize;
    pub use tokenize::tokenize;

    /// N-gram F1, Jaccard and weighted mean
    pub mod similarity;

    /// Tree-sitter node-category shape signal
    pub mod structure;
    pub use structure::{SourceLang, ast_shape};

    /// Static score S with its sub-signal breakdown
    pub mod static_score;
    pub use static_score::{ScoreBreakdown, StaticScorer, static_score};

    /// IMM aggregation and the metric entry point
    pub mod combine;
    pub use combine::{Alpha, ImmMetric, ImmResult, blend, combine};

    /// `imm score` command
    pub mod score;
    pub use score::run as score_run;

    /// `imm batch` / `imm demo` commands and report writers
    pub mod batch;
    pub use batch::{demo_run, run as batch_run};
}

/// Semantic judges (heuristic, subprocess-driven models)
pub mod judge;

/// Infrastructure - configuration and logging
pub mod infra {
    /// Layered configuration with TOML/YAML/JSON files and IMM__ env vars
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// tracing-subscriber setup
    pub mod logging;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use crate::core::{
    Alpha, ImmMetric, ImmResult, ScoreBreakdown, StaticScorer, batch_run, combine, demo_run,
    normalize, score_run, static_score, tokenize,
};
pub use infra::{Config, load_config};
pub use judge::{HeuristicJudge, Judge, JudgeError, JudgeResult, SubprocessJudge};
