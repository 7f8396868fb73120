use anyhow::Result;
use clap::Parser;
use imm_metric::cli::{AppContext, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    imm_metric::infra::logging::init(cli.verbose, cli.quiet);

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
    };

    match cli.command {
        Commands::Score(args) => imm_metric::score_run(args, &ctx),
        Commands::Batch(args) => imm_metric::batch_run(args, &ctx),
        Commands::Demo(args) => imm_metric::demo_run(args, &ctx),
        Commands::Init(args) => imm_metric::infra::config::init(args, &ctx),
        Commands::Completions(args) => imm_metric::completion::run(args, &ctx),
    }
}
