//! `imm completions`: shell completion scripts for the `imm` binary.

use anyhow::{Context, Result, bail};
use clap::CommandFactory;
use clap_complete::{Shell as CompletionShell, generate, generate_to};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cli::{AppContext, Cli, CompletionsArgs, Shell};

const BIN_NAME: &str = "imm";

impl From<Shell> for CompletionShell {
    fn from(shell: Shell) -> Self {
        match shell {
            Shell::Bash => CompletionShell::Bash,
            Shell::Zsh => CompletionShell::Zsh,
            Shell::Fish => CompletionShell::Fish,
            Shell::PowerShell => CompletionShell::PowerShell,
            Shell::Elvish => CompletionShell::Elvish,
        }
    }
}

/// The completion script for `shell` as text.
pub fn render(shell: Shell) -> Result<String> {
    let mut buf = Vec::new();
    generate(CompletionShell::from(shell), &mut Cli::command(), BIN_NAME, &mut buf);
    String::from_utf8(buf).context("completion script is not UTF-8")
}

/// Write the script for `shell` into `dir` under the shell's usual file name.
pub fn write_to_dir(shell: Shell, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = generate_to(CompletionShell::from(shell), &mut Cli::command(), BIN_NAME, dir)
        .with_context(|| format!("Failed to write {shell:?} completions into {}", dir.display()))?;
    info!(path = %path.display(), "completion script written");
    Ok(path)
}

pub fn run(args: CompletionsArgs, ctx: &AppContext) -> Result<()> {
    if args.stdout {
        let script = render(args.shell)?;
        io::stdout()
            .write_all(script.as_bytes())
            .context("Failed to write completions to stdout")?;
        return Ok(());
    }

    let Some(dir) = args.out_dir else {
        bail!("Pass --out-dir <DIR> or --stdout");
    };
    let path = write_to_dir(args.shell, &dir)?;

    if !ctx.quiet {
        eprintln!("Wrote {} completions to {}", BIN_NAME, path.display());
    }
    Ok(())
}
