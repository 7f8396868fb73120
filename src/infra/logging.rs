//! Tracing subscriber setup for the `imm` binary.

use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive
pub const LOG_ENV: &str = "IMM_LOG";

/// Level implied by the CLI flags when `IMM_LOG` is unset.
pub fn default_level(
    verbose: u8,
    quiet: bool,
) -> &'static str
{
    if quiet
    {
        return "error";
    }
    match verbose
    {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install a stderr fmt subscriber. A second call is a no-op.
pub fn init(
    verbose: u8,
    quiet: bool,
)
{
    let filter = if quiet
    {
        EnvFilter::new("error")
    }
    else
    {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level(verbose, quiet)))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn verbosity_maps_to_levels()
    {
        assert_eq!(default_level(0, false), "warn");
        assert_eq!(default_level(1, false), "info");
        assert_eq!(default_level(2, false), "debug");
        assert_eq!(default_level(9, false), "trace");
        assert_eq!(default_level(3, true), "error");
    }

    #[test]
    fn init_twice_is_harmless()
    {
        init(0, true);
        init(2, false);
    }
}
