//! CLI argument parsing and command dispatch

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use git_rp::output::OutputConfig;

use crate::commands;

/// Recursively push a repository and its nested git subtrees
#[derive(Parser, Debug)]
#[command(name = "git-rp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    push: commands::push::PushArgs,

    /// Only print errors and the failed targets
    #[arg(short, long)]
    quiet: bool,

    /// Colorize output (always, never, auto)
    #[arg(
        long,
        value_name = "WHEN",
        default_value = "auto",
        value_parser = ["always", "never", "auto"]
    )]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        value_parser = ["off", "error", "warn", "info", "debug", "trace"]
    )]
    log_level: String,
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<ExitCode> {
        init_logging(&self.log_level, self.quiet);
        let output_config = OutputConfig::from_env_and_flag(&self.color);
        commands::push::execute(self.push, &output_config, self.quiet)
    }
}

/// Logs go to stderr; `RUST_LOG` takes precedence over `--log-level`.
fn init_logging(level: &str, quiet: bool) {
    let level = if quiet { "error" } else { level };
    let env = env_logger::Env::default().default_filter_or(level);
    // A logger may already be installed when running under a test harness
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}
