//! Push command implementation
//!
//! Pushes the current branch of the main repository, then every configured
//! subtree (nested ones first) to its own remote, and prints a summary.
//! The exit status is 0 only when every target succeeded.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use git_rp::config::SettingsOverrides;
use git_rp::git::SystemGit;
use git_rp::output::{self, OutputConfig};
use git_rp::phases::{self, PushOptions, SyncRequest};

/// Arguments for pushing a repository and its subtrees
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Branch to push (defaults to the checked-out branch)
    ///
    /// Subtree declarations are still read from the checked-out work tree,
    /// so check out the branch being pushed when its subtrees differ.
    #[arg(short, long, value_name = "NAME")]
    pub branch: Option<String>,

    /// Force every push, overwriting diverged remote branches
    #[arg(short, long)]
    pub force: bool,

    /// Check what would be pushed without updating any remote
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Run as if started in this directory
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Remote for the main repository push
    #[arg(short, long, value_name = "NAME", env = "GIT_RP_REMOTE")]
    pub remote: Option<String>,

    /// Target branch for subtree blocks that do not name one
    #[arg(long, value_name = "NAME", env = "GIT_RP_DEFAULT_BRANCH")]
    pub default_branch: Option<String>,

    /// Maximum nesting depth explored when discovering subtrees
    #[arg(
        long,
        value_name = "NUM",
        env = "GIT_RP_MAX_DEPTH",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub max_depth: Option<u64>,

    /// Kill any git command that runs longer than this many seconds
    #[arg(
        long,
        value_name = "SECS",
        env = "GIT_RP_TIMEOUT",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: Option<u64>,

    /// Push independent subtree chains concurrently
    #[arg(short, long)]
    pub parallel: bool,

    /// Print the discovered subtree hierarchy and exit without pushing
    #[arg(long, conflicts_with = "json")]
    pub tree: bool,

    /// Print the report as JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}

impl PushArgs {
    fn request(&self) -> Result<SyncRequest> {
        let work_dir = match &self.directory {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to get current directory")?,
        };
        let max_depth = self
            .max_depth
            .map(usize::try_from)
            .transpose()
            .context("--max-depth is too large")?;

        Ok(SyncRequest {
            work_dir,
            branch: self.branch.clone(),
            options: PushOptions {
                dry_run: self.dry_run,
                force: self.force,
            },
            overrides: SettingsOverrides {
                remote: self.remote.clone(),
                default_branch: self.default_branch.clone(),
                max_depth,
            },
            parallel: self.parallel,
        })
    }

    fn runner(&self) -> SystemGit {
        SystemGit::new().with_timeout(self.timeout.map(Duration::from_secs))
    }
}

/// Execute the push command.
///
/// Fatal context errors (not a repository, detached HEAD) are returned as
/// `Err`; per-target failures only affect the returned exit code.
pub fn execute(args: PushArgs, output_config: &OutputConfig, quiet: bool) -> Result<ExitCode> {
    let request = args.request()?;
    let runner = args.runner();

    if args.tree {
        let plan = phases::plan(&runner, &request)?;
        let rendered = output::render_tree(&plan).context("Failed to display tree")?;
        print!("{}", rendered);
        return Ok(ExitCode::SUCCESS);
    }

    let report = phases::execute_push(&runner, &request)?;

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", output::render_summary(&report, output_config, quiet));
    }

    Ok(ExitCode::from(report.exit_code()))
}
