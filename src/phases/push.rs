//! Pushing a single target
//!
//! A [`PushOperation`] pushes either the main repository's branch to a named
//! remote or one subtree's extracted history to the subtree's own URL. All
//! failure modes are caught here and returned as a [`PushOutcome`]; nothing
//! escapes as an error, so the orchestrator can always move on to the next
//! target.
//!
//! Both kinds of push end in `git push --porcelain`, whose per-ref status
//! lines decide the outcome:
//!
//! | porcelain                        | outcome         |
//! |----------------------------------|-----------------|
//! | any `!` line                     | `Rejected`      |
//! | success, every line `=`          | `UpToDate`      |
//! | success with `--dry-run`         | `SkippedDryRun` |
//! | success                          | `Pushed`        |
//! | failure                          | `Failed`        |
//!
//! Forced pushes prefix the refspec with `+`. Dry-run pushes pass
//! `--dry-run`, so no remote is updated, but a subtree target still runs
//! `git subtree split` first: that writes the extracted commits into the
//! local object store and split cache, and leaves refs and the work tree
//! untouched.

use std::path::Path;

use log::{debug, info, warn};

use super::PushOutcome;
use crate::config::SubtreeRecord;
use crate::error::{Error, Result};
use crate::git::{parse_push_porcelain, CommandOutput, GitRunner, RefFlag};
use crate::probe::RepositoryProbe;

/// Stderr fragments git prints when it cannot talk to a remote at all.
const UNREACHABLE_MARKERS: &[&str] = &[
    "does not appear to be a git repository",
    "Could not read from remote repository",
    "unable to access",
    "Could not resolve host",
    "Connection refused",
    "Connection timed out",
];

/// Flags shared by every push in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// Ask the remote whether the push would succeed without updating it
    pub dry_run: bool,
    /// Overwrite the remote branch even when it has diverged
    pub force: bool,
}

/// Pushes targets of one main repository.
pub struct PushOperation<'a> {
    runner: &'a dyn GitRunner,
    root: &'a Path,
    options: PushOptions,
}

impl<'a> PushOperation<'a> {
    /// `root` is the top-level directory of the main work tree.
    pub fn new(runner: &'a dyn GitRunner, root: &'a Path, options: PushOptions) -> Self {
        Self {
            runner,
            root,
            options,
        }
    }

    /// Push `branch` of the main repository to the remote called `remote`.
    pub fn push_main(&self, remote: &str, branch: &str) -> PushOutcome {
        info!(
            "{} main repository branch '{}' to '{}'",
            self.verb(),
            branch,
            remote
        );
        let result = self.try_push_main(remote, branch);
        Self::record_outcome("main", result)
    }

    /// Extract the history of `record.path` on `branch` and push it to the
    /// subtree's own remote.
    pub fn push_subtree(&self, record: &SubtreeRecord, branch: &str) -> PushOutcome {
        info!(
            "{} subtree '{}' to {} ({})",
            self.verb(),
            record.path,
            record.url,
            record.branch
        );
        let result = self.try_push_subtree(record, branch);
        Self::record_outcome(&record.path, result)
    }

    fn verb(&self) -> &'static str {
        if self.options.dry_run {
            "Checking"
        } else {
            "Pushing"
        }
    }

    fn try_push_main(&self, remote: &str, branch: &str) -> Result<PushOutcome> {
        let probe = RepositoryProbe::new(self.runner);
        if !probe.has_remote(self.root, remote) {
            return Err(Error::NoRemote {
                name: remote.to_string(),
            });
        }
        let refspec = format!("refs/heads/{}:refs/heads/{}", branch, branch);
        self.push_refspec(remote, &refspec)
    }

    fn try_push_subtree(&self, record: &SubtreeRecord, branch: &str) -> Result<PushOutcome> {
        if !self.root.join(&record.path).is_dir() {
            return Err(Error::MissingPath {
                path: record.path.clone(),
            });
        }

        let commit = self.split(record, branch)?;
        debug!("subtree '{}' split to {}", record.path, commit);
        let refspec = format!("{}:refs/heads/{}", commit, record.branch);
        self.push_refspec(&record.url, &refspec)
    }

    /// Run `git subtree split` and return the commit it produced.
    fn split(&self, record: &SubtreeRecord, branch: &str) -> Result<String> {
        let prefix = format!("--prefix={}", record.path);
        let output = self
            .runner
            .run(&["subtree", "split", &prefix, branch], self.root)?;

        if !output.success() {
            return Err(Error::ExtractionFailed {
                path: record.path.clone(),
                message: output.diagnostic(),
            });
        }

        // Progress chatter goes to stderr; the commit id is the last stdout line
        let commit = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .unwrap_or("");
        if !is_commit_id(commit) {
            return Err(Error::ExtractionFailed {
                path: record.path.clone(),
                message: format!("no commit produced for prefix '{}'", record.path),
            });
        }
        Ok(commit.to_string())
    }

    fn push_refspec(&self, remote: &str, refspec: &str) -> Result<PushOutcome> {
        let refspec = if self.options.force {
            format!("+{}", refspec)
        } else {
            refspec.to_string()
        };

        // Up-to-date refs only get a porcelain line in verbose mode
        let mut args = vec!["push", "--porcelain", "--verbose"];
        if self.options.dry_run {
            args.push("--dry-run");
        }
        args.extend(["--", remote, refspec.as_str()]);

        let output = self.runner.run(&args, self.root)?;
        classify(&output, self.options.dry_run, remote)
    }

    /// The boundary where per-target errors become recorded outcomes.
    fn record_outcome(label: &str, result: Result<PushOutcome>) -> PushOutcome {
        match result {
            Ok(outcome) => {
                debug!("{}: {}", label, outcome.label());
                outcome
            }
            Err(Error::NonFastForwardRejected { reason, .. }) => {
                warn!("{}: push rejected: {}", label, reason);
                PushOutcome::Rejected(reason)
            }
            Err(e) => {
                warn!("{}: {}", label, e);
                PushOutcome::Failed(e.to_string())
            }
        }
    }
}

fn is_commit_id(candidate: &str) -> bool {
    candidate.len() >= 7 && candidate.chars().all(|c| c.is_ascii_hexdigit())
}

/// Decide the outcome of a `git push --porcelain` invocation.
pub fn classify(output: &CommandOutput, dry_run: bool, remote: &str) -> Result<PushOutcome> {
    let refs = parse_push_porcelain(&output.stdout);

    if let Some(rejected) = refs.iter().find(|r| r.flag == RefFlag::Rejected) {
        let reason = if rejected.summary.is_empty() {
            output.diagnostic()
        } else {
            rejected.summary.clone()
        };
        return Err(Error::NonFastForwardRejected {
            remote: remote.to_string(),
            reason,
        });
    }

    if !output.success() {
        let message = output.diagnostic();
        if UNREACHABLE_MARKERS.iter().any(|m| message.contains(m)) {
            return Err(Error::UnreachableRemote {
                remote: remote.to_string(),
                message,
            });
        }
        return Err(Error::GitCommand {
            command: format!("git push {}", remote),
            stderr: message,
        });
    }

    let nothing_to_push = if refs.is_empty() {
        output.stderr.contains("Everything up-to-date")
    } else {
        refs.iter().all(|r| r.flag == RefFlag::UpToDate)
    };
    if nothing_to_push {
        return Ok(PushOutcome::UpToDate);
    }
    if dry_run {
        return Ok(PushOutcome::SkippedDryRun);
    }
    Ok(PushOutcome::Pushed)
}
