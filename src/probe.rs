//! # Repository Probe
//!
//! Read-only queries against a working tree: where its root is, which branch
//! is checked out, whether a remote exists, and the raw configuration text
//! that declares subtrees. Every query takes the directory it applies to;
//! nothing here looks at the process's current directory.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::defaults::MANIFEST_FILE;
use crate::error::{Error, Result};
use crate::git::GitRunner;

/// Read-only view of a repository through a [`GitRunner`].
pub struct RepositoryProbe<'a> {
    runner: &'a dyn GitRunner,
}

impl<'a> RepositoryProbe<'a> {
    pub fn new(runner: &'a dyn GitRunner) -> Self {
        Self { runner }
    }

    fn not_a_repository(dir: &Path) -> Error {
        Error::NotARepository {
            path: dir.display().to_string(),
        }
    }

    /// Top-level directory of the working tree containing `dir`.
    pub fn work_tree_root(&self, dir: &Path) -> Result<PathBuf> {
        if !dir.is_dir() {
            return Err(Self::not_a_repository(dir));
        }
        let output = self.runner.run(&["rev-parse", "--show-toplevel"], dir)?;
        let root = output.stdout.trim();
        if !output.success() || root.is_empty() {
            debug!("rev-parse failed in {}: {}", dir.display(), output.diagnostic());
            return Err(Self::not_a_repository(dir));
        }
        Ok(PathBuf::from(root))
    }

    /// Short name of the branch `HEAD` points at.
    ///
    /// Works on a freshly initialised repository with no commits yet.
    pub fn current_branch(&self, dir: &Path) -> Result<String> {
        let output = self
            .runner
            .run(&["symbolic-ref", "--quiet", "--short", "HEAD"], dir)?;
        match output.status {
            Some(0) if !output.stdout.trim().is_empty() => Ok(output.stdout.trim().to_string()),
            // --quiet exits 1 exactly when HEAD is not a symbolic ref
            Some(1) => Err(Error::DetachedHead {
                path: dir.display().to_string(),
            }),
            _ => Err(Self::not_a_repository(dir)),
        }
    }

    /// Whether a remote called `name` is configured. Never fails.
    pub fn has_remote(&self, dir: &Path, name: &str) -> bool {
        match self.runner.run(&["remote"], dir) {
            Ok(output) if output.success() => output.stdout.lines().any(|l| l.trim() == name),
            Ok(output) => {
                debug!("git remote failed in {}: {}", dir.display(), output.diagnostic());
                false
            }
            Err(e) => {
                debug!("git remote could not run in {}: {}", dir.display(), e);
                false
            }
        }
    }

    /// Raw text of the repository's persisted git configuration.
    pub fn read_config_text(&self, dir: &Path) -> Result<String> {
        let output = self.runner.run(&["rev-parse", "--git-path", "config"], dir)?;
        let reported = output.stdout.trim();
        if !output.success() || reported.is_empty() {
            return Err(Self::not_a_repository(dir));
        }

        // --git-path answers relative to the directory it ran in
        let config_path = dir.join(reported);
        if !config_path.is_file() {
            debug!("no config file at {}", config_path.display());
            return Ok(String::new());
        }
        Ok(fs::read_to_string(config_path)?)
    }

    /// Text of the tracked subtree manifest in `dir`, if there is one.
    pub fn read_manifest(&self, dir: &Path) -> Result<Option<String>> {
        let manifest = dir.join(MANIFEST_FILE);
        if !manifest.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(manifest)?))
    }

    /// Whether `dir` is a checkout of its own rather than merged content.
    pub fn is_standalone_checkout(&self, dir: &Path) -> bool {
        dir.join(".git").exists()
    }
}
