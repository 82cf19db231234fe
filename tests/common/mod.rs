//! Shared test utilities for end-to-end tests.
//!
//! Every test works against real `git`: a [`TestFixture`] holds a temporary
//! directory with bare "remote" repositories and one main work tree, all on
//! branch `main`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     if should_skip_git_tests() {
//!         return;
//!     }
//!     let fixture = TestFixture::new();
//!     let origin = fixture.bare_remote("origin");
//!     fixture.add_remote("origin", &origin);
//!     fixture.command().assert().success();
//! }
//! ```

#![allow(dead_code)]

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::{outcomes, should_skip_git_tests, should_skip_subtree_tests, TestFixture};
}

/// Check if tests that drive real git should be skipped.
///
/// Returns `true` when `git` is not installed.
///
/// # Example
///
/// ```rust,ignore
/// if should_skip_git_tests() {
///     return;
/// }
/// ```
pub fn should_skip_git_tests() -> bool {
    if git_available() {
        return false;
    }
    println!("Skipping: git is not installed");
    true
}

/// Like [`should_skip_git_tests`], but also requires `git subtree`.
pub fn should_skip_subtree_tests() -> bool {
    if subtree_available() {
        return false;
    }
    println!("Skipping: git subtree is not available");
    true
}

/// Whether a `git` executable can be run.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Whether the `git subtree` extension is installed.
pub fn subtree_available() -> bool {
    // `git subtree -h` exits 129 after printing usage when installed
    git_available()
        && Command::new("git")
            .args(["subtree", "-h"])
            .output()
            .map(|o| {
                String::from_utf8_lossy(&o.stdout).contains("git subtree")
                    || String::from_utf8_lossy(&o.stderr).contains("git subtree")
            })
            .unwrap_or(false)
}

/// Run git in `dir`, panicking with its stderr on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {} failed in {}: {}",
        args.join(" "),
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A temporary main repository plus bare remotes.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a main work tree at `<temp>/work` with one initial commit.
    pub fn new() -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        let fixture = Self { temp_dir };
        let work = fixture.path();
        std::fs::create_dir_all(&work).expect("Failed to create work tree");

        git(&work, &["init", "--quiet"]);
        git(&work, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(&work, &["config", "user.name", "Test User"]);
        git(&work, &["config", "user.email", "test@example.com"]);
        git(&work, &["config", "commit.gpgsign", "false"]);
        fixture.commit_file("README.md", "# Test Repository\n", "Initial commit");
        fixture
    }

    /// The main work tree.
    pub fn path(&self) -> PathBuf {
        self.temp_dir.path().join("work")
    }

    /// Create an empty bare repository and return its path.
    pub fn bare_remote(&self, name: &str) -> PathBuf {
        let remotes = self.temp_dir.child("remotes");
        remotes.create_dir_all().expect("Failed to create remotes dir");
        let path = remotes.path().join(format!("{}.git", name));
        git(remotes.path(), &["init", "--quiet", "--bare", &format!("{}.git", name)]);
        git(&path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        path
    }

    /// Register `url` as a remote of the main repository.
    pub fn add_remote(&self, name: &str, url: &Path) {
        git(&self.path(), &["remote", "add", name, &url.to_string_lossy()]);
    }

    /// Write a file in the main work tree and commit it.
    pub fn commit_file(&self, path: &str, content: &str, message: &str) {
        let work = self.path();
        let file = work.join(path);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(&file, content).expect("Failed to write file");
        git(&work, &["add", path]);
        git(&work, &["commit", "--quiet", "-m", message]);
    }

    /// Declare a top-level subtree in the main repository's git config.
    pub fn configure_subtree(&self, path: &str, url: &str, branch: &str) {
        let work = self.path();
        git(&work, &["config", &format!("subtree.{}.url", path), url]);
        git(&work, &["config", &format!("subtree.{}.branch", path), branch]);
    }

    /// Commit a `.gitsubtrees` manifest inside `dir` with the given blocks
    /// of `(relative path, url)`.
    pub fn commit_manifest(&self, dir: &str, entries: &[(&str, &str)]) {
        let body: String = entries
            .iter()
            .map(|(path, url)| format!("[subtree \"{}\"]\n\turl = {}\n\tbranch = main\n", path, url))
            .collect();
        self.commit_file(&format!("{}/.gitsubtrees", dir), &body, "Declare nested subtrees");
    }

    /// Amend the last commit so the local branch diverges from any remote.
    pub fn amend(&self, message: &str) {
        git(&self.path(), &["commit", "--quiet", "--amend", "-m", message]);
    }

    /// Commit id of `reference` in `repo`, if it exists.
    pub fn ref_of(&self, repo: &Path, reference: &str) -> Option<String> {
        let output = Command::new("git")
            .args(["rev-parse", "--verify", "--quiet", reference])
            .current_dir(repo)
            .output()
            .ok()?;
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// The tool, running in the main work tree with a clean environment.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("git-rp");
        cmd.current_dir(self.path())
            .env_remove("GIT_RP_REMOTE")
            .env_remove("GIT_RP_DEFAULT_BRANCH")
            .env_remove("GIT_RP_MAX_DEPTH")
            .env_remove("GIT_RP_TIMEOUT")
            .env_remove("RUST_LOG")
            .arg("--color=never");
        cmd
    }

    /// Run the tool with `--json` and parse the report.
    pub fn json_report(&self, args: &[&str]) -> (i32, serde_json::Value) {
        let output = self
            .command()
            .arg("--json")
            .args(args)
            .output()
            .expect("Failed to execute command");
        let report = serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
            panic!(
                "invalid JSON report ({}): {}\nstderr: {}",
                e,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            )
        });
        (output.status.code().unwrap_or(-1), report)
    }

    /// Get access to the underlying TempDir for advanced usage.
    pub fn temp_dir(&self) -> &assert_fs::TempDir {
        &self.temp_dir
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Labels and statuses of a JSON report, in report order.
pub fn outcomes(report: &serde_json::Value) -> Vec<(String, String)> {
    report["results"]
        .as_array()
        .map(|results| {
            results
                .iter()
                .map(|r| {
                    (
                        r["label"].as_str().unwrap_or_default().to_string(),
                        r["outcome"]["status"].as_str().unwrap_or_default().to_string(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_starts_on_main_with_a_commit() {
        if !git_available() {
            return;
        }
        let fixture = TestFixture::new();
        assert_eq!(
            git(&fixture.path(), &["symbolic-ref", "--short", "HEAD"]),
            "main"
        );
        assert!(fixture.ref_of(&fixture.path(), "HEAD").is_some());
    }

    #[test]
    fn test_bare_remote_is_empty() {
        if !git_available() {
            return;
        }
        let fixture = TestFixture::new();
        let remote = fixture.bare_remote("lib");
        assert!(remote.ends_with("lib.git"));
        assert_eq!(fixture.ref_of(&remote, "refs/heads/main"), None);
    }
}
