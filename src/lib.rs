//! # git-rp Library
//!
//! This library implements a recursive push for repositories that embed
//! other repositories with `git subtree`. One run pushes the main
//! repository's branch to its remote, then extracts and pushes every
//! configured subtree (and every subtree nested inside those) to the
//! subtree's own remote, innermost first.
//!
//! ## Core Concepts
//!
//! - **Process runner (`git`)**: every version-control call goes through the
//!   [`git::GitRunner`] trait, implemented by [`git::SystemGit`].
//! - **Repository probe (`probe`)**: read-only queries for the work tree
//!   root, current branch, remotes and configuration text.
//! - **Configuration (`config`)**: parses `[subtree "<path>"]` blocks and the
//!   `[rp]` settings section from git configuration text and from tracked
//!   `.gitsubtrees` manifests.
//! - **Phases (`phases`)**: discovery of nested subtrees, push ordering,
//!   single-target pushes and the orchestrator that ties them together.
//! - **Output (`output`)**: colour detection, the final summary and the
//!   `--tree` view.
//!
//! ## Quick Example
//!
//! ```
//! use git_rp::config;
//!
//! let text = r#"
//! [subtree "vendor/lib"]
//!     url = git@example.com:org/lib.git
//!     branch = release-1.x
//! "#;
//! let records = config::discover(text, "main");
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].path, "vendor/lib");
//! assert_eq!(records[0].branch, "release-1.x");
//! ```
//!
//! ## Execution Flow
//!
//! The main entry point is [`phases::execute_push`]:
//!
//! 1.  **Context**: resolve the work tree root, branch and settings.
//! 2.  **Main push**: push the branch to the configured remote.
//! 3.  **Discovery**: find top-level and nested subtrees.
//! 4.  **Ordering**: flatten them so inner subtrees are pushed first.
//! 5.  **Subtree pushes**: split and push each subtree.
//! 6.  **Report**: one outcome per target, plus discovery warnings.

pub mod config;
pub mod defaults;
pub mod error;
pub mod git;
pub mod output;
pub mod phases;
pub mod probe;
