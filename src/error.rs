//! # Error Handling
//!
//! This module defines the centralized error type for `git-rp`. It uses the
//! `thiserror` library to create an `Error` enum that covers every anticipated
//! failure mode, with messages that name the repository, path, or remote
//! involved.
//!
//! Errors fall into two groups:
//!
//! - **Context errors** (`NotARepository`, `DetachedHead`): the tool cannot
//!   establish which repository or branch it is operating on. These are fatal
//!   and abort the whole run.
//! - **Per-target errors** (`MissingPath`, `NoRemote`, `ExtractionFailed`,
//!   `UnreachableRemote`, `NonFastForwardRejected`, `GitCommand`, `Timeout`):
//!   raised while pushing one target, then converted into a recorded
//!   [`PushOutcome`](crate::phases::PushOutcome) so traversal can continue.
//!
//! `ConfigParse`, `CyclicSubtreeConfig` and `DepthLimitExceeded` are raised
//! during discovery and are only ever reported as warnings.

use thiserror::Error;

/// Main error type for git-rp operations
#[derive(Error, Debug)]
pub enum Error {
    /// The directory is not inside a git working tree.
    #[error("Not a git repository: {path}")]
    NotARepository { path: String },

    /// `HEAD` does not point at a branch and no branch was given explicitly.
    #[error("HEAD is detached in {path}; pass --branch to choose a branch")]
    DetachedHead { path: String },

    /// A subtree configuration block could not be parsed.
    ///
    /// Includes the specific issue and optionally a hint about how to fix it.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A nested subtree declaration points back at a directory that is
    /// already being discovered.
    #[error("Cyclic subtree configuration: {cycle}")]
    CyclicSubtreeConfig { cycle: String },

    /// Nested discovery reached the configured depth ceiling.
    #[error("Subtree nesting deeper than {max_depth} levels at {path}")]
    DepthLimitExceeded { path: String, max_depth: usize },

    /// The subtree directory does not exist in the working tree.
    #[error("Subtree path does not exist: {path}")]
    MissingPath { path: String },

    /// The main repository has no remote with the requested name.
    #[error("No remote named '{name}'")]
    NoRemote { name: String },

    /// Splitting the subtree history produced nothing pushable.
    #[error("Could not extract history for {path}: {message}")]
    ExtractionFailed { path: String, message: String },

    /// The remote could not be contacted or is not a repository.
    #[error("Remote {remote} is unreachable: {message}")]
    UnreachableRemote { remote: String, message: String },

    /// The remote refused a non-fast-forward update.
    #[error("Push to {remote} rejected: {reason}")]
    NonFastForwardRejected { remote: String, reason: String },

    /// A git command could not be run or exited unexpectedly.
    #[error("Git command failed: {command} - {stderr}")]
    GitCommand { command: String, stderr: String },

    /// A git command did not finish within the configured timeout.
    #[error("Git command timed out after {seconds}s: {command}")]
    Timeout { command: String, seconds: u64 },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred during serialization.
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
