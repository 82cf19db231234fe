//! Default values for git-rp configuration.
//!
//! This module provides centralized default values used across the library
//! and the command line, so the `[rp]` configuration section, environment
//! variables and flags all fall back to the same values.

/// Remote used for the main repository push.
pub const DEFAULT_REMOTE: &str = "origin";

/// Target branch for subtree blocks that do not name one.
pub const DEFAULT_BRANCH: &str = "main";

/// Maximum nesting depth explored during nested subtree discovery.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Tracked manifest file that declares the subtrees nested inside a directory.
pub const MANIFEST_FILE: &str = ".gitsubtrees";

/// Configuration section holding subtree blocks.
pub const SUBTREE_SECTION: &str = "subtree";

/// Configuration section holding tool settings.
pub const SETTINGS_SECTION: &str = "rp";
