//! # CLI Command Implementations
//!
//! `git-rp` has a single operation, so the command surface is one argument
//! struct flattened into the top-level parser.
//!
//! The command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic by calling into the `git_rp` library.

pub mod push;
