//! # git-rp
//!
//! This is the binary entry point for the `git-rp` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Running the recursive push and printing its summary.
//! - Translating the outcome into an exit status: 0 when every target
//!   succeeded, 1 when any target failed or the repository could not be
//!   determined, 2 for usage errors (reported by `clap`).
//!
//! The core application logic is defined in the `lib.rs` library crate, ensuring
//! that the binary is a thin wrapper around the reusable library functionality.

mod cli;
mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<ExitCode> {
    let cli = cli::Cli::parse();
    cli.execute()
}
