//! # Git Process Runner
//!
//! Every interaction with version control goes through the [`GitRunner`]
//! trait: run `git` with some arguments in an explicit working directory and
//! collect the exit status and output. The rest of the crate never spawns
//! processes itself and never relies on the process-wide current directory.
//!
//! [`SystemGit`] is the real implementation. It uses the system `git`
//! command, which automatically handles:
//! - SSH keys from ~/.ssh/
//! - Git credential helpers
//! - Personal access tokens
//! - Any authentication configured in ~/.gitconfig
//!
//! Tests substitute a scripted runner so the push logic can be exercised
//! without real repositories.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Captured result of one git invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// The most useful diagnostic text: stderr when present, else stdout.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Narrow capability for running git: `run(args, cwd) -> (status, stdout, stderr)`.
///
/// A non-zero exit status is *not* an error at this level; callers decide
/// what a failure means. `Err` is reserved for the command not running at
/// all (missing executable, timeout).
pub trait GitRunner: Send + Sync {
    fn run(&self, args: &[&str], cwd: &Path) -> Result<CommandOutput>;
}

/// Runs the `git` executable found on `PATH` (or an explicit one).
#[derive(Debug, Clone)]
pub struct SystemGit {
    executable: PathBuf,
    timeout: Option<Duration>,
}

impl SystemGit {
    pub fn new() -> Self {
        Self {
            executable: PathBuf::from("git"),
            timeout: None,
        }
    }

    /// Kill any git invocation that runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new()
    }
}

impl GitRunner for SystemGit {
    fn run(&self, args: &[&str], cwd: &Path) -> Result<CommandOutput> {
        let command_line = format!("git {}", args.join(" "));
        debug!("running `{}` in {}", command_line, cwd.display());

        let child = Command::new(&self.executable)
            .args(args)
            .current_dir(cwd)
            // Never block on an interactive credential prompt
            .env("GIT_TERMINAL_PROMPT", "0")
            // Porcelain and error messages are matched in English
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::GitCommand {
                command: command_line.clone(),
                stderr: e.to_string(),
            })?;

        let output = match self.timeout {
            None => child.wait_with_output()?,
            Some(limit) => wait_with_timeout(child, limit, &command_line)?,
        };

        Ok(output.into())
    }
}

fn wait_with_timeout(mut child: Child, limit: Duration, command: &str) -> Result<Output> {
    // Drain both pipes on their own threads so a chatty child cannot fill a
    // pipe buffer and stall before the deadline.
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_reader = thread::spawn(move || read_pipe(stdout));
    let stderr_reader = thread::spawn(move || read_pipe(stderr));

    let deadline = Instant::now() + limit;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            // The child may have exited between try_wait and kill
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Timeout {
                command: command.to_string(),
                seconds: limit.as_secs(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(Output {
        status,
        stdout: stdout_reader.join().unwrap_or_default(),
        stderr: stderr_reader.join().unwrap_or_default(),
    })
}

fn read_pipe<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buffer);
    }
    buffer
}

/// Run a git command that is expected to succeed and return its trimmed stdout.
pub fn run_checked(runner: &dyn GitRunner, args: &[&str], cwd: &Path) -> Result<String> {
    let output = runner.run(args, cwd)?;
    if !output.success() {
        return Err(Error::GitCommand {
            command: format!("git {}", args.join(" ")),
            stderr: output.diagnostic(),
        });
    }
    Ok(output.stdout.trim().to_string())
}

/// Per-ref status flag from `git push --porcelain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefFlag {
    FastForward,
    Forced,
    Deleted,
    New,
    Rejected,
    UpToDate,
}

impl RefFlag {
    fn from_char(c: char) -> Option<Self> {
        match c {
            ' ' => Some(Self::FastForward),
            '+' => Some(Self::Forced),
            '-' => Some(Self::Deleted),
            '*' => Some(Self::New),
            '!' => Some(Self::Rejected),
            '=' => Some(Self::UpToDate),
            _ => None,
        }
    }
}

/// One ref line of `git push --porcelain` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefStatus {
    pub flag: RefFlag,
    pub from: String,
    pub to: String,
    /// e.g. `[rejected] (non-fast-forward)` or `[up to date]`
    pub summary: String,
}

/// Parse the ref lines of `git push --porcelain` output.
///
/// The format is `<flag> \t <from>:<to> \t <summary>`; the `To <url>` header
/// and the trailing `Done` line are skipped.
pub fn parse_push_porcelain(stdout: &str) -> Vec<RefStatus> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.splitn(3, '\t');
            let flag_field = fields.next()?;
            let refs = fields.next()?;
            let summary = fields.next().unwrap_or("").trim();

            let mut flag_chars = flag_field.chars();
            let flag = RefFlag::from_char(flag_chars.next()?)?;
            if flag_chars.next().is_some() {
                return None;
            }

            let (from, to) = refs.split_once(':').unwrap_or(("", refs));
            Some(RefStatus {
                flag,
                from: from.to_string(),
                to: to.to_string(),
                summary: summary.to_string(),
            })
        })
        .collect()
}
