//! # Output Rendering
//!
//! This module decides whether output is coloured and renders the
//! user-facing results of a run: the final push summary and the `--tree`
//! view of the discovered subtree hierarchy.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```rust,ignore
//! use git_rp::output::{render_summary, OutputConfig};
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//! print!("{}", render_summary(&report, &config, false));
//! ```

use std::borrow::Cow;
use std::env;
use std::io;

use console::style;
use ptree::{PrintConfig, TreeItem};

use crate::phases::orchestrator::SyncPlan;
use crate::phases::{PushOrder, PushOutcome, PushReport, SubtreeNode, TargetResult};

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// # Arguments
    /// * `color_flag` - The value of the --color CLI flag: "always", "never", or "auto"
    ///
    /// In auto mode, colors are disabled if:
    /// - `NO_COLOR` environment variable is set (any value, including empty)
    /// - `CLICOLOR=0` is set
    /// - `TERM=dumb` is set
    /// - stdout is not a TTY (unless `CLICOLOR_FORCE=1`)
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    /// Detect whether color output is supported based on environment.
    fn detect_color_support() -> bool {
        // The presence of NO_COLOR (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the emoji when colors are enabled, the plain alternative otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

fn marker(config: &OutputConfig, outcome: &PushOutcome) -> &'static str {
    match outcome {
        PushOutcome::Pushed | PushOutcome::UpToDate => emoji(config, "✅", "[ok]"),
        PushOutcome::SkippedDryRun => emoji(config, "🔍", "[dry]"),
        PushOutcome::Rejected(_) => emoji(config, "⛔", "[rejected]"),
        PushOutcome::Failed(_) => emoji(config, "❌", "[failed]"),
    }
}

fn outcome_text(config: &OutputConfig, outcome: &PushOutcome) -> String {
    let styled = style(outcome.label()).force_styling(config.use_color);
    let styled = match outcome {
        PushOutcome::Pushed | PushOutcome::UpToDate => styled.green(),
        PushOutcome::SkippedDryRun => styled.cyan(),
        PushOutcome::Rejected(_) => styled.yellow(),
        PushOutcome::Failed(_) => styled.red(),
    };
    styled.to_string()
}

fn result_line(config: &OutputConfig, result: &TargetResult, width: usize) -> String {
    let mut line = format!(
        "{} {:<width$}  {} -> {} ({})",
        marker(config, &result.outcome),
        result.label,
        outcome_text(config, &result.outcome),
        result.remote,
        result.branch,
        width = width
    );
    if let Some(reason) = result.outcome.reason() {
        for reason_line in reason.lines() {
            line.push_str("\n      ");
            line.push_str(reason_line);
        }
    }
    line
}

/// Render the final summary of a run.
///
/// Every target is listed (main first, then subtrees in push order),
/// followed by discovery warnings and a totals line. With `quiet` only
/// failed targets are listed.
pub fn render_summary(report: &PushReport, config: &OutputConfig, quiet: bool) -> String {
    let mut out = String::new();
    let width = report
        .results
        .iter()
        .map(|r| r.label.chars().count())
        .max()
        .unwrap_or(0);

    if !quiet {
        let mode = if report.dry_run { " (dry run)" } else { "" };
        let force = if report.force { " (force)" } else { "" };
        out.push_str(&format!(
            "Push summary for branch '{}'{}{}\n",
            report.branch, mode, force
        ));
    }

    for result in &report.results {
        if quiet && result.outcome.is_success() {
            continue;
        }
        out.push_str(&result_line(config, result, width));
        out.push('\n');
    }

    if quiet {
        return out;
    }

    for issue in &report.issues {
        out.push_str(&format!(
            "{} {}: {}\n",
            emoji(config, "⚠️ ", "[warn]"),
            issue.path,
            issue.message
        ));
    }

    let failed = report.failures().count();
    let succeeded = report.results.len() - failed;
    let totals = format!(
        "{} target(s): {} succeeded, {} failed",
        report.results.len(),
        succeeded,
        failed
    );
    let totals = if failed == 0 {
        style(totals).force_styling(config.use_color).green().bold()
    } else {
        style(totals).force_styling(config.use_color).red().bold()
    };
    out.push_str(&format!("{}\n", totals));
    out
}

/// A node of the `--tree` view.
#[derive(Clone)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: io::Write>(&self, f: &mut W, _style: &ptree::Style) -> io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        Cow::Borrowed(&self.children)
    }
}

fn build_tree_node(node: &SubtreeNode, order: &PushOrder) -> TreeNode {
    let position = order
        .position(&node.record)
        .map(|p| format!("#{}", p + 1))
        .unwrap_or_else(|| "-".to_string());
    TreeNode {
        label: format!(
            "{} -> {} ({}) [{}]",
            node.relative_path, node.record.url, node.record.branch, position
        ),
        children: node
            .children
            .iter()
            .map(|child| build_tree_node(child, order))
            .collect(),
    }
}

/// Render the discovered subtree hierarchy, each node annotated with its
/// position in the push order.
pub fn render_tree(plan: &SyncPlan) -> io::Result<String> {
    let root = TreeNode {
        label: format!("{} [{}]", plan.root.display(), plan.branch),
        children: plan
            .forest
            .roots
            .iter()
            .map(|node| build_tree_node(node, &plan.order))
            .collect(),
    };

    let mut buffer = Vec::new();
    ptree::write_tree_with(&root, &mut buffer, &PrintConfig::default())?;
    let mut rendered = String::from_utf8_lossy(&buffer).into_owned();

    for issue in &plan.forest.issues {
        rendered.push_str(&format!("warning: {}: {}\n", issue.path, issue.message));
    }
    Ok(rendered)
}
