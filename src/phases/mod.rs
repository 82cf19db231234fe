//! Implementation of the phases of a recursive subtree push.
//!
//! ## Overview
//!
//! A run moves through these stages:
//! 1. Context - resolve the work tree root, the branch and the configuration
//!    (the only stage whose failures are fatal)
//! 2. Main push - push the branch of the main repository to its remote
//! 3. Discovery - find every configured subtree, recursing into nested
//!    `.gitsubtrees` manifests ([`discovery`])
//! 4. Ordering - flatten the discovered tree so every subtree is pushed
//!    before the subtree that contains it ([`ordering`])
//! 5. Subtree pushes - push each subtree in that order ([`push`])
//! 6. Report - aggregate one outcome per target into a [`PushReport`]
//!
//! [`orchestrator`] drives the stages; each phase depends only on the
//! earlier ones and on the foundation modules (`git`, `probe`, `config`).

use serde::Serialize;

use crate::config::SubtreeRecord;
use crate::error::Error;

// Phase modules
pub mod discovery;
pub mod orchestrator;
pub mod ordering;
pub mod push;

pub use discovery::discover_subtrees;
pub use orchestrator::{execute_push, plan, SyncRequest};
pub use push::{PushOperation, PushOptions};

/// A subtree found during discovery, with the subtrees nested inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtreeNode {
    /// The declared record, with `path` made relative to the main work tree
    pub record: SubtreeRecord,
    /// The path as declared, relative to the enclosing subtree (or the root)
    pub relative_path: String,
    /// 0 for subtrees declared by the main repository
    pub depth: usize,
    pub children: Vec<SubtreeNode>,
}

impl SubtreeNode {
    pub fn new(record: SubtreeRecord, relative_path: String, depth: usize) -> Self {
        Self {
            record,
            relative_path,
            depth,
            children: Vec::new(),
        }
    }

    pub fn add_child(&mut self, child: SubtreeNode) {
        self.children.push(child);
    }

    /// Number of nodes in this subtree, including itself.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(SubtreeNode::count).sum::<usize>()
    }
}

/// What went wrong while discovering one branch of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Cycle,
    DepthLimit,
    Unreadable,
}

/// A non-fatal discovery problem, reported alongside the push outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryIssue {
    /// Repository-relative path where discovery stopped
    pub path: String,
    pub kind: IssueKind,
    pub message: String,
}

impl DiscoveryIssue {
    pub fn new(path: impl Into<String>, kind: IssueKind, error: &Error) -> Self {
        Self {
            path: path.into(),
            kind,
            message: error.to_string(),
        }
    }
}

/// Every subtree discovered from the main repository.
#[derive(Debug, Clone, Default)]
pub struct SubtreeForest {
    /// Top-level subtrees, in declaration order
    pub roots: Vec<SubtreeNode>,
    pub issues: Vec<DiscoveryIssue>,
}

impl SubtreeForest {
    /// Total number of discovered nodes.
    pub fn len(&self) -> usize {
        self.roots.iter().map(SubtreeNode::count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// One subtree push in the flattened order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedPush {
    pub record: SubtreeRecord,
    pub relative_path: String,
    pub depth: usize,
}

impl From<&SubtreeNode> for PlannedPush {
    fn from(node: &SubtreeNode) -> Self {
        Self {
            record: node.record.clone(),
            relative_path: node.relative_path.clone(),
            depth: node.depth,
        }
    }
}

/// Subtree pushes grouped into independent chains.
///
/// Within a chain every subtree precedes the subtrees that contain it.
/// Chains share no ancestor/descendant paths, so they may run concurrently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushOrder {
    pub chains: Vec<Vec<PlannedPush>>,
}

impl PushOrder {
    pub fn new(chains: Vec<Vec<PlannedPush>>) -> Self {
        Self { chains }
    }

    /// All pushes in sequential order.
    pub fn iter(&self) -> impl Iterator<Item = &PlannedPush> {
        self.chains.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.chains.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequential position of the push for `record`, if it is planned.
    pub fn position(&self, record: &SubtreeRecord) -> Option<usize> {
        self.iter().position(|p| p.record == *record)
    }
}

/// Result of pushing one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum PushOutcome {
    /// The remote branch was updated
    Pushed,
    /// The remote already had exactly this commit
    UpToDate,
    /// Dry run: the push would have gone through
    SkippedDryRun,
    /// The remote refused the update (e.g. non-fast-forward)
    Rejected(String),
    /// The push could not be attempted or did not complete
    Failed(String),
}

impl PushOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            PushOutcome::Pushed | PushOutcome::UpToDate | PushOutcome::SkippedDryRun
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            PushOutcome::Pushed => "pushed",
            PushOutcome::UpToDate => "up to date",
            PushOutcome::SkippedDryRun => "would push",
            PushOutcome::Rejected(_) => "rejected",
            PushOutcome::Failed(_) => "failed",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            PushOutcome::Rejected(reason) | PushOutcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Main,
    Subtree,
}

/// The recorded outcome for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetResult {
    /// `main` for the main repository, the repository-relative path otherwise
    pub label: String,
    pub kind: TargetKind,
    /// Remote name (main) or URL (subtree)
    pub remote: String,
    /// Branch updated on the remote
    pub branch: String,
    /// Nesting depth for subtrees
    pub depth: Option<usize>,
    pub outcome: PushOutcome,
}

/// Aggregated result of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub branch: String,
    pub dry_run: bool,
    pub force: bool,
    /// Main repository first, then subtrees in push order
    pub results: Vec<TargetResult>,
    pub issues: Vec<DiscoveryIssue>,
}

impl PushReport {
    /// True when every target pushed, was already up to date, or would push.
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_success())
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &TargetResult> {
        self.results.iter().filter(|r| !r.outcome.is_success())
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization {
            message: e.to_string(),
        })
    }
}
