//! Orchestrator for a complete recursive push
//!
//! Drives the stages described in [`crate::phases`]:
//!
//! ```text
//! Init -> BranchResolved -> MainPushed -> SubtreesEnumerated -> SubtreesPushed -> Done
//! ```
//!
//! Only the transition out of `Init` can fail: if the work tree, branch or
//! configuration cannot be determined the run is aborted with an error.
//! Everything after that is recorded in the [`PushReport`] and the run
//! always reaches `Done`.

use std::fmt;
use std::path::PathBuf;

use log::debug;
use rayon::prelude::*;

use super::push::{PushOperation, PushOptions};
use super::{
    discovery, ordering, PlannedPush, PushOrder, PushReport, SubtreeForest, TargetKind,
    TargetResult,
};
use crate::config::{Settings, SettingsOverrides};
use crate::error::Result;
use crate::git::GitRunner;
use crate::probe::RepositoryProbe;

/// Everything needed to start a run.
#[derive(Debug, Clone, Default)]
pub struct SyncRequest {
    /// Any directory inside the main work tree
    pub work_dir: PathBuf,
    /// Branch to push; the checked-out branch when `None`
    pub branch: Option<String>,
    pub options: PushOptions,
    pub overrides: SettingsOverrides,
    /// Push independent subtree chains concurrently
    pub parallel: bool,
}

impl SyncRequest {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    BranchResolved,
    MainPushed,
    SubtreesEnumerated,
    SubtreesPushed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::BranchResolved => "branch resolved",
            Stage::MainPushed => "main pushed",
            Stage::SubtreesEnumerated => "subtrees enumerated",
            Stage::SubtreesPushed => "subtrees pushed",
        };
        f.write_str(name)
    }
}

/// What the run operates on, established before anything is pushed.
struct Context {
    root: PathBuf,
    branch: String,
    config_text: String,
    settings: Settings,
}

fn resolve_context(probe: &RepositoryProbe, request: &SyncRequest) -> Result<Context> {
    let root = probe.work_tree_root(&request.work_dir)?;
    let branch = match &request.branch {
        Some(branch) => branch.clone(),
        None => probe.current_branch(&root)?,
    };
    let config_text = probe.read_config_text(&root)?;
    let settings = Settings::from_config_text(&config_text).with_overrides(&request.overrides);
    debug!(
        "{}: '{}' in {} (remote '{}', max depth {})",
        Stage::BranchResolved,
        branch,
        root.display(),
        settings.remote,
        settings.max_depth
    );

    Ok(Context {
        root,
        branch,
        config_text,
        settings,
    })
}

fn enumerate(probe: &RepositoryProbe, context: &Context) -> (SubtreeForest, PushOrder) {
    let mut issues = Vec::new();
    let top_level = discovery::root_records(
        probe,
        &context.root,
        &context.config_text,
        &context.settings,
        &mut issues,
    );
    let mut forest =
        discovery::discover_subtrees(probe, &context.root, top_level, &context.settings);
    issues.append(&mut forest.issues);
    forest.issues = issues;

    let order = ordering::execute(&forest);
    debug!(
        "{}: {} subtree(s) in {} chain(s), {} issue(s)",
        Stage::SubtreesEnumerated,
        order.len(),
        order.chains.len(),
        forest.issues.len()
    );
    (forest, order)
}

/// The discovered hierarchy and push order, without pushing anything.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub root: PathBuf,
    pub branch: String,
    pub settings: Settings,
    pub forest: SubtreeForest,
    pub order: PushOrder,
}

/// Resolve the context and discover every subtree, issuing no pushes.
pub fn plan(runner: &dyn GitRunner, request: &SyncRequest) -> Result<SyncPlan> {
    let probe = RepositoryProbe::new(runner);
    let context = resolve_context(&probe, request)?;
    let (forest, order) = enumerate(&probe, &context);
    Ok(SyncPlan {
        root: context.root,
        branch: context.branch,
        settings: context.settings,
        forest,
        order,
    })
}

fn subtree_result(operation: &PushOperation, planned: &PlannedPush, branch: &str) -> TargetResult {
    TargetResult {
        label: planned.record.path.clone(),
        kind: TargetKind::Subtree,
        remote: planned.record.url.clone(),
        branch: planned.record.branch.clone(),
        depth: Some(planned.depth),
        outcome: operation.push_subtree(&planned.record, branch),
    }
}

fn push_chain(operation: &PushOperation, chain: &[PlannedPush], branch: &str) -> Vec<TargetResult> {
    chain
        .iter()
        .map(|planned| subtree_result(operation, planned, branch))
        .collect()
}

/// Execute a complete recursive push.
///
/// Returns `Err` only when the repository or branch cannot be determined.
/// Per-target failures are recorded in the returned report.
pub fn execute_push(runner: &dyn GitRunner, request: &SyncRequest) -> Result<PushReport> {
    let probe = RepositoryProbe::new(runner);
    let context = resolve_context(&probe, request)?;
    let operation = PushOperation::new(runner, &context.root, request.options);

    // The main push result never prevents the subtree pushes
    let main_outcome = operation.push_main(&context.settings.remote, &context.branch);
    let mut results = vec![TargetResult {
        label: "main".to_string(),
        kind: TargetKind::Main,
        remote: context.settings.remote.clone(),
        branch: context.branch.clone(),
        depth: None,
        outcome: main_outcome,
    }];
    debug!("{}", Stage::MainPushed);

    let (forest, order) = enumerate(&probe, &context);

    let pushed: Vec<Vec<TargetResult>> = if request.parallel && order.chains.len() > 1 {
        order
            .chains
            .par_iter()
            .map(|chain| push_chain(&operation, chain, &context.branch))
            .collect()
    } else {
        order
            .chains
            .iter()
            .map(|chain| push_chain(&operation, chain, &context.branch))
            .collect()
    };
    results.extend(pushed.into_iter().flatten());
    debug!("{}", Stage::SubtreesPushed);

    Ok(PushReport {
        branch: context.branch,
        dry_run: request.options.dry_run,
        force: request.options.force,
        results,
        issues: forest.issues,
    })
}
