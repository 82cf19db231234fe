//! Discovery of nested subtrees
//!
//! Starting from the subtrees the main repository declares, this phase
//! looks inside each subtree directory for further declarations and
//! recurses, building a [`SubtreeForest`].
//!
//! ## Where nested declarations live
//!
//! A subtree directory is merged content, not a checkout, so its own git
//! metadata does not survive the merge. Nested subtrees are therefore
//! declared in a tracked `.gitsubtrees` manifest at the root of the
//! directory that contains them. If the directory happens to be a
//! freestanding checkout, its git configuration is read as well, with the
//! manifest taking precedence.
//!
//! Manifests and directory existence are read from the checked-out work
//! tree, even when a different branch is being pushed. `git subtree split`
//! reads that branch's history, so the two agree only when the pushed
//! branch is the one checked out.
//!
//! ## Robustness
//!
//! - The canonical absolute path of every directory on the current
//!   recursion stack is tracked. A declaration that resolves back onto the
//!   stack (a symlink loop, a `.` path) is dropped and recorded as a
//!   `CyclicSubtreeConfig` issue.
//! - Recursion stops at the configured maximum depth with a
//!   `DepthLimitExceeded` issue.
//! - A directory that does not exist simply has no children; pushing it
//!   later reports the missing path.
//!
//! None of these abort discovery of other branches.

use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::{DiscoveryIssue, IssueKind, SubtreeForest, SubtreeNode};
use crate::config::{self, Settings, SubtreeRecord};
use crate::error::{Error, Result};
use crate::probe::RepositoryProbe;

/// Records declared by the main repository: its git configuration first,
/// then the tracked manifest at the work tree root.
///
/// A manifest that cannot be read is recorded as an issue rather than
/// failing the run.
pub fn root_records(
    probe: &RepositoryProbe,
    root: &Path,
    config_text: &str,
    settings: &Settings,
    issues: &mut Vec<DiscoveryIssue>,
) -> Vec<SubtreeRecord> {
    let from_config = config::discover(config_text, &settings.default_branch);
    match probe.read_manifest(root) {
        Ok(Some(text)) => {
            config::merge_records(from_config, config::discover(&text, &settings.default_branch))
        }
        Ok(None) => from_config,
        Err(e) => {
            warn!("could not read subtree manifest in {}: {}", root.display(), e);
            issues.push(DiscoveryIssue::new(".", IssueKind::Unreadable, &e));
            from_config
        }
    }
}

/// Records declared inside one subtree directory.
fn scope_records(
    probe: &RepositoryProbe,
    dir: &Path,
    default_branch: &str,
) -> Result<Vec<SubtreeRecord>> {
    let mut records = match probe.read_manifest(dir)? {
        Some(text) => config::discover(&text, default_branch),
        None => Vec::new(),
    };

    if probe.is_standalone_checkout(dir) {
        let text = probe.read_config_text(dir)?;
        records = config::merge_records(records, config::discover(&text, default_branch));
    }

    Ok(records)
}

/// Join a declared path onto the repository-relative path of its parent.
fn join_path(parent: Option<&str>, relative: &str) -> String {
    match parent {
        None => relative.to_string(),
        Some(parent) if relative == "." => parent.to_string(),
        Some(parent) => format!("{}/{}", parent, relative),
    }
}

struct Walker<'a> {
    probe: &'a RepositoryProbe<'a>,
    root: &'a Path,
    settings: &'a Settings,
    /// Canonical directory and repository-relative label of every scope
    /// currently being discovered
    stack: Vec<(PathBuf, String)>,
    issues: Vec<DiscoveryIssue>,
}

impl Walker<'_> {
    fn discover_node(
        &mut self,
        record: SubtreeRecord,
        parent: Option<&str>,
        depth: usize,
    ) -> Option<SubtreeNode> {
        let repo_path = join_path(parent, &record.path);
        let relative_path = record.path.clone();
        let mut node = SubtreeNode::new(
            SubtreeRecord {
                path: repo_path.clone(),
                ..record
            },
            relative_path,
            depth,
        );

        let dir = self.root.join(&repo_path);
        if !dir.is_dir() {
            debug!("{} is not a directory; no nested discovery", dir.display());
            return Some(node);
        }

        let canonical = match dir.canonicalize() {
            Ok(path) => path,
            Err(e) => {
                let error = Error::from(e);
                warn!("cannot resolve {}: {}", dir.display(), error);
                self.issues
                    .push(DiscoveryIssue::new(&repo_path, IssueKind::Unreadable, &error));
                return Some(node);
            }
        };

        if let Some(start) = self.stack.iter().position(|(path, _)| *path == canonical) {
            let mut cycle: Vec<&str> = self.stack[start..]
                .iter()
                .map(|(_, label)| label.as_str())
                .collect();
            cycle.push(&repo_path);
            let error = Error::CyclicSubtreeConfig {
                cycle: cycle.join(" -> "),
            };
            warn!("{}", error);
            self.issues
                .push(DiscoveryIssue::new(&repo_path, IssueKind::Cycle, &error));
            return None;
        }

        let children = match scope_records(self.probe, &dir, &self.settings.default_branch) {
            Ok(children) => children,
            Err(e) => {
                warn!("could not read nested subtrees of {}: {}", repo_path, e);
                self.issues
                    .push(DiscoveryIssue::new(&repo_path, IssueKind::Unreadable, &e));
                return Some(node);
            }
        };

        if children.is_empty() {
            return Some(node);
        }

        if depth + 1 >= self.settings.max_depth {
            let error = Error::DepthLimitExceeded {
                path: repo_path.clone(),
                max_depth: self.settings.max_depth,
            };
            warn!("{}", error);
            self.issues
                .push(DiscoveryIssue::new(&repo_path, IssueKind::DepthLimit, &error));
            return Some(node);
        }

        debug!(
            "{} declares {} nested subtree(s) at depth {}",
            repo_path,
            children.len(),
            depth + 1
        );

        self.stack.push((canonical, repo_path.clone()));
        for child in children {
            if let Some(child) = self.discover_node(child, Some(&repo_path), depth + 1) {
                node.add_child(child);
            }
        }
        self.stack.pop();

        Some(node)
    }
}

/// Discover the full subtree hierarchy below `root`.
///
/// `top_level` are the records declared by the main repository, in
/// declaration order; the returned forest keeps that order.
pub fn discover_subtrees(
    probe: &RepositoryProbe,
    root: &Path,
    top_level: Vec<SubtreeRecord>,
    settings: &Settings,
) -> SubtreeForest {
    let canonical_root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let mut walker = Walker {
        probe,
        root,
        settings,
        stack: vec![(canonical_root, ".".to_string())],
        issues: Vec::new(),
    };

    let roots = top_level
        .into_iter()
        .filter_map(|record| walker.discover_node(record, None, 0))
        .collect();

    SubtreeForest {
        roots,
        issues: walker.issues,
    }
}
