//! Push ordering
//!
//! Flattens the discovered [`SubtreeForest`] into a [`PushOrder`] in which
//! every subtree comes before any subtree whose directory contains it.
//! Pushing inner subtrees first means that by the time an outer subtree is
//! split and pushed, the content it carries for its nested subtrees has
//! already reached their own remotes.
//!
//! ## Process
//!
//! 1. **Post-order traversal**: children are visited before their parent.
//! 2. **Path containment**: declarations in the same scope may themselves be
//!    nested by path (`lib` and `lib/inner` both declared by the main
//!    repository). Such a sibling is treated as contained by the deepest
//!    sibling whose path is a component-wise prefix of its own, so it is
//!    also pushed first.
//! 3. **Visited tracking**: a declaration is pushed at most once. Repeats of
//!    the same path, remote and branch collapse into one push; a path
//!    declared again with a different remote or branch is pushed once per
//!    distinct declaration.
//!
//! Each outermost subtree and everything it contains forms one chain.
//! Chains share no ancestor/descendant paths and can be pushed
//! concurrently; within a chain the order is strict.

use std::collections::HashSet;
use std::path::Path;

use super::{PlannedPush, PushOrder, SubtreeForest, SubtreeNode};
use crate::config::SubtreeRecord;

/// True when `inner` lies strictly inside `outer`, compared by component.
fn contains(outer: &str, inner: &str) -> bool {
    outer != inner && Path::new(inner).starts_with(Path::new(outer))
}

/// Items of `group` not contained by any other item, in original order.
fn outermost<'a>(group: &[&'a SubtreeNode]) -> Vec<&'a SubtreeNode> {
    group
        .iter()
        .filter(|node| {
            !group
                .iter()
                .any(|other| contains(&other.record.path, &node.record.path))
        })
        .copied()
        .collect()
}

/// Append `group` to `order` so that contained paths come first.
fn flatten_group(
    group: &[&SubtreeNode],
    order: &mut Vec<PlannedPush>,
    visited: &mut HashSet<SubtreeRecord>,
) {
    for top in outermost(group) {
        flatten_node(top, group, order, visited);
    }
}

/// Append `node`, preceded by everything it contains: its own children,
/// the children of group members declared at the same path, and any
/// members of its sibling `group` that lie inside its path.
fn flatten_node(
    node: &SubtreeNode,
    group: &[&SubtreeNode],
    order: &mut Vec<PlannedPush>,
    visited: &mut HashSet<SubtreeRecord>,
) {
    let path = &node.record.path;
    if visited.contains(&node.record) {
        return;
    }

    let same_path_children = group
        .iter()
        .filter(|other| other.record.path == *path)
        .flat_map(|other| other.children.iter());
    let mut inner: Vec<&SubtreeNode> = node.children.iter().collect();
    for child in same_path_children {
        if !inner.iter().any(|n| std::ptr::eq(*n, child)) {
            inner.push(child);
        }
    }
    inner.extend(
        group
            .iter()
            .copied()
            .filter(|other| contains(path, &other.record.path)),
    );
    flatten_group(&inner, order, visited);

    // An identical declaration of an inner path may have been pushed by now
    if visited.insert(node.record.clone()) {
        order.push(PlannedPush::from(node));
    }
}

/// Compute the push order for a discovered forest.
pub fn execute(forest: &SubtreeForest) -> PushOrder {
    let roots: Vec<&SubtreeNode> = forest.roots.iter().collect();
    let mut visited = HashSet::new();
    let mut chains = Vec::new();

    for top in outermost(&roots) {
        let mut chain = Vec::new();
        flatten_node(top, &roots, &mut chain, &mut visited);
        if !chain.is_empty() {
            chains.push(chain);
        }
    }

    PushOrder::new(chains)
}
