//! Parent-pointer graph algorithms shared by the menu and authority services.
//!
//! Menus and authorities are stored flat, each record naming its parent. This
//! module turns a flat menu collection into a nested forest (optionally
//! annotated with grant state or pruned to an allowed set), flattens a forest
//! back into `(id, parent)` pairs, and answers "would this re-parenting close
//! a loop?" for either hierarchy.

use crate::models::{MenuEntry, MenuId, MenuNode};
use std::collections::{BTreeSet, HashMap, HashSet};

/// How each node of a built forest is rendered.
#[derive(Debug, Clone, Copy)]
pub enum TreeMode<'a> {
    /// Every entry, no annotation.
    Plain,
    /// Every entry, with `checked = id ∈ granted`.
    Checked(&'a BTreeSet<MenuId>),
    /// Only entries in the allowed set; a disallowed entry drops its whole subtree.
    Filtered(&'a BTreeSet<MenuId>),
}

/// Builds the forest of top-level entries (those without a parent).
pub fn build_tree(entries: &[MenuEntry], mode: TreeMode<'_>) -> Vec<MenuNode> {
    build_tree_from(entries, None, mode)
}

/// build_tree_from
///
/// Builds the forest hanging below `root` (`None` = top level).
///
/// Entries are grouped by parent once, so the build is linear in the input.
/// Siblings are ordered by `sort` ascending; equal keys keep their input
/// order. Entries whose parent never appears are unreachable and left out,
/// and an id is never emitted twice even if the input contains a loop.
pub fn build_tree_from(
    entries: &[MenuEntry],
    root: Option<MenuId>,
    mode: TreeMode<'_>,
) -> Vec<MenuNode> {
    let mut children: HashMap<Option<MenuId>, Vec<&MenuEntry>> = HashMap::new();
    for entry in entries {
        children.entry(entry.parent_id).or_default().push(entry);
    }
    for siblings in children.values_mut() {
        siblings.sort_by_key(|e| e.sort);
    }

    let mut visited = HashSet::new();
    descend(&children, root, mode, &mut visited)
}

fn descend(
    children: &HashMap<Option<MenuId>, Vec<&MenuEntry>>,
    parent: Option<MenuId>,
    mode: TreeMode<'_>,
    visited: &mut HashSet<MenuId>,
) -> Vec<MenuNode> {
    let Some(siblings) = children.get(&parent) else {
        return Vec::new();
    };

    let mut nodes = Vec::with_capacity(siblings.len());
    for entry in siblings {
        let checked = match mode {
            TreeMode::Plain => None,
            TreeMode::Checked(granted) => Some(granted.contains(&entry.id)),
            TreeMode::Filtered(allowed) => {
                if !allowed.contains(&entry.id) {
                    continue;
                }
                None
            }
        };
        if !visited.insert(entry.id) {
            continue;
        }
        nodes.push(MenuNode {
            entry: (*entry).clone(),
            checked,
            children: descend(children, Some(entry.id), mode, visited),
        });
    }
    nodes
}

/// Pre-order walk of a forest collecting `(id, parent_id)` for every node.
pub fn flatten(forest: &[MenuNode]) -> Vec<(MenuId, Option<MenuId>)> {
    let mut out = Vec::new();
    let mut stack: Vec<&MenuNode> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push((node.entry.id, node.entry.parent_id));
        stack.extend(node.children.iter().rev());
    }
    out
}

/// Total node count of a forest.
pub fn count_nodes(forest: &[MenuNode]) -> usize {
    forest.iter().map(|n| 1 + count_nodes(&n.children)).sum()
}

/// introduces_cycle
///
/// Answers whether pointing `node` at `new_parent` would make `node` its own
/// ancestor. `parents` maps every known id to its current parent.
///
/// Walks upward from `new_parent` until the chain ends (no parent, or a
/// parent that does not exist). The walk takes at most `parents.len()` steps;
/// a chain still going after that already loops, and the re-parenting is
/// rejected.
pub fn introduces_cycle(node: i64, new_parent: i64, parents: &HashMap<i64, Option<i64>>) -> bool {
    let mut current = Some(new_parent);
    let mut steps = 0usize;
    while let Some(id) = current {
        if id == node {
            return true;
        }
        if steps > parents.len() {
            return true;
        }
        steps += 1;
        current = parents.get(&id).copied().flatten();
    }
    false
}
