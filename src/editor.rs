//! Component tree editor — structural mutations over the draft tree.
//!
//! DESIGN
//! ======
//! All five operations share the same walk shape: scan the sibling list,
//! recurse into `children`, and stop at the first matching id (ids are
//! unique tree-wide, so the first match is the only match). Every operation
//! is total over `(tree, id)` — an unknown id is a silent no-op, never an
//! error, because the UI cannot normally produce a dangling id.
//!
//! The tree is mutated through `&mut`, so exclusivity guarantees readers
//! never observe a half-applied operation. Only the path from the root to
//! the mutated level is touched; siblings outside it are left alone.

use std::collections::HashSet;

use uuid::Uuid;

use crate::draft::{ComponentNode, Props};

#[cfg(test)]
#[path = "editor_test.rs"]
mod tests;

// =============================================================================
// CONTAINER KINDS
// =============================================================================

/// The set of component kinds allowed to hold children. Insert targeting is
/// only honored for these kinds.
#[derive(Debug, Clone)]
pub struct ContainerKinds(HashSet<String>);

impl ContainerKinds {
    pub fn new<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(kinds.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.0.contains(kind)
    }
}

impl Default for ContainerKinds {
    fn default() -> Self {
        Self::new(["Container", "Card"])
    }
}

// =============================================================================
// INSERT
// =============================================================================

/// Insert `node` into the tree. With a target id, the node is appended to
/// that node's `children` (searched at any depth); without one, or when the
/// target id is absent, it is appended to the root-level list.
///
/// Eligibility of the target (container kind, currently selected) is the
/// caller's concern — see [`crate::session::BuilderSession::insert_from_palette`].
pub fn insert_into(nodes: &mut Vec<ComponentNode>, node: ComponentNode, target: Option<Uuid>) {
    let node = match target {
        Some(id) => match append_child(nodes, id, node) {
            Ok(()) => return,
            Err(returned) => returned,
        },
        None => node,
    };
    nodes.push(node);
}

/// Append `node` to the children of the node with `target` id. Hands the
/// node back if the target is not in this subtree.
fn append_child(
    nodes: &mut [ComponentNode],
    target: Uuid,
    mut node: ComponentNode,
) -> Result<(), ComponentNode> {
    for candidate in nodes {
        if candidate.id == target {
            candidate.children.push(node);
            return Ok(());
        }
        match append_child(&mut candidate.children, target, node) {
            Ok(()) => return Ok(()),
            Err(returned) => node = returned,
        }
    }
    Err(node)
}

// =============================================================================
// UPDATE
// =============================================================================

/// Merge `patch` into the props of the node with `target` id: patch keys
/// overwrite, all other keys are untouched. Returns a snapshot of the
/// updated node so the caller can refresh a selection, or `None` if the id
/// is absent.
pub fn update_props(
    nodes: &mut [ComponentNode],
    target: Uuid,
    patch: &Props,
) -> Option<ComponentNode> {
    for node in nodes {
        if node.id == target {
            for (key, value) in patch {
                node.props.insert(key.clone(), value.clone());
            }
            return Some(node.clone());
        }
        if let Some(updated) = update_props(&mut node.children, target, patch) {
            return Some(updated);
        }
    }
    None
}

// =============================================================================
// DELETE
// =============================================================================

/// Remove the node with `target` id from wherever it occurs, at any depth.
/// Returns whether a node was removed.
pub fn delete(nodes: &mut Vec<ComponentNode>, target: Uuid) -> bool {
    if let Some(pos) = nodes.iter().position(|n| n.id == target) {
        nodes.remove(pos);
        return true;
    }
    for node in nodes {
        if delete(&mut node.children, target) {
            return true;
        }
    }
    false
}

// =============================================================================
// MOVE
// =============================================================================

/// Swap the node with `target` id with its previous sibling. Already-first
/// nodes stay put. Returns whether the id was found (moved or not).
pub fn move_up(nodes: &mut Vec<ComponentNode>, target: Uuid) -> bool {
    if let Some(pos) = nodes.iter().position(|n| n.id == target) {
        if pos > 0 {
            nodes.swap(pos, pos - 1);
        }
        return true;
    }
    for node in nodes {
        if move_up(&mut node.children, target) {
            return true;
        }
    }
    false
}

/// Swap the node with `target` id with its next sibling. Already-last nodes
/// stay put. Returns whether the id was found (moved or not).
pub fn move_down(nodes: &mut Vec<ComponentNode>, target: Uuid) -> bool {
    if let Some(pos) = nodes.iter().position(|n| n.id == target) {
        if pos + 1 < nodes.len() {
            nodes.swap(pos, pos + 1);
        }
        return true;
    }
    for node in nodes {
        if move_down(&mut node.children, target) {
            return true;
        }
    }
    false
}

// =============================================================================
// LOOKUP
// =============================================================================

/// Find a node by id at any depth.
#[must_use]
pub fn find(nodes: &[ComponentNode], target: Uuid) -> Option<&ComponentNode> {
    for node in nodes {
        if node.id == target {
            return Some(node);
        }
        if let Some(found) = find(&node.children, target) {
            return Some(found);
        }
    }
    None
}

/// Collect every id in the tree, depth-first.
#[must_use]
pub fn collect_ids(nodes: &[ComponentNode]) -> Vec<Uuid> {
    fn walk(nodes: &[ComponentNode], out: &mut Vec<Uuid>) {
        for node in nodes {
            out.push(node.id);
            walk(&node.children, out);
        }
    }

    let mut out = Vec::new();
    walk(nodes, &mut out);
    out
}
