//! Transform System
//!
//! Propagates world matrices down the node hierarchy. Works on the node table
//! alone so callers can hold other parts of the scene while it runs.

use arbor_core::{HandleTable, NodeHandle};
use glam::Affine3A;

use crate::node::Node;

/// Recomputes the world matrices of `root` and its whole subtree, and raises the
/// sticky transform flag on every visited node.
///
/// Uses an explicit stack so deep hierarchies cannot overflow the call stack.
pub fn update_subtree(nodes: &mut HandleTable<NodeHandle, Node>, root: NodeHandle) {
    let Some(node) = nodes.get(root) else {
        return;
    };
    let parent_world = node
        .parent
        .and_then(|p| nodes.get(p))
        .map_or(Affine3A::IDENTITY, |p| p.transform.world_matrix);

    let mut stack: Vec<(NodeHandle, Affine3A)> = Vec::with_capacity(64);
    stack.push((root, parent_world));

    while let Some((handle, parent_world)) = stack.pop() {
        let Some(node) = nodes.get_mut(handle) else {
            continue;
        };

        node.transform.update_local_matrix();
        let world = parent_world * node.transform.local_matrix;
        node.transform.set_world_matrix(world);
        node.trans_flag = true;

        // Reverse so children are processed in insertion order.
        for &child in node.children.iter().rev() {
            stack.push((child, world));
        }
    }
}

/// Handles of `root` and all its descendants in depth-first pre-order.
#[must_use]
pub fn collect_subtree(nodes: &HandleTable<NodeHandle, Node>, root: NodeHandle) -> Vec<NodeHandle> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(handle) = stack.pop() {
        if let Some(node) = nodes.get(handle) {
            out.push(handle);
            stack.extend(node.children.iter().rev().copied());
        }
    }
    out
}

/// Returns `true` if `ancestor` is `node` or one of its ancestors.
#[must_use]
pub fn is_ancestor(nodes: &HandleTable<NodeHandle, Node>, ancestor: NodeHandle, node: NodeHandle) -> bool {
    let mut current = Some(node);
    while let Some(handle) = current {
        if handle == ancestor {
            return true;
        }
        current = nodes.get(handle).and_then(|n| n.parent);
    }
    false
}
