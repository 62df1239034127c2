//! The `<sco-pe>` element: event interception, request lifecycle and
//! response merging.

pub mod action;
pub mod assets;
pub mod events;
pub mod lifecycle;
pub mod merge;
pub mod registry;

use crate::dom::{Dom, NodeId};

pub const SCOPE_TAG: &str = "sco-pe";
pub(crate) const LOADING_CLASS: &str = "scope-loading";
pub(crate) const LOADED_CLASS: &str = "scope-loaded";

pub(crate) fn is_scope(dom: &Dom, node: NodeId) -> bool {
    dom.is_tag(node, SCOPE_TAG)
}

/// Nearest inclusive ancestor that is a scope.
pub(crate) fn enclosing_scope(dom: &Dom, node: NodeId) -> Option<NodeId> {
    let mut cursor = Some(node);
    while let Some(current) = cursor {
        if is_scope(dom, current) {
            return Some(current);
        }
        cursor = dom.parent(current);
    }
    None
}

/// Connected scopes in document order.
pub(crate) fn connected_scopes(dom: &Dom) -> Vec<NodeId> {
    dom.descendants(dom.root())
        .into_iter()
        .filter(|node| is_scope(dom, *node))
        .collect()
}

/// Label used in trace lines: `#id` when present, else the arena index.
pub(crate) fn scope_label(dom: &Dom, scope: NodeId) -> String {
    match dom.attr(scope, "id").filter(|id| !id.is_empty()) {
        Some(id) => format!("#{id}"),
        None => format!("{SCOPE_TAG}@{}", scope.index()),
    }
}
