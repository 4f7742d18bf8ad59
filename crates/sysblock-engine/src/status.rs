//! Status computation and hierarchical roll-up
//!
//! A block's local status is derived from the data it carries. The status
//! shown for a block that owns a child diagram is the worse of its local
//! status and the worst status found anywhere below it. That aggregate is
//! computed on demand and never stored on the block.

use std::collections::HashMap;
use sysblock_model::{Block, BlockId, DiagramPath, Graph, Status};

/// Derive a block's local status from its data
///
/// Each level requires the previous one:
///
/// - `Planned`: name and description non-empty
/// - `In-Work`: at least one link of any kind
/// - `Implemented`: at least one interface and one complete link
/// - `Verified`: the explicit `verified` flag
#[must_use]
pub fn local_status(block: &Block) -> Status {
    let planned = !block.name.trim().is_empty() && !block.description.trim().is_empty();
    if !planned {
        return Status::Placeholder;
    }
    if block.links.is_empty() {
        return Status::Planned;
    }
    if block.interfaces.is_empty() || !block.has_complete_link() {
        return Status::InWork;
    }
    if block.verified {
        Status::Verified
    } else {
        Status::Implemented
    }
}

/// Recompute the stored local status of every block, recursively
///
/// Returns the number of blocks whose status changed.
pub fn refresh_local_statuses(graph: &mut Graph) -> usize {
    let mut changed = 0;
    for block in graph.blocks.values_mut() {
        let status = local_status(block);
        if block.status != status {
            block.status = status;
            changed += 1;
        }
        if let Some(child) = block.child_diagram.as_deref_mut() {
            changed += refresh_local_statuses(child);
        }
    }
    changed
}

/// Worst stored status among all blocks of `graph` and its descendants
#[must_use]
pub fn worst_status(graph: &Graph) -> Option<Status> {
    graph
        .blocks
        .values()
        .map(|block| {
            let below = block.child_diagram.as_deref().and_then(worst_status);
            below.map_or(block.status, |w| w.min(block.status))
        })
        .min()
}

/// Effective (displayed) status of every block in a graph tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusRollup {
    effective: HashMap<DiagramPath, HashMap<BlockId, Status>>,
}

impl StatusRollup {
    /// Effective status of a block in the diagram at `scope`
    #[must_use]
    pub fn effective(&self, scope: &DiagramPath, id: &BlockId) -> Option<Status> {
        self.effective.get(scope)?.get(id).copied()
    }

    /// Effective status of a block in the root diagram
    #[inline]
    #[must_use]
    pub fn root(&self, id: &BlockId) -> Option<Status> {
        self.effective(&DiagramPath::root(), id)
    }

    /// Worst effective status in the root diagram
    #[must_use]
    pub fn overall(&self) -> Option<Status> {
        self.effective.get(&DiagramPath::root())?.values().copied().min()
    }

    /// Number of blocks covered
    #[must_use]
    pub fn len(&self) -> usize {
        self.effective.values().map(HashMap::len).sum()
    }

    /// Whether no block is covered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every `(scope, block, effective status)` triple
    pub fn iter(&self) -> impl Iterator<Item = (&DiagramPath, &BlockId, Status)> {
        self.effective
            .iter()
            .flat_map(|(scope, blocks)| blocks.iter().map(move |(id, s)| (scope, id, *s)))
    }
}

/// Compute effective statuses bottom-up for the whole tree
#[must_use]
pub fn roll_up(graph: &Graph) -> StatusRollup {
    let mut rollup = StatusRollup::default();
    roll_up_into(graph, DiagramPath::root(), &mut rollup);
    rollup
}

fn roll_up_into(graph: &Graph, scope: DiagramPath, rollup: &mut StatusRollup) {
    let mut level = HashMap::with_capacity(graph.blocks.len());
    for (id, block) in &graph.blocks {
        let effective = match block.child_diagram.as_deref() {
            Some(child) => {
                roll_up_into(child, scope.child(id.clone()), rollup);
                worst_status(child).map_or(block.status, |w| w.min(block.status))
            }
            None => block.status,
        };
        level.insert(id.clone(), effective);
    }
    rollup.effective.insert(scope, level);
}
