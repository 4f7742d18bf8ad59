//! Snapshots, semantic diffs and undo history
//!
//! A [`Snapshot`] is an immutable deep copy of a graph. [`diff`] compares two
//! snapshots semantically: blocks by id and fingerprint, connections by id
//! and content, nested child diagrams recursively. [`History`] keeps a
//! bounded list of snapshots with a cursor for undo and redo.

use crate::config::EngineConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use sysblock_model::{ArrowDirection, BlockId, ConnectionId, ConnectionType, Endpoint, Graph};
use uuid::Uuid;

/// Point-in-time copy of a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    id: Uuid,
    timestamp: DateTime<Utc>,
    description: String,
    graph: Graph,
}

impl Snapshot {
    /// Snapshot id
    #[inline]
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Creation time
    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Caller-supplied description
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The captured graph
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}

/// Deep-copy `graph` into a new snapshot
#[must_use]
pub fn create_snapshot(graph: &Graph, description: impl Into<String>) -> Snapshot {
    let snapshot = Snapshot {
        id: Uuid::new_v4(),
        timestamp: Utc::now(),
        description: description.into(),
        graph: graph.clone(),
    };
    tracing::info!(
        snapshot = %snapshot.id,
        blocks = graph.total_block_count(),
        "Snapshot created: {}",
        snapshot.description
    );
    snapshot
}

/// What changed about one connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "camelCase")]
pub enum ConnectionChangeKind {
    /// Present only in the newer snapshot
    Added,
    /// Present only in the older snapshot
    Removed,
    /// Signal type changed
    TypeChanged {
        /// Old type
        from: ConnectionType,
        /// New type
        to: ConnectionType,
    },
    /// Arrow direction changed
    DirectionChanged {
        /// Old direction
        from: ArrowDirection,
        /// New direction
        to: ArrowDirection,
    },
    /// One or both endpoints moved
    EndpointsChanged {
        /// Old `(from, to)` endpoints
        from: (Endpoint, Endpoint),
        /// New `(from, to)` endpoints
        to: (Endpoint, Endpoint),
    },
}

/// A classified connection difference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionChange {
    /// Connection id
    pub id: ConnectionId,
    /// What changed
    #[serde(flatten)]
    pub kind: ConnectionChangeKind,
}

/// Semantic difference between two graph states
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    /// Blocks only in the newer state
    pub added_blocks: Vec<BlockId>,
    /// Blocks only in the older state
    pub removed_blocks: Vec<BlockId>,
    /// Blocks whose fingerprint changed or which gained/lost a child diagram
    pub modified_blocks: Vec<BlockId>,
    /// Classified connection differences
    pub connection_changes: Vec<ConnectionChange>,
    /// Differences inside child diagrams present in both states
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub child_diffs: BTreeMap<BlockId, DiffResult>,
}

impl DiffResult {
    /// Whether nothing changed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added_blocks.is_empty()
            && self.removed_blocks.is_empty()
            && self.modified_blocks.is_empty()
            && self.connection_changes.is_empty()
            && self.child_diffs.is_empty()
    }
}

/// Compare two snapshots
#[must_use]
pub fn diff(older: &Snapshot, newer: &Snapshot) -> DiffResult {
    diff_graphs(&older.graph, &newer.graph)
}

/// Compare two graphs semantically; position and size never count
#[must_use]
pub fn diff_graphs(older: &Graph, newer: &Graph) -> DiffResult {
    let mut result = DiffResult::default();

    for (id, after) in &newer.blocks {
        let Some(before) = older.block(id) else {
            result.added_blocks.push(id.clone());
            continue;
        };
        match (before.child_diagram.as_deref(), after.child_diagram.as_deref()) {
            (Some(a), Some(b)) => {
                let child = diff_graphs(a, b);
                if !child.is_empty() {
                    result.child_diffs.insert(id.clone(), child);
                }
            }
            (None, None) => {}
            _ => {
                result.modified_blocks.push(id.clone());
                continue;
            }
        }
        if before.fingerprint() != after.fingerprint() {
            result.modified_blocks.push(id.clone());
        }
    }
    result.removed_blocks = older
        .blocks
        .keys()
        .filter(|id| !newer.blocks.contains_key(*id))
        .cloned()
        .collect();

    for (id, after) in &newer.connections {
        let Some(before) = older.connection(id) else {
            result.connection_changes.push(ConnectionChange {
                id: id.clone(),
                kind: ConnectionChangeKind::Added,
            });
            continue;
        };
        let mut push = |kind| {
            result.connection_changes.push(ConnectionChange {
                id: id.clone(),
                kind,
            });
        };
        if before.connection_type != after.connection_type {
            push(ConnectionChangeKind::TypeChanged {
                from: before.connection_type,
                to: after.connection_type,
            });
        }
        if before.arrow_direction != after.arrow_direction {
            push(ConnectionChangeKind::DirectionChanged {
                from: before.arrow_direction,
                to: after.arrow_direction,
            });
        }
        if (before.source(), before.target()) != (after.source(), after.target()) {
            push(ConnectionChangeKind::EndpointsChanged {
                from: (before.source(), before.target()),
                to: (after.source(), after.target()),
            });
        }
    }
    for id in older.connections.keys() {
        if !newer.connections.contains_key(id) {
            result.connection_changes.push(ConnectionChange {
                id: id.clone(),
                kind: ConnectionChangeKind::Removed,
            });
        }
    }

    result
}

/// Bounded snapshot list with an undo/redo cursor
///
/// A new checkpoint discards every snapshot after the cursor, then evicts
/// the oldest snapshots beyond the capacity.
#[derive(Debug, Clone)]
pub struct History {
    snapshots: VecDeque<Snapshot>,
    cursor: Option<usize>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_config(&EngineConfig::default())
    }
}

impl History {
    /// History retaining at most `capacity` snapshots (at least one)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            cursor: None,
            capacity: capacity.max(1),
        }
    }

    /// History sized by `config.history_capacity`
    #[must_use]
    pub fn with_config(config: &EngineConfig) -> Self {
        Self::new(config.history_capacity)
    }

    /// Retention bound
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained snapshots
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether no snapshot is retained
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Snapshot the graph and move the cursor to it
    pub fn checkpoint(&mut self, graph: &Graph, description: impl Into<String>) -> &Snapshot {
        if let Some(cursor) = self.cursor {
            let discarded = self.snapshots.len() - (cursor + 1);
            if discarded > 0 {
                tracing::debug!(discarded, "Dropping redo tail");
                self.snapshots.truncate(cursor + 1);
            }
        }
        self.snapshots.push_back(create_snapshot(graph, description));
        while self.snapshots.len() > self.capacity {
            if let Some(evicted) = self.snapshots.pop_front() {
                tracing::warn!(
                    snapshot = %evicted.id,
                    capacity = self.capacity,
                    "Evicting oldest snapshot: {}",
                    evicted.description
                );
            }
        }
        let last = self.snapshots.len() - 1;
        self.cursor = Some(last);
        &self.snapshots[last]
    }

    /// Snapshot at the cursor
    #[must_use]
    pub fn current(&self) -> Option<&Snapshot> {
        self.snapshots.get(self.cursor?)
    }

    /// Position of the cursor
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Whether an older snapshot exists
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0)
    }

    /// Whether a newer snapshot exists
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor.is_some_and(|c| c + 1 < self.snapshots.len())
    }

    /// Step back one snapshot
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if !self.can_undo() {
            return None;
        }
        let cursor = self.cursor? - 1;
        self.cursor = Some(cursor);
        self.snapshots.get(cursor)
    }

    /// Step forward one snapshot
    pub fn redo(&mut self) -> Option<&Snapshot> {
        if !self.can_redo() {
            return None;
        }
        let cursor = self.cursor? + 1;
        self.cursor = Some(cursor);
        self.snapshots.get(cursor)
    }

    /// Move the cursor to the snapshot with `id`
    pub fn jump_to(&mut self, id: Uuid) -> Option<&Snapshot> {
        let index = self.snapshots.iter().position(|s| s.id == id)?;
        self.cursor = Some(index);
        self.snapshots.get(index)
    }

    /// Retained snapshots, oldest first
    pub fn list(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }
}
