//! Graph documents and hierarchy navigation

use crate::block::Block;
use crate::connection::Connection;
use crate::ids::{BlockId, ConnectionId, RequirementId};
use crate::requirement::Requirement;
use crate::CURRENT_SCHEMA_VERSION;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Document timestamps plus free-form fields
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Last modification time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    /// Any other metadata
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A diagram: blocks, connections and requirements
///
/// Blocks and connections are keyed by id and keep insertion order for
/// stable iteration. In documents they are plain lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    /// Document schema version
    #[serde(default)]
    pub schema_version: String,
    /// Blocks by id
    #[serde(with = "keyed_list")]
    pub blocks: IndexMap<BlockId, Block>,
    /// Connections by id
    #[serde(with = "keyed_list")]
    pub connections: IndexMap<ConnectionId, Connection>,
    /// Attribute requirements
    #[serde(default, deserialize_with = "keyed_list::deserialize_unique")]
    pub requirements: Vec<Requirement>,
    /// Timestamps and free-form metadata
    #[serde(default)]
    pub metadata: Metadata,
}

impl Graph {
    /// Create an empty graph at the current schema version
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION.to_string(),
            blocks: IndexMap::new(),
            connections: IndexMap::new(),
            requirements: Vec::new(),
            metadata: Metadata {
                created: Some(Utc::now()),
                ..Metadata::default()
            },
        }
    }

    /// Look up a block
    #[inline]
    #[must_use]
    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    /// Look up a connection
    #[inline]
    #[must_use]
    pub fn connection(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    /// Look up a requirement
    #[must_use]
    pub fn requirement(&self, id: &RequirementId) -> Option<&Requirement> {
        self.requirements.iter().find(|r| &r.id == id)
    }

    /// Connections with either end on `block`
    pub fn connections_of<'a>(
        &'a self,
        block: &'a BlockId,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.values().filter(move |c| c.touches(block))
    }

    /// Resolve a nested child diagram
    #[must_use]
    pub fn resolve(&self, path: &DiagramPath) -> Option<&Graph> {
        let mut graph = self;
        for id in path.iter() {
            graph = graph.blocks.get(id)?.child_diagram.as_deref()?;
        }
        Some(graph)
    }

    /// Resolve a nested child diagram mutably
    #[must_use]
    pub fn resolve_mut(&mut self, path: &DiagramPath) -> Option<&mut Graph> {
        let mut graph = self;
        for id in path.iter() {
            graph = graph.blocks.get_mut(id)?.child_diagram.as_deref_mut()?;
        }
        Some(graph)
    }

    /// This graph and every nested child diagram, depth-first, parents first
    #[must_use]
    pub fn walk(&self) -> Vec<(DiagramPath, &Graph)> {
        let mut out = Vec::new();
        self.walk_into(DiagramPath::root(), &mut out);
        out
    }

    fn walk_into<'a>(&'a self, path: DiagramPath, out: &mut Vec<(DiagramPath, &'a Graph)>) {
        let children: Vec<(&BlockId, &Graph)> = self
            .blocks
            .iter()
            .filter_map(|(id, b)| b.child_diagram.as_deref().map(|g| (id, g)))
            .collect();
        out.push((path.clone(), self));
        for (id, child) in children {
            child.walk_into(path.child(id.clone()), out);
        }
    }

    /// Number of blocks in this graph and all nested diagrams
    #[must_use]
    pub fn total_block_count(&self) -> usize {
        self.walk().iter().map(|(_, g)| g.blocks.len()).sum()
    }

    /// Semantic equality
    ///
    /// Blocks are compared by id and fingerprint, connections and
    /// requirements by id and full content, child diagrams recursively.
    /// Entity order and presentation-only fields are ignored.
    #[must_use]
    pub fn semantically_eq(&self, other: &Graph) -> bool {
        if self.schema_version != other.schema_version
            || self.metadata != other.metadata
            || self.blocks.len() != other.blocks.len()
            || self.connections.len() != other.connections.len()
            || self.requirements.len() != other.requirements.len()
        {
            return false;
        }

        let blocks_match = self.blocks.iter().all(|(id, a)| {
            other.blocks.get(id).is_some_and(|b| {
                a.fingerprint() == b.fingerprint()
                    && match (&a.child_diagram, &b.child_diagram) {
                        (None, None) => true,
                        (Some(x), Some(y)) => x.semantically_eq(y),
                        _ => false,
                    }
            })
        });
        let connections_match = self
            .connections
            .iter()
            .all(|(id, a)| other.connections.get(id) == Some(a));
        let requirements_match = self
            .requirements
            .iter()
            .all(|a| other.requirement(&a.id) == Some(a));

        blocks_match && connections_match && requirements_match
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

/// Location of a nested diagram: block ids from the root graph downwards
///
/// Held by callers for navigation; entities never point at their parent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiagramPath(Vec<BlockId>);

impl DiagramPath {
    /// The root diagram
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path from a list of block ids
    #[inline]
    #[must_use]
    pub fn new(ids: Vec<BlockId>) -> Self {
        Self(ids)
    }

    /// Whether this is the root diagram
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Nesting depth (0 for the root)
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Path of the child diagram owned by `block`
    #[must_use]
    pub fn child(&self, block: BlockId) -> Self {
        let mut ids = self.0.clone();
        ids.push(block);
        Self(ids)
    }

    /// Block ids from the root downwards
    pub fn iter(&self) -> impl Iterator<Item = &BlockId> {
        self.0.iter()
    }
}

impl fmt::Display for DiagramPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for id in &self.0 {
            write!(f, "/{id}")?;
        }
        Ok(())
    }
}

impl<I: Into<BlockId>> FromIterator<I> for DiagramPath {
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Entities stored in id-keyed maps but exchanged as lists
pub trait Keyed {
    /// Key type
    type Key: Clone + Eq + std::hash::Hash + fmt::Display;

    /// The entity's key
    fn key(&self) -> &Self::Key;
}

impl Keyed for Block {
    type Key = BlockId;

    fn key(&self) -> &BlockId {
        &self.id
    }
}

impl Keyed for Connection {
    type Key = ConnectionId;

    fn key(&self) -> &ConnectionId {
        &self.id
    }
}

impl Keyed for Requirement {
    type Key = RequirementId;

    fn key(&self) -> &RequirementId {
        &self.id
    }
}

mod keyed_list {
    use super::Keyed;
    use indexmap::IndexMap;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub(super) fn serialize<S, V>(map: &IndexMap<V::Key, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Keyed + Serialize,
    {
        serializer.collect_seq(map.values())
    }

    pub(super) fn deserialize<'de, D, V>(deserializer: D) -> Result<IndexMap<V::Key, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Keyed + Deserialize<'de>,
    {
        let items = Vec::<V>::deserialize(deserializer)?;
        let mut map = IndexMap::with_capacity(items.len());
        for item in items {
            let key = item.key().clone();
            if map.contains_key(&key) {
                return Err(D::Error::custom(format!("duplicate id '{key}'")));
            }
            map.insert(key, item);
        }
        Ok(map)
    }

    /// List form kept as a `Vec`, still refusing repeated ids
    pub(super) fn deserialize_unique<'de, D, V>(deserializer: D) -> Result<Vec<V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Keyed + Deserialize<'de>,
    {
        let map: IndexMap<V::Key, V> = deserialize(deserializer)?;
        Ok(map.into_values().collect())
    }
}
