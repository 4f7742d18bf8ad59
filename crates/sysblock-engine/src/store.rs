//! Graph store
//!
//! [`GraphStore`] owns one [`Graph`] and is the only place entities are
//! created, changed or removed. Every mutation checks the invariants it
//! touches before changing anything, so a failed call leaves the graph
//! exactly as it was. After a successful mutation the modification time is
//! stamped, the touched block's local status is recomputed and the status
//! roll-up is refreshed.
//!
//! Nested child diagrams are edited through [`GraphStore::scoped`], which
//! applies the same checks inside the diagram at a [`DiagramPath`].

use crate::error::{EngineError, EngineResult};
use crate::migrate::migrate;
use crate::status::{local_status, refresh_local_statuses, roll_up, StatusRollup};
use crate::validation::structural_errors;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use sysblock_model::{
    ArrowDirection, Block, BlockId, BlockType, CanvasPoint, CanvasSize, Connection, ConnectionId,
    ConnectionType, DiagramPath, Endpoint, Graph, Link, Port, Requirement, RequirementId, Status,
};

/// Everything needed to create a block
#[derive(Debug, Clone, Default)]
pub struct BlockSpec {
    /// Explicit id; a random one is generated when unset
    pub id: Option<BlockId>,
    /// Display name
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Engineering discipline
    pub block_type: BlockType,
    /// Initial attributes
    pub attributes: BTreeMap<String, String>,
    /// Declared interfaces
    pub interfaces: Vec<Port>,
    /// External links
    pub links: Vec<Link>,
    /// External verification flag
    pub verified: bool,
    /// Nested sub-diagram
    pub child_diagram: Option<Graph>,
    /// Canvas position
    pub position: Option<CanvasPoint>,
    /// Canvas size
    pub size: Option<CanvasSize>,
}

impl BlockSpec {
    /// Spec for a named block of the given type
    #[must_use]
    pub fn new(name: impl Into<String>, block_type: BlockType) -> Self {
        Self {
            name: name.into(),
            block_type,
            ..Self::default()
        }
    }

    /// With explicit id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<BlockId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// With description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With one attribute
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// With one port
    #[must_use]
    pub fn with_port(mut self, port: Port) -> Self {
        self.interfaces.push(port);
        self
    }

    /// With one link
    #[must_use]
    pub fn with_link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }

    /// With verification flag
    #[must_use]
    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }

    /// With nested sub-diagram
    #[must_use]
    pub fn with_child_diagram(mut self, child: Graph) -> Self {
        self.child_diagram = Some(child);
        self
    }
}

/// Field changes for [`ScopedStore::update_block`]; unset fields are kept
#[derive(Debug, Clone, Default)]
pub struct BlockUpdate {
    /// New name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New type
    pub block_type: Option<BlockType>,
    /// New verification flag
    pub verified: Option<bool>,
    /// Replacement attribute map, applied before `attribute_edits`
    pub attributes: Option<BTreeMap<String, String>>,
    /// Per-key edits; `None` removes the key
    pub attribute_edits: Vec<(String, Option<String>)>,
    /// Replacement interface list
    pub interfaces: Option<Vec<Port>>,
    /// Replacement link list
    pub links: Option<Vec<Link>>,
    /// `Some(None)` discards the child diagram
    pub child_diagram: Option<Option<Graph>>,
    /// New canvas position
    pub position: Option<CanvasPoint>,
    /// New canvas size
    pub size: Option<CanvasSize>,
}

impl BlockUpdate {
    /// Empty update
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set name
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set description
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set type
    #[must_use]
    pub fn block_type(mut self, block_type: BlockType) -> Self {
        self.block_type = Some(block_type);
        self
    }

    /// Set verification flag
    #[must_use]
    pub fn verified(mut self, verified: bool) -> Self {
        self.verified = Some(verified);
        self
    }

    /// Set one attribute
    #[must_use]
    pub fn set_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attribute_edits.push((key.into(), Some(value.into())));
        self
    }

    /// Remove one attribute
    #[must_use]
    pub fn remove_attribute(mut self, key: impl Into<String>) -> Self {
        self.attribute_edits.push((key.into(), None));
        self
    }

    /// Replace interfaces
    #[must_use]
    pub fn interfaces(mut self, interfaces: Vec<Port>) -> Self {
        self.interfaces = Some(interfaces);
        self
    }

    /// Replace links
    #[must_use]
    pub fn links(mut self, links: Vec<Link>) -> Self {
        self.links = Some(links);
        self
    }

    /// Attach or replace the child diagram
    #[must_use]
    pub fn child_diagram(mut self, child: Graph) -> Self {
        self.child_diagram = Some(Some(child));
        self
    }

    /// Discard the child diagram
    #[must_use]
    pub fn without_child_diagram(mut self) -> Self {
        self.child_diagram = Some(None);
        self
    }

    /// Move on the canvas
    #[must_use]
    pub fn position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(CanvasPoint { x, y });
        self
    }
}

fn check_unique_ports(block: &BlockId, ports: &[Port]) -> EngineResult<()> {
    let mut seen = HashSet::new();
    for port in ports {
        if !seen.insert(&port.id) {
            return Err(EngineError::DuplicatePort {
                block: block.clone(),
                port: port.id.clone(),
            });
        }
    }
    Ok(())
}

fn check_child(child: &Graph) -> EngineResult<()> {
    let errors = structural_errors(child);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(EngineError::StructuralFindings(errors))
    }
}

/// Owner of a graph and its derived status roll-up
#[derive(Debug, Clone)]
pub struct GraphStore {
    graph: Graph,
    rollup: StatusRollup,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    /// Store over an empty graph
    #[must_use]
    pub fn new() -> Self {
        let graph = Graph::new();
        let rollup = roll_up(&graph);
        Self { graph, rollup }
    }

    /// Take ownership of a typed graph
    ///
    /// Local statuses are recomputed from the data.
    ///
    /// # Errors
    /// Returns [`EngineError::StructuralFindings`] if the graph has dangling
    /// references, self connections, duplicate tuples or duplicate port ids
    pub fn open(mut graph: Graph) -> EngineResult<Self> {
        let errors = structural_errors(&graph);
        if !errors.is_empty() {
            tracing::warn!("Refusing graph with {} structural error(s)", errors.len());
            return Err(EngineError::StructuralFindings(errors));
        }
        let corrected = refresh_local_statuses(&mut graph);
        if corrected > 0 {
            tracing::debug!(corrected, "Recomputed stored statuses on open");
        }
        let rollup = roll_up(&graph);
        Ok(Self { graph, rollup })
    }

    /// Migrate a raw document and open it
    ///
    /// # Errors
    /// Any error from [`migrate`] or [`GraphStore::open`]
    pub fn load(document: serde_json::Value) -> EngineResult<Self> {
        Self::open(migrate(document)?)
    }

    /// Read-only view of the graph
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Give up the store and keep the graph
    #[inline]
    #[must_use]
    pub fn into_graph(self) -> Graph {
        self.graph
    }

    /// Current status roll-up
    #[inline]
    #[must_use]
    pub fn rollup(&self) -> &StatusRollup {
        &self.rollup
    }

    /// Displayed status of a block
    #[must_use]
    pub fn effective_status(&self, scope: &DiagramPath, id: &BlockId) -> Option<Status> {
        self.rollup.effective(scope, id)
    }

    /// Replace the whole graph, e.g. when restoring a snapshot
    ///
    /// # Errors
    /// Same as [`GraphStore::open`]; the current graph is kept on failure
    pub fn restore(&mut self, graph: Graph) -> EngineResult<()> {
        *self = Self::open(graph)?;
        tracing::info!("Graph restored");
        Ok(())
    }

    /// Handle for mutating the diagram at `scope`
    ///
    /// # Errors
    /// Returns [`EngineError::DiagramNotFound`] if the path does not resolve
    pub fn scoped(&mut self, scope: &DiagramPath) -> EngineResult<ScopedStore<'_>> {
        if self.graph.resolve(scope).is_none() {
            return Err(EngineError::DiagramNotFound(scope.clone()));
        }
        Ok(ScopedStore {
            store: self,
            scope: scope.clone(),
        })
    }

    fn root(&mut self) -> ScopedStore<'_> {
        ScopedStore {
            store: self,
            scope: DiagramPath::root(),
        }
    }

    /// Add a block to the root diagram
    ///
    /// # Errors
    /// See [`ScopedStore::add_block`]
    pub fn add_block(&mut self, spec: BlockSpec) -> EngineResult<Block> {
        self.root().add_block(spec)
    }

    /// Update a block in the root diagram
    ///
    /// # Errors
    /// See [`ScopedStore::update_block`]
    pub fn update_block(&mut self, id: &BlockId, update: BlockUpdate) -> EngineResult<Block> {
        self.root().update_block(id, update)
    }

    /// Remove a block from the root diagram
    ///
    /// # Errors
    /// See [`ScopedStore::remove_block`]
    pub fn remove_block(&mut self, id: &BlockId) -> EngineResult<Block> {
        self.root().remove_block(id)
    }

    /// Connect two ports in the root diagram
    ///
    /// # Errors
    /// See [`ScopedStore::add_connection`]
    pub fn add_connection(
        &mut self,
        from: Endpoint,
        to: Endpoint,
        connection_type: ConnectionType,
        arrow_direction: ArrowDirection,
    ) -> EngineResult<Connection> {
        self.root()
            .add_connection(from, to, connection_type, arrow_direction)
    }

    /// Change type or direction of a connection in the root diagram
    ///
    /// # Errors
    /// See [`ScopedStore::update_connection`]
    pub fn update_connection(
        &mut self,
        id: &ConnectionId,
        connection_type: Option<ConnectionType>,
        arrow_direction: Option<ArrowDirection>,
    ) -> EngineResult<Connection> {
        self.root()
            .update_connection(id, connection_type, arrow_direction)
    }

    /// Remove a connection from the root diagram
    ///
    /// # Errors
    /// See [`ScopedStore::remove_connection`]
    pub fn remove_connection(&mut self, id: &ConnectionId) -> EngineResult<Connection> {
        self.root().remove_connection(id)
    }

    /// Add a requirement to the root diagram
    ///
    /// # Errors
    /// See [`ScopedStore::add_requirement`]
    pub fn add_requirement(&mut self, requirement: Requirement) -> EngineResult<Requirement> {
        self.root().add_requirement(requirement)
    }

    /// Remove a requirement from the root diagram
    ///
    /// # Errors
    /// See [`ScopedStore::remove_requirement`]
    pub fn remove_requirement(&mut self, id: &RequirementId) -> EngineResult<Requirement> {
        self.root().remove_requirement(id)
    }
}

/// Mutation handle for one diagram of a [`GraphStore`]
#[derive(Debug)]
pub struct ScopedStore<'a> {
    store: &'a mut GraphStore,
    scope: DiagramPath,
}

impl ScopedStore<'_> {
    /// Diagram this handle edits
    #[inline]
    #[must_use]
    pub fn scope(&self) -> &DiagramPath {
        &self.scope
    }

    /// Read-only view of the diagram
    ///
    /// # Errors
    /// Returns [`EngineError::DiagramNotFound`] if the diagram was discarded
    pub fn diagram(&self) -> EngineResult<&Graph> {
        self.store
            .graph
            .resolve(&self.scope)
            .ok_or_else(|| EngineError::DiagramNotFound(self.scope.clone()))
    }

    fn diagram_mut(&mut self) -> EngineResult<&mut Graph> {
        self.store
            .graph
            .resolve_mut(&self.scope)
            .ok_or_else(|| EngineError::DiagramNotFound(self.scope.clone()))
    }

    /// Stamp, refresh roll-up and log; or log the rejection
    fn finish<T>(&mut self, operation: &'static str, result: EngineResult<T>) -> EngineResult<T> {
        match result {
            Ok(value) => {
                let now = Utc::now();
                self.store.graph.metadata.modified = Some(now);
                if let Some(diagram) = self.store.graph.resolve_mut(&self.scope) {
                    diagram.metadata.modified = Some(now);
                }
                self.store.rollup = roll_up(&self.store.graph);
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(operation, scope = %self.scope, "Mutation rejected: {}", err);
                Err(err)
            }
        }
    }

    /// Create a block
    ///
    /// The block's status is derived from the data it carries.
    ///
    /// # Errors
    /// - [`EngineError::DuplicateBlock`] if the id is taken
    /// - [`EngineError::DuplicatePort`] if two ports share an id
    /// - [`EngineError::StructuralFindings`] if the child diagram is broken
    pub fn add_block(&mut self, spec: BlockSpec) -> EngineResult<Block> {
        let result = self.try_add_block(spec);
        self.finish("add_block", result)
    }

    fn try_add_block(&mut self, spec: BlockSpec) -> EngineResult<Block> {
        let id = spec.id.unwrap_or_else(BlockId::generate);
        let diagram = self.diagram_mut()?;
        if id.is_empty() || diagram.blocks.contains_key(&id) {
            return Err(EngineError::DuplicateBlock(id));
        }
        check_unique_ports(&id, &spec.interfaces)?;
        if let Some(child) = &spec.child_diagram {
            check_child(child)?;
        }

        let mut block = Block::new(id.clone(), spec.name, spec.block_type);
        block.description = spec.description;
        block.attributes = spec.attributes;
        block.interfaces = spec.interfaces;
        block.links = spec.links;
        block.verified = spec.verified;
        block.child_diagram = spec.child_diagram.map(|mut child| {
            refresh_local_statuses(&mut child);
            Box::new(child)
        });
        block.position = spec.position;
        block.size = spec.size;
        block.status = local_status(&block);

        diagram.blocks.insert(id.clone(), block.clone());
        tracing::debug!(block = %id, status = %block.status, "Block added");
        Ok(block)
    }

    /// Change fields of a block
    ///
    /// # Errors
    /// - [`EngineError::BlockNotFound`] if the block does not exist
    /// - [`EngineError::DuplicatePort`] if new interfaces repeat an id
    /// - [`EngineError::ReferentialIntegrity`] if a dropped port is still
    ///   used by a connection
    /// - [`EngineError::StructuralFindings`] if a new child diagram is broken
    pub fn update_block(&mut self, id: &BlockId, update: BlockUpdate) -> EngineResult<Block> {
        let result = self.try_update_block(id, update);
        self.finish("update_block", result)
    }

    fn try_update_block(&mut self, id: &BlockId, update: BlockUpdate) -> EngineResult<Block> {
        let diagram = self.diagram_mut()?;
        let current = diagram
            .block(id)
            .ok_or_else(|| EngineError::BlockNotFound(id.clone()))?;
        let mut next = current.clone();

        if let Some(name) = update.name {
            next.name = name;
        }
        if let Some(description) = update.description {
            next.description = description;
        }
        if let Some(block_type) = update.block_type {
            next.block_type = block_type;
        }
        if let Some(verified) = update.verified {
            next.verified = verified;
        }
        if let Some(attributes) = update.attributes {
            next.attributes = attributes;
        }
        for (key, value) in update.attribute_edits {
            match value {
                Some(value) => next.attributes.insert(key, value),
                None => next.attributes.remove(&key),
            };
        }
        if let Some(interfaces) = update.interfaces {
            check_unique_ports(id, &interfaces)?;
            next.interfaces = interfaces;
            let dropped = current
                .interfaces
                .iter()
                .filter(|port| !next.has_port(&port.id))
                .find_map(|port| {
                    diagram
                        .connections
                        .values()
                        .find(|c| c.touches_port(id, &port.id))
                        .map(|c| (c, &port.id))
                });
            if let Some((conn, port)) = dropped {
                return Err(EngineError::dangling(format!(
                    "port '{port}' of block '{id}' is still used by connection '{}'",
                    conn.id
                )));
            }
        }
        if let Some(links) = update.links {
            next.links = links;
        }
        if let Some(child) = update.child_diagram {
            next.child_diagram = match child {
                Some(mut child) => {
                    check_child(&child)?;
                    refresh_local_statuses(&mut child);
                    Some(Box::new(child))
                }
                None => None,
            };
        }
        if let Some(position) = update.position {
            next.position = Some(position);
        }
        if let Some(size) = update.size {
            next.size = Some(size);
        }
        next.status = local_status(&next);

        diagram.blocks.insert(id.clone(), next.clone());
        tracing::debug!(block = %id, status = %next.status, "Block updated");
        Ok(next)
    }

    /// Remove a block, its connections and its child diagram
    ///
    /// # Errors
    /// Returns [`EngineError::BlockNotFound`] if the block does not exist
    pub fn remove_block(&mut self, id: &BlockId) -> EngineResult<Block> {
        let result = self.try_remove_block(id);
        self.finish("remove_block", result)
    }

    fn try_remove_block(&mut self, id: &BlockId) -> EngineResult<Block> {
        let diagram = self.diagram_mut()?;
        let block = diagram
            .blocks
            .shift_remove(id)
            .ok_or_else(|| EngineError::BlockNotFound(id.clone()))?;
        let before = diagram.connections.len();
        diagram.connections.retain(|_, c| !c.touches(id));
        tracing::debug!(
            block = %id,
            cascaded_connections = before - diagram.connections.len(),
            discarded_child = block.child_diagram.is_some(),
            "Block removed"
        );
        Ok(block)
    }

    /// Connect two ports, generating the connection id
    ///
    /// # Errors
    /// - [`EngineError::ReferentialIntegrity`] if a block or port is missing
    /// - [`EngineError::SelfConnection`] if both ends are on one block
    /// - [`EngineError::DuplicateConnection`] if the tuple already exists
    pub fn add_connection(
        &mut self,
        from: Endpoint,
        to: Endpoint,
        connection_type: ConnectionType,
        arrow_direction: ArrowDirection,
    ) -> EngineResult<Connection> {
        let conn = Connection::new(
            ConnectionId::generate(),
            from,
            to,
            connection_type,
            arrow_direction,
        );
        self.insert_connection(conn)
    }

    /// Insert a fully specified connection
    ///
    /// # Errors
    /// As [`ScopedStore::add_connection`], plus [`EngineError::DuplicateId`]
    /// if the id is taken
    pub fn insert_connection(&mut self, connection: Connection) -> EngineResult<Connection> {
        let result = self.try_insert_connection(connection);
        self.finish("add_connection", result)
    }

    fn try_insert_connection(&mut self, conn: Connection) -> EngineResult<Connection> {
        let diagram = self.diagram_mut()?;
        for end in [conn.source(), conn.target()] {
            let block = diagram
                .block(&end.block)
                .ok_or_else(|| EngineError::dangling(format!("block '{}' does not exist", end.block)))?;
            if !block.has_port(&end.port) {
                return Err(EngineError::dangling(format!(
                    "port '{}' does not exist on block '{}'",
                    end.port, end.block
                )));
            }
        }
        if conn.is_self_loop() {
            return Err(EngineError::SelfConnection(conn.from_block.clone()));
        }
        if let Some(existing) = diagram.connections.values().find(|c| c.tuple() == conn.tuple()) {
            return Err(EngineError::DuplicateConnection {
                from_block: conn.from_block.clone(),
                from_port: conn.from_port.clone(),
                to_block: conn.to_block.clone(),
                to_port: conn.to_port.clone(),
                existing: existing.id.clone(),
            });
        }
        if conn.id.is_empty() || diagram.connections.contains_key(&conn.id) {
            return Err(EngineError::DuplicateId {
                kind: "connection",
                id: conn.id.to_string(),
            });
        }

        diagram.connections.insert(conn.id.clone(), conn.clone());
        tracing::debug!(
            connection = %conn.id,
            from = %conn.source(),
            to = %conn.target(),
            "Connection added"
        );
        Ok(conn)
    }

    /// Change type or direction of a connection
    ///
    /// # Errors
    /// Returns [`EngineError::ConnectionNotFound`] if it does not exist
    pub fn update_connection(
        &mut self,
        id: &ConnectionId,
        connection_type: Option<ConnectionType>,
        arrow_direction: Option<ArrowDirection>,
    ) -> EngineResult<Connection> {
        let result = self.diagram_mut().and_then(|diagram| {
            let conn = diagram
                .connections
                .get_mut(id)
                .ok_or_else(|| EngineError::ConnectionNotFound(id.clone()))?;
            if let Some(connection_type) = connection_type {
                conn.connection_type = connection_type;
            }
            if let Some(arrow_direction) = arrow_direction {
                conn.arrow_direction = arrow_direction;
            }
            tracing::debug!(connection = %id, "Connection updated");
            Ok(conn.clone())
        });
        self.finish("update_connection", result)
    }

    /// Remove a connection
    ///
    /// # Errors
    /// Returns [`EngineError::ConnectionNotFound`] if it does not exist
    pub fn remove_connection(&mut self, id: &ConnectionId) -> EngineResult<Connection> {
        let result = self.diagram_mut().and_then(|diagram| {
            let conn = diagram
                .connections
                .shift_remove(id)
                .ok_or_else(|| EngineError::ConnectionNotFound(id.clone()))?;
            tracing::debug!(connection = %id, "Connection removed");
            Ok(conn)
        });
        self.finish("remove_connection", result)
    }

    /// Add a requirement
    ///
    /// The targeted block is not required to exist; the `requirements` rule
    /// reports unresolved targets.
    ///
    /// # Errors
    /// Returns [`EngineError::DuplicateId`] if the id is taken
    pub fn add_requirement(&mut self, requirement: Requirement) -> EngineResult<Requirement> {
        let result = self.diagram_mut().and_then(|diagram| {
            if requirement.id.is_empty() || diagram.requirement(&requirement.id).is_some() {
                return Err(EngineError::DuplicateId {
                    kind: "requirement",
                    id: requirement.id.to_string(),
                });
            }
            diagram.requirements.push(requirement.clone());
            tracing::debug!(requirement = %requirement.id, target = %requirement.target, "Requirement added");
            Ok(requirement)
        });
        self.finish("add_requirement", result)
    }

    /// Remove a requirement
    ///
    /// # Errors
    /// Returns [`EngineError::RequirementNotFound`] if it does not exist
    pub fn remove_requirement(&mut self, id: &RequirementId) -> EngineResult<Requirement> {
        let result = self.diagram_mut().and_then(|diagram| {
            let index = diagram
                .requirements
                .iter()
                .position(|r| &r.id == id)
                .ok_or_else(|| EngineError::RequirementNotFound(id.clone()))?;
            tracing::debug!(requirement = %id, "Requirement removed");
            Ok(diagram.requirements.remove(index))
        });
        self.finish("remove_requirement", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysblock_model::AttributeRef;
    use sysblock_model::Comparison;

    fn store_with_pair() -> GraphStore {
        let mut store = GraphStore::new();
        store
            .add_block(
                BlockSpec::new("MCU", BlockType::Electrical)
                    .with_id("mcu")
                    .with_port(Port::new("spi", "SPI", "data")),
            )
            .unwrap();
        store
            .add_block(
                BlockSpec::new("Flash", BlockType::Electrical)
                    .with_id("flash")
                    .with_port(Port::new("spi", "SPI", "data")),
            )
            .unwrap();
        store
    }

    fn spi(store: &mut GraphStore) -> EngineResult<Connection> {
        store.add_connection(
            Endpoint::new("mcu", "spi"),
            Endpoint::new("flash", "spi"),
            ConnectionType::Data,
            ArrowDirection::Bidirectional,
        )
    }

    #[test]
    fn add_block_generates_id_and_status() {
        let mut store = GraphStore::new();
        let block = store
            .add_block(BlockSpec::new("Sensor", BlockType::Electrical).with_description("Temp"))
            .unwrap();
        assert!(!block.id.is_empty());
        assert_eq!(block.status, Status::Planned);
        assert!(store.graph().metadata.modified.is_some());
        assert_eq!(store.effective_status(&DiagramPath::root(), &block.id), Some(Status::Planned));
    }

    #[test]
    fn duplicate_block_and_port_rejected() {
        let mut store = store_with_pair();
        let err = store
            .add_block(BlockSpec::new("Again", BlockType::Generic).with_id("mcu"))
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateBlock(_)));

        let err = store
            .add_block(
                BlockSpec::new("Twin", BlockType::Generic)
                    .with_port(Port::new("p", "A", ""))
                    .with_port(Port::new("p", "B", "")),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicatePort { .. }));
        assert_eq!(store.graph().blocks.len(), 2);
    }

    #[test]
    fn connection_invariants() {
        let mut store = store_with_pair();
        spi(&mut store).unwrap();

        assert!(matches!(spi(&mut store), Err(EngineError::DuplicateConnection { .. })));

        let dangling = store.add_connection(
            Endpoint::new("mcu", "spi"),
            Endpoint::new("ghost", "spi"),
            ConnectionType::Data,
            ArrowDirection::Forward,
        );
        assert!(matches!(dangling, Err(EngineError::ReferentialIntegrity { .. })));

        let bad_port = store.add_connection(
            Endpoint::new("mcu", "uart"),
            Endpoint::new("flash", "spi"),
            ConnectionType::Data,
            ArrowDirection::Forward,
        );
        assert!(matches!(bad_port, Err(EngineError::ReferentialIntegrity { .. })));

        store
            .update_block(
                &"mcu".into(),
                BlockUpdate::new().interfaces(vec![
                    Port::new("spi", "SPI", "data"),
                    Port::new("gpio", "GPIO", "data"),
                ]),
            )
            .unwrap();
        let self_loop = store.add_connection(
            Endpoint::new("mcu", "spi"),
            Endpoint::new("mcu", "gpio"),
            ConnectionType::Data,
            ArrowDirection::Forward,
        );
        assert!(matches!(self_loop, Err(EngineError::SelfConnection(_))));
        assert_eq!(store.graph().connections.len(), 1);
    }

    #[test]
    fn remove_block_cascades() {
        let mut store = store_with_pair();
        spi(&mut store).unwrap();
        let removed = store.remove_block(&"flash".into()).unwrap();
        assert_eq!(removed.id, BlockId::new("flash"));
        assert!(store.graph().connections.is_empty());
        assert!(matches!(
            store.remove_block(&"flash".into()),
            Err(EngineError::BlockNotFound(_))
        ));
    }

    #[test]
    fn update_refuses_to_drop_used_port() {
        let mut store = store_with_pair();
        spi(&mut store).unwrap();
        let before = store.graph().clone();
        let err = store
            .update_block(&"flash".into(), BlockUpdate::new().name("Renamed").interfaces(vec![]))
            .unwrap_err();
        assert!(matches!(err, EngineError::ReferentialIntegrity { .. }));
        assert_eq!(store.graph(), &before);
    }

    #[test]
    fn update_recomputes_status() {
        let mut store = store_with_pair();
        let block = store
            .update_block(
                &"mcu".into(),
                BlockUpdate::new()
                    .description("Main controller")
                    .links(vec![Link::ecad("U1")])
                    .set_attribute("voltage", "3.3V"),
            )
            .unwrap();
        assert_eq!(block.status, Status::Implemented);
        let block = store
            .update_block(&"mcu".into(), BlockUpdate::new().verified(true))
            .unwrap();
        assert_eq!(block.status, Status::Verified);
        assert_eq!(block.attribute("voltage"), Some("3.3V"));
    }

    #[test]
    fn scoped_edits_roll_up() {
        let mut store = GraphStore::new();
        store
            .add_block(
                BlockSpec::new("Board", BlockType::Electrical)
                    .with_id("board")
                    .with_description("Main board")
                    .with_port(Port::new("p", "P", ""))
                    .with_link(Link::ecad("PCB1"))
                    .with_child_diagram(Graph::new()),
            )
            .unwrap();
        let root = DiagramPath::root();
        assert_eq!(store.effective_status(&root, &"board".into()), Some(Status::Implemented));

        let scope = root.child("board".into());
        let mut child = store.scoped(&scope).unwrap();
        child
            .add_block(BlockSpec::new("", BlockType::Generic).with_id("stub"))
            .unwrap();
        assert_eq!(child.diagram().unwrap().blocks.len(), 1);

        assert_eq!(store.effective_status(&root, &"board".into()), Some(Status::Placeholder));
        assert_eq!(store.graph().blocks["board"].status, Status::Implemented);

        assert!(matches!(
            store.scoped(&root.child("nope".into())),
            Err(EngineError::DiagramNotFound(_))
        ));
    }

    #[test]
    fn open_refuses_structural_errors() {
        let mut graph = Graph::new();
        graph.connections.insert(
            "c".into(),
            Connection::new(
                "c",
                Endpoint::new("a", "p"),
                Endpoint::new("b", "q"),
                ConnectionType::Auto,
                ArrowDirection::Forward,
            ),
        );
        let err = GraphStore::open(graph).unwrap_err();
        assert!(err.is_fatal_at_load());
        assert!(matches!(err, EngineError::StructuralFindings(ref f) if f.len() == 2));
    }

    #[test]
    fn requirements_are_unique() {
        let mut store = store_with_pair();
        let req = Requirement {
            id: "r1".into(),
            target: AttributeRef {
                block: "mcu".into(),
                attribute: "voltage".into(),
            },
            operator: Comparison::Equal,
            target_value: "3.3V".into(),
            unit: None,
        };
        store.add_requirement(req.clone()).unwrap();
        assert!(matches!(
            store.add_requirement(req),
            Err(EngineError::DuplicateId { kind: "requirement", .. })
        ));
        store.remove_requirement(&"r1".into()).unwrap();
        assert!(matches!(
            store.remove_requirement(&"r1".into()),
            Err(EngineError::RequirementNotFound(_))
        ));
    }

    #[test]
    fn connection_update_and_remove() {
        let mut store = store_with_pair();
        let conn = spi(&mut store).unwrap();
        let updated = store
            .update_connection(&conn.id, Some(ConnectionType::Electrical), None)
            .unwrap();
        assert_eq!(updated.connection_type, ConnectionType::Electrical);
        assert_eq!(updated.arrow_direction, ArrowDirection::Bidirectional);
        store.remove_connection(&conn.id).unwrap();
        assert!(matches!(
            store.remove_connection(&conn.id),
            Err(EngineError::ConnectionNotFound(_))
        ));
    }
}
