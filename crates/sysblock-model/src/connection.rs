//! Connections between block ports

use crate::ids::{BlockId, ConnectionId, PortId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of signal carried by a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionType {
    /// Power delivery
    Power,
    /// Data/signal line
    Data,
    /// Generic electrical connection
    Electrical,
    /// Mechanical coupling
    Mechanical,
    /// Type inferred by the host
    #[default]
    Auto,
}

/// Arrow rendering direction of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrowDirection {
    /// From `from` to `to`
    #[default]
    Forward,
    /// From `to` to `from`
    Backward,
    /// Both ways
    Bidirectional,
    /// No arrow
    None,
}

/// One side of a connection: a `(block, port)` pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Referenced block
    pub block: BlockId,
    /// Referenced port on that block
    pub port: PortId,
}

impl Endpoint {
    /// Create an endpoint
    #[must_use]
    pub fn new(block: impl Into<BlockId>, port: impl Into<PortId>) -> Self {
        Self {
            block: block.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block, self.port)
    }
}

/// A typed edge between two ports on two different blocks
///
/// Holds ids only; blocks and ports are owned by the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Connection id, unique within the owning graph
    pub id: ConnectionId,
    /// Source block
    pub from_block: BlockId,
    /// Source port
    pub from_port: PortId,
    /// Target block
    pub to_block: BlockId,
    /// Target port
    pub to_port: PortId,
    /// Signal kind
    #[serde(rename = "type", default)]
    pub connection_type: ConnectionType,
    /// Arrow rendering
    #[serde(default)]
    pub arrow_direction: ArrowDirection,
}

impl Connection {
    /// Create a connection between two endpoints
    #[must_use]
    pub fn new(
        id: impl Into<ConnectionId>,
        from: Endpoint,
        to: Endpoint,
        connection_type: ConnectionType,
        arrow_direction: ArrowDirection,
    ) -> Self {
        Self {
            id: id.into(),
            from_block: from.block,
            from_port: from.port,
            to_block: to.block,
            to_port: to.port,
            connection_type,
            arrow_direction,
        }
    }

    /// Source endpoint
    #[must_use]
    pub fn source(&self) -> Endpoint {
        Endpoint {
            block: self.from_block.clone(),
            port: self.from_port.clone(),
        }
    }

    /// Target endpoint
    #[must_use]
    pub fn target(&self) -> Endpoint {
        Endpoint {
            block: self.to_block.clone(),
            port: self.to_port.clone(),
        }
    }

    /// The `(fromBlock, fromPort, toBlock, toPort)` uniqueness key
    #[must_use]
    pub fn tuple(&self) -> (&BlockId, &PortId, &BlockId, &PortId) {
        (&self.from_block, &self.from_port, &self.to_block, &self.to_port)
    }

    /// Whether either end references the block
    #[inline]
    #[must_use]
    pub fn touches(&self, block: &BlockId) -> bool {
        &self.from_block == block || &self.to_block == block
    }

    /// Whether either end references the given port of the block
    #[inline]
    #[must_use]
    pub fn touches_port(&self, block: &BlockId, port: &PortId) -> bool {
        (&self.from_block == block && &self.from_port == port)
            || (&self.to_block == block && &self.to_port == port)
    }

    /// The block at the other end, if `block` is one end
    #[must_use]
    pub fn opposite(&self, block: &BlockId) -> Option<&BlockId> {
        if &self.from_block == block {
            Some(&self.to_block)
        } else if &self.to_block == block {
            Some(&self.from_block)
        } else {
            None
        }
    }

    /// Whether both ends sit on the same block
    #[inline]
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.from_block == self.to_block
    }
}
