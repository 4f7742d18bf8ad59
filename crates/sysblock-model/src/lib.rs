//! Sysblock Model
//!
//! Entity schema for engineering system-block diagrams.
//!
//! # Core Concepts
//!
//! - [`Graph`]: a diagram owning its [`Block`]s, [`Connection`]s and
//!   [`Requirement`]s; blocks may own a nested child [`Graph`]
//! - [`Status`]: the lifecycle progression used for roll-up
//! - [`Fingerprint`]: Blake3 hash of a block's semantic content
//! - [`EntityPath`]: stable, id-based addressing used by patches
//! - [`DiagramPath`]: caller-held navigation into nested diagrams
//!
//! # Example
//!
//! ```rust
//! use sysblock_model::{Block, BlockType, Graph};
//!
//! let mut graph = Graph::new();
//! let block = Block::new("mcu", "Controller", BlockType::Electrical);
//! let fingerprint = block.fingerprint();
//! graph.blocks.insert(block.id.clone(), block);
//!
//! assert_eq!(graph.blocks["mcu"].fingerprint(), fingerprint);
//! ```

#![warn(unreachable_pub)]

mod block;
mod connection;
mod graph;
mod hash;
mod ids;
mod path;
mod requirement;
mod status;

pub use block::{block_fingerprint, Block, BlockType, CanvasPoint, CanvasSize, Link, Port};
pub use connection::{ArrowDirection, Connection, ConnectionType, Endpoint};
pub use graph::{DiagramPath, Graph, Keyed, Metadata};
pub use hash::Fingerprint;
pub use ids::{BlockId, ConnectionId, PortId, RequirementId};
pub use path::{EntityPath, PathError};
pub use requirement::{AttributeRef, Comparison, Requirement};
pub use status::Status;

/// Oldest document shape this engine understands; documents without a
/// `schemaVersion` are read as this version
pub const BASELINE_SCHEMA_VERSION: &str = "1.0";

/// Version stamped on every graph this engine writes
pub const CURRENT_SCHEMA_VERSION: &str = "1.2";

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
