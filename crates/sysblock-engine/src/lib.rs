//! Sysblock Engine
//!
//! Consistency engine for system-block diagrams built on
//! [`sysblock_model`].
//!
//! # Components
//!
//! - [`migrate()`]: upgrades raw documents to the current schema
//! - [`GraphStore`]: the only writer of a graph; every mutation is checked
//!   and atomic
//! - [`validate()`]: structural and referential findings
//! - [`RuleRegistry`] / [`run_rules`]: named domain rules (logic levels,
//!   power budget, completeness, orphans, requirements)
//! - [`roll_up`]: displayed status of hierarchical blocks
//! - [`compute_patch`] / [`apply_patch`]: id-addressed persistence deltas
//! - [`History`] / [`diff`]: snapshots for undo and semantic comparison
//!
//! Operations take the graph as an explicit argument or own it through a
//! [`GraphStore`]; the engine holds no global state and performs no I/O.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use sysblock_engine::{compute_patch, is_trivial_patch, run_rules, GraphStore};
//!
//! let store = GraphStore::load(json!({
//!     "blocks": [{"id": "b1", "name": "Test", "type": "Generic"}],
//!     "connections": []
//! }))?;
//! let before = store.graph().clone();
//!
//! let findings = run_rules(store.graph(), None)?;
//! assert_eq!(findings.len(), 1); // b1 is still a placeholder
//! assert!(is_trivial_patch(&compute_patch(&before, store.graph())));
//! # Ok::<(), sysblock_engine::EngineError>(())
//! ```

#![warn(unreachable_pub)]

mod config;
mod error;
mod history;
mod migrate;
mod patch;
pub mod rules;
mod status;
mod store;
mod validation;

pub use config::EngineConfig;
pub use error::{ConflictReason, EngineError, EngineResult};
pub use history::{
    create_snapshot, diff, diff_graphs, ConnectionChange, ConnectionChangeKind, DiffResult,
    History, Snapshot,
};
pub use migrate::{is_known_version, migrate, KNOWN_SCHEMA_VERSIONS};
pub use patch::{apply_patch, compute_patch, is_trivial_patch, PatchOperation};
pub use rules::{run_rules, RuleContext, RuleRegistry};
pub use status::{local_status, refresh_local_statuses, roll_up, worst_status, StatusRollup};
pub use store::{BlockSpec, BlockUpdate, GraphStore, ScopedStore};
pub use validation::{
    is_boundary_block, validate, validate_document, validate_with, EntityRef, Finding,
    FindingCode, FindingSummary, Severity,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
