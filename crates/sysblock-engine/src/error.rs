//! Error types for the sysblock engine
//!
//! Fatal conditions are returned as [`EngineError`]. Advisory results from
//! validation and rules are never errors; they are returned as
//! [`crate::Finding`] data.

use crate::validation::Finding;
use sysblock_model::{BlockId, ConnectionId, DiagramPath, EntityPath, PortId, RequirementId};

/// Result alias used throughout the engine
pub type EngineResult<T> = Result<T, EngineError>;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A referenced block or port does not exist, or a mutation would leave
    /// a dangling reference
    #[error("referential integrity violation: {detail}")]
    ReferentialIntegrity {
        /// What was referenced
        detail: String,
    },

    /// Another connection already joins the same endpoints
    #[error("duplicate connection {from_block}:{from_port} -> {to_block}:{to_port} (existing '{existing}')")]
    DuplicateConnection {
        /// Source block
        from_block: BlockId,
        /// Source port
        from_port: PortId,
        /// Target block
        to_block: BlockId,
        /// Target port
        to_port: PortId,
        /// Connection already holding the tuple
        existing: ConnectionId,
    },

    /// Both ends of a connection are on the same block
    #[error("self connection on block '{0}'")]
    SelfConnection(BlockId),

    /// Block id already in use
    #[error("duplicate block id '{0}'")]
    DuplicateBlock(BlockId),

    /// Port id declared twice on one block
    #[error("duplicate port id '{port}' on block '{block}'")]
    DuplicatePort {
        /// Owning block
        block: BlockId,
        /// Repeated port id
        port: PortId,
    },

    /// Connection or requirement id already in use
    #[error("duplicate {kind} id '{id}'")]
    DuplicateId {
        /// Entity kind
        kind: &'static str,
        /// Repeated id
        id: String,
    },

    /// Block not found
    #[error("block not found: {0}")]
    BlockNotFound(BlockId),

    /// Connection not found
    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// Requirement not found
    #[error("requirement not found: {0}")]
    RequirementNotFound(RequirementId),

    /// Scope path does not lead to a child diagram
    #[error("diagram not found: {0}")]
    DiagramNotFound(DiagramPath),

    /// Document version newer than this engine supports
    #[error("unsupported schema version '{found}' (newest supported: {supported})")]
    SchemaVersion {
        /// Version in the document
        found: String,
        /// Newest version this engine understands
        supported: &'static str,
    },

    /// Document cannot be turned into a graph
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// Graph refused at open time because of structural errors
    #[error("graph has {} structural error(s)", .0.len())]
    StructuralFindings(Vec<Finding>),

    /// Patch operation target missing, already present or unsupported
    #[error("patch conflict at '{path}': {reason}")]
    PatchConflict {
        /// Operation target
        path: EntityPath,
        /// Why the operation cannot be applied
        reason: ConflictReason,
    },

    /// Patch operation value has the wrong shape
    #[error("invalid patch value at '{path}': {source}")]
    InvalidPatchValue {
        /// Operation target
        path: EntityPath,
        /// Decoding failure
        #[source]
        source: serde_json::Error,
    },

    /// No rule registered under this name
    #[error("unknown rule: {0}")]
    UnknownRule(String),

    /// Configuration could not be parsed
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

impl EngineError {
    /// Dangling-reference helper
    #[inline]
    pub fn dangling(detail: impl Into<String>) -> Self {
        Self::ReferentialIntegrity {
            detail: detail.into(),
        }
    }

    /// Patch conflict helper
    #[inline]
    #[must_use]
    pub fn conflict(path: &EntityPath, reason: ConflictReason) -> Self {
        Self::PatchConflict {
            path: path.clone(),
            reason,
        }
    }

    /// Whether this error prevents a document from loading
    #[inline]
    #[must_use]
    pub fn is_fatal_at_load(&self) -> bool {
        matches!(
            self,
            Self::SchemaVersion { .. } | Self::MalformedDocument(_) | Self::StructuralFindings(_)
        )
    }

    /// Whether this is a patch conflict
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::PatchConflict { .. })
    }
}

/// Why a patch operation could not be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// Target does not exist
    MissingTarget,
    /// `add` target already exists
    AlreadyExists,
    /// Path does not name a patchable location
    UnsupportedPath,
    /// Operation kind not allowed at this path
    UnsupportedOperation,
}

impl std::fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::MissingTarget => "target does not exist",
            Self::AlreadyExists => "target already exists",
            Self::UnsupportedPath => "unsupported path",
            Self::UnsupportedOperation => "operation not allowed at this path",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_fatality() {
        let version = EngineError::SchemaVersion {
            found: "99.0".into(),
            supported: "1.2",
        };
        assert!(version.is_fatal_at_load());
        assert!(!EngineError::BlockNotFound("b".into()).is_fatal_at_load());
    }

    #[test]
    fn conflict_message_names_path() {
        let path: EntityPath = "blocks/b1/name".parse().unwrap();
        let err = EngineError::conflict(&path, ConflictReason::MissingTarget);
        assert!(err.is_conflict());
        assert_eq!(
            err.to_string(),
            "patch conflict at 'blocks/b1/name': target does not exist"
        );
    }
}
