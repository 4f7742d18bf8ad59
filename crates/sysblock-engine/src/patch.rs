//! Delta/patch engine
//!
//! [`compute_patch`] turns two graph states into an ordered list of
//! [`PatchOperation`]s addressed by id-based [`EntityPath`]s; [`apply_patch`]
//! replays them. Blocks are compared by fingerprint, so presentation-only
//! edits such as canvas position never produce operations.
//!
//! # Addressable locations
//!
//! | Path                                 | Operations          |
//! |--------------------------------------|---------------------|
//! | `schemaVersion`, `metadata`          | replace             |
//! | `blocks/<id>`                        | add, remove, replace|
//! | `blocks/<id>/<field>`                | replace             |
//! | `blocks/<id>/attributes/<key>`       | add, remove, replace|
//! | `blocks/<id>/childDiagram`           | add, remove, replace|
//! | `blocks/<id>/childDiagram/<path>`    | as above, nested    |
//! | `connections/<id>`                   | add, remove, replace|
//! | `requirements/<id>`                  | add, remove, replace|

use crate::error::{ConflictReason, EngineError, EngineResult};
use crate::validation::structural_errors;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sysblock_model::{Block, BlockId, Connection, ConnectionId, EntityPath, Graph, Requirement};

const BLOCKS: &str = "blocks";
const CONNECTIONS: &str = "connections";
const REQUIREMENTS: &str = "requirements";
const CHILD_DIAGRAM: &str = "childDiagram";
const ATTRIBUTES: &str = "attributes";
const SCHEMA_VERSION: &str = "schemaVersion";
const METADATA: &str = "metadata";

/// One step of a patch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    /// Create the target; fails if it exists
    Add {
        /// Target location
        path: EntityPath,
        /// New value
        value: Value,
    },
    /// Delete the target; fails if it is missing
    Remove {
        /// Target location
        path: EntityPath,
    },
    /// Overwrite the target; fails if it is missing
    Replace {
        /// Target location
        path: EntityPath,
        /// New value
        value: Value,
    },
}

impl PatchOperation {
    /// Target location
    #[inline]
    #[must_use]
    pub fn path(&self) -> &EntityPath {
        match self {
            Self::Add { path, .. } | Self::Remove { path } | Self::Replace { path, .. } => path,
        }
    }

    /// Operation name as serialised
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
        }
    }
}

/// Whether a patch has nothing to do
#[inline]
#[must_use]
pub fn is_trivial_patch(patch: &[PatchOperation]) -> bool {
    patch.is_empty()
}

// model types only have string map keys, so serialising them cannot fail
fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

fn add(path: EntityPath, value: Value) -> PatchOperation {
    PatchOperation::Add { path, value }
}

fn replace(path: EntityPath, value: Value) -> PatchOperation {
    PatchOperation::Replace { path, value }
}

fn remove(path: EntityPath) -> PatchOperation {
    PatchOperation::Remove { path }
}

/// Minimal ordered operations turning `old` into `new`
///
/// Within each diagram the order is: connection removals, block removals,
/// block additions, block field edits, child diagram edits, connection
/// additions and replacements, then requirements, metadata and version.
/// Applying the result to `old` yields a graph semantically equal to `new`.
#[must_use]
pub fn compute_patch(old: &Graph, new: &Graph) -> Vec<PatchOperation> {
    let mut ops = Vec::new();
    diff_into(old, new, &EntityPath::root(), &mut ops);
    ops
}

fn diff_into(old: &Graph, new: &Graph, prefix: &EntityPath, ops: &mut Vec<PatchOperation>) {
    let blocks = prefix.child(BLOCKS);
    let connections = prefix.child(CONNECTIONS);

    for id in old.connections.keys() {
        if !new.connections.contains_key(id) {
            ops.push(remove(connections.child(id.as_str())));
        }
    }
    for id in old.blocks.keys() {
        if !new.blocks.contains_key(id) {
            ops.push(remove(blocks.child(id.as_str())));
        }
    }
    for (id, block) in &new.blocks {
        if !old.blocks.contains_key(id) {
            ops.push(add(blocks.child(id.as_str()), to_json(block)));
        }
    }
    for (id, after) in &new.blocks {
        if let Some(before) = old.block(id) {
            diff_block_fields(before, after, &blocks.child(id.as_str()), ops);
        }
    }
    for (id, after) in &new.blocks {
        let Some(before) = old.block(id) else {
            continue;
        };
        let path = blocks.child(id.as_str()).child(CHILD_DIAGRAM);
        match (before.child_diagram.as_deref(), after.child_diagram.as_deref()) {
            (None, Some(child)) => ops.push(add(path, to_json(child))),
            (Some(_), None) => ops.push(remove(path)),
            (Some(a), Some(b)) => diff_into(a, b, &path, ops),
            (None, None) => {}
        }
    }
    for (id, conn) in &new.connections {
        match old.connection(id) {
            None => ops.push(add(connections.child(id.as_str()), to_json(conn))),
            Some(previous) if previous != conn => {
                ops.push(replace(connections.child(id.as_str()), to_json(conn)));
            }
            Some(_) => {}
        }
    }

    let requirements = prefix.child(REQUIREMENTS);
    for req in &old.requirements {
        if new.requirement(&req.id).is_none() {
            ops.push(remove(requirements.child(req.id.as_str())));
        }
    }
    for req in &new.requirements {
        match old.requirement(&req.id) {
            None => ops.push(add(requirements.child(req.id.as_str()), to_json(req))),
            Some(previous) if previous != req => {
                ops.push(replace(requirements.child(req.id.as_str()), to_json(req)));
            }
            Some(_) => {}
        }
    }

    if old.metadata != new.metadata {
        ops.push(replace(prefix.child(METADATA), to_json(&new.metadata)));
    }
    if old.schema_version != new.schema_version {
        ops.push(replace(
            prefix.child(SCHEMA_VERSION),
            Value::String(new.schema_version.clone()),
        ));
    }
}

fn diff_block_fields(before: &Block, after: &Block, path: &EntityPath, ops: &mut Vec<PatchOperation>) {
    if before.fingerprint() == after.fingerprint() {
        return;
    }
    let mut field = |name: &str, changed: bool, value: Value| {
        if changed {
            ops.push(replace(path.child(name), value));
        }
    };
    field("name", before.name != after.name, to_json(&after.name));
    field(
        "description",
        before.description != after.description,
        to_json(&after.description),
    );
    field("type", before.block_type != after.block_type, to_json(&after.block_type));
    field("status", before.status != after.status, to_json(&after.status));
    field("verified", before.verified != after.verified, to_json(&after.verified));
    field(
        "interfaces",
        before.interfaces != after.interfaces,
        to_json(&after.interfaces),
    );
    field("links", before.links != after.links, to_json(&after.links));

    let attributes = path.child(ATTRIBUTES);
    for key in before.attributes.keys() {
        if !after.attributes.contains_key(key) {
            ops.push(remove(attributes.child(key.as_str())));
        }
    }
    for (key, value) in &after.attributes {
        match before.attributes.get(key) {
            None => ops.push(add(attributes.child(key.as_str()), Value::String(value.clone()))),
            Some(previous) if previous != value => {
                ops.push(replace(attributes.child(key.as_str()), Value::String(value.clone())));
            }
            Some(_) => {}
        }
    }
}

/// Apply a patch to a copy of `graph`
///
/// Operations run in order. The first failing operation aborts the whole
/// patch and `graph` is left untouched.
///
/// # Errors
/// - [`EngineError::PatchConflict`] if a target is missing, an `add` target
///   exists, or the path is not patchable
/// - [`EngineError::InvalidPatchValue`] if a value has the wrong shape
/// - [`EngineError::StructuralFindings`] if the patched graph would have
///   dangling references, duplicate ids or other structural errors
pub fn apply_patch(graph: &Graph, patch: &[PatchOperation]) -> EngineResult<Graph> {
    let mut next = graph.clone();
    for (index, op) in patch.iter().enumerate() {
        if let Err(err) = apply_in(&mut next, op.path().segments(), op) {
            tracing::warn!(index, op = op.name(), path = %op.path(), "Patch refused: {}", err);
            return Err(err);
        }
    }
    let errors = structural_errors(&next);
    if !errors.is_empty() {
        tracing::warn!(operations = patch.len(), "Patch refused: {} structural error(s)", errors.len());
        return Err(EngineError::StructuralFindings(errors));
    }
    tracing::info!(operations = patch.len(), "Patch applied");
    Ok(next)
}

fn decode<T: DeserializeOwned>(op: &PatchOperation, value: &Value) -> EngineResult<T> {
    serde_json::from_value(value.clone()).map_err(|source| EngineError::InvalidPatchValue {
        path: op.path().clone(),
        source,
    })
}

fn invalid(op: &PatchOperation, message: String) -> EngineError {
    EngineError::InvalidPatchValue {
        path: op.path().clone(),
        source: <serde_json::Error as serde::de::Error>::custom(message),
    }
}

fn conflict(op: &PatchOperation, reason: ConflictReason) -> EngineError {
    EngineError::conflict(op.path(), reason)
}

fn apply_in(graph: &mut Graph, segments: &[String], op: &PatchOperation) -> EngineResult<()> {
    match segments {
        [field] if field == SCHEMA_VERSION => match op {
            PatchOperation::Replace { value, .. } => {
                graph.schema_version = decode(op, value)?;
                Ok(())
            }
            _ => Err(conflict(op, ConflictReason::UnsupportedOperation)),
        },
        [field] if field == METADATA => match op {
            PatchOperation::Replace { value, .. } => {
                graph.metadata = decode(op, value)?;
                Ok(())
            }
            _ => Err(conflict(op, ConflictReason::UnsupportedOperation)),
        },
        [kind, id] if kind == BLOCKS => apply_block(graph, &BlockId::new(id.as_str()), op),
        [kind, id] if kind == CONNECTIONS => {
            apply_connection(graph, &ConnectionId::new(id.as_str()), op)
        }
        [kind, id] if kind == REQUIREMENTS => apply_requirement(graph, id, op),
        [kind, id, rest @ ..] if kind == BLOCKS => {
            let block = graph
                .blocks
                .get_mut(id.as_str())
                .ok_or_else(|| conflict(op, ConflictReason::MissingTarget))?;
            apply_block_field(block, rest, op)
        }
        _ => Err(conflict(op, ConflictReason::UnsupportedPath)),
    }
}

fn apply_block(graph: &mut Graph, id: &BlockId, op: &PatchOperation) -> EngineResult<()> {
    let exists = graph.blocks.contains_key(id);
    match op {
        PatchOperation::Add { value, .. } | PatchOperation::Replace { value, .. } => {
            let is_add = matches!(op, PatchOperation::Add { .. });
            if is_add && exists {
                return Err(conflict(op, ConflictReason::AlreadyExists));
            }
            if !is_add && !exists {
                return Err(conflict(op, ConflictReason::MissingTarget));
            }
            let block: Block = decode(op, value)?;
            if &block.id != id {
                return Err(invalid(op, format!("block id '{}' does not match path", block.id)));
            }
            graph.blocks.insert(id.clone(), block);
        }
        PatchOperation::Remove { .. } => {
            graph
                .blocks
                .shift_remove(id)
                .ok_or_else(|| conflict(op, ConflictReason::MissingTarget))?;
        }
    }
    Ok(())
}

fn apply_connection(graph: &mut Graph, id: &ConnectionId, op: &PatchOperation) -> EngineResult<()> {
    let exists = graph.connections.contains_key(id);
    match op {
        PatchOperation::Add { value, .. } | PatchOperation::Replace { value, .. } => {
            let is_add = matches!(op, PatchOperation::Add { .. });
            if is_add && exists {
                return Err(conflict(op, ConflictReason::AlreadyExists));
            }
            if !is_add && !exists {
                return Err(conflict(op, ConflictReason::MissingTarget));
            }
            let conn: Connection = decode(op, value)?;
            if &conn.id != id {
                return Err(invalid(op, format!("connection id '{}' does not match path", conn.id)));
            }
            graph.connections.insert(id.clone(), conn);
        }
        PatchOperation::Remove { .. } => {
            graph
                .connections
                .shift_remove(id)
                .ok_or_else(|| conflict(op, ConflictReason::MissingTarget))?;
        }
    }
    Ok(())
}

fn apply_requirement(graph: &mut Graph, id: &str, op: &PatchOperation) -> EngineResult<()> {
    let position = graph.requirements.iter().position(|r| r.id.as_str() == id);
    match (op, position) {
        (PatchOperation::Add { .. }, Some(_)) => Err(conflict(op, ConflictReason::AlreadyExists)),
        (PatchOperation::Remove { .. } | PatchOperation::Replace { .. }, None) => {
            Err(conflict(op, ConflictReason::MissingTarget))
        }
        (PatchOperation::Remove { .. }, Some(index)) => {
            graph.requirements.remove(index);
            Ok(())
        }
        (PatchOperation::Add { value, .. } | PatchOperation::Replace { value, .. }, position) => {
            let req: Requirement = decode(op, value)?;
            if req.id.as_str() != id {
                return Err(invalid(op, format!("requirement id '{}' does not match path", req.id)));
            }
            match position {
                Some(index) => graph.requirements[index] = req,
                None => graph.requirements.push(req),
            }
            Ok(())
        }
    }
}

fn apply_block_field(block: &mut Block, segments: &[String], op: &PatchOperation) -> EngineResult<()> {
    match segments {
        [field] if field == CHILD_DIAGRAM => {
            let exists = block.child_diagram.is_some();
            match op {
                PatchOperation::Add { .. } if exists => {
                    Err(conflict(op, ConflictReason::AlreadyExists))
                }
                PatchOperation::Remove { .. } | PatchOperation::Replace { .. } if !exists => {
                    Err(conflict(op, ConflictReason::MissingTarget))
                }
                PatchOperation::Remove { .. } => {
                    block.child_diagram = None;
                    Ok(())
                }
                PatchOperation::Add { value, .. } | PatchOperation::Replace { value, .. } => {
                    block.child_diagram = Some(Box::new(decode(op, value)?));
                    Ok(())
                }
            }
        }
        [field, rest @ ..] if field == CHILD_DIAGRAM => {
            let child = block
                .child_diagram
                .as_deref_mut()
                .ok_or_else(|| conflict(op, ConflictReason::MissingTarget))?;
            apply_in(child, rest, op)
        }
        [field, key] if field == ATTRIBUTES => {
            let exists = block.attributes.contains_key(key.as_str());
            match op {
                PatchOperation::Add { .. } if exists => {
                    Err(conflict(op, ConflictReason::AlreadyExists))
                }
                PatchOperation::Remove { .. } | PatchOperation::Replace { .. } if !exists => {
                    Err(conflict(op, ConflictReason::MissingTarget))
                }
                PatchOperation::Remove { .. } => {
                    block.attributes.remove(key.as_str());
                    Ok(())
                }
                PatchOperation::Add { value, .. } | PatchOperation::Replace { value, .. } => {
                    let text: String = decode(op, value)?;
                    block.attributes.insert(key.clone(), text);
                    Ok(())
                }
            }
        }
        [field] => {
            let PatchOperation::Replace { value, .. } = op else {
                return Err(conflict(op, ConflictReason::UnsupportedOperation));
            };
            match field.as_str() {
                "name" => block.name = decode(op, value)?,
                "description" => block.description = decode(op, value)?,
                "type" => block.block_type = decode(op, value)?,
                "status" => block.status = decode(op, value)?,
                "verified" => block.verified = decode(op, value)?,
                "interfaces" => block.interfaces = decode(op, value)?,
                "links" => block.links = decode(op, value)?,
                ATTRIBUTES => block.attributes = decode(op, value)?,
                _ => return Err(conflict(op, ConflictReason::UnsupportedPath)),
            }
            Ok(())
        }
        _ => Err(conflict(op, ConflictReason::UnsupportedPath)),
    }
}
