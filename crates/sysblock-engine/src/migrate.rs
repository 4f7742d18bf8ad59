//! Schema migration
//!
//! Raw documents are upgraded step by step on their JSON form before they
//! are typed into a [`Graph`]. Migration is forward-only: a document newer
//! than [`CURRENT_SCHEMA_VERSION`] is refused rather than guessed at.

use crate::error::{EngineError, EngineResult};
use crate::validation::{validate_document, Finding};
use serde_json::{json, Map, Value};
use sysblock_model::{Graph, BASELINE_SCHEMA_VERSION, CURRENT_SCHEMA_VERSION};

/// Every schema version this engine has shipped, oldest first
pub const KNOWN_SCHEMA_VERSIONS: &[&str] = &["1.0", "1.1", "1.2"];

type Upgrade = fn(&mut Map<String, Value>);

/// One forward step between adjacent schema versions
struct MigrationStep {
    from: &'static str,
    to: &'static str,
    upgrade: Upgrade,
}

const STEPS: &[MigrationStep] = &[
    MigrationStep {
        from: "1.0",
        to: "1.1",
        upgrade: add_requirements_and_defaults,
    },
    MigrationStep {
        from: "1.1",
        to: "1.2",
        upgrade: connection_defaults_and_cad_links,
    },
];

/// Whether the engine recognises this version string
#[must_use]
pub fn is_known_version(version: &str) -> bool {
    KNOWN_SCHEMA_VERSIONS.contains(&version)
}

/// `"1.2"` → `(1, 2)`; a bare major means minor 0
fn parse_version(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.trim().splitn(2, '.');
    let major = parts.next()?.parse().ok()?;
    let minor = match parts.next() {
        Some(m) => m.parse().ok()?,
        None => 0,
    };
    Some((major, minor))
}

fn unsupported(found: &str) -> EngineError {
    EngineError::SchemaVersion {
        found: found.to_string(),
        supported: CURRENT_SCHEMA_VERSION,
    }
}

/// Upgrade a raw document to the current schema and type it
///
/// A document without `schemaVersion` is read as [`BASELINE_SCHEMA_VERSION`].
/// Every step newer than the document's version runs in order, on the root
/// and on every nested `childDiagram`. The result is stamped
/// [`CURRENT_SCHEMA_VERSION`].
///
/// # Errors
/// - [`EngineError::SchemaVersion`] if the version is newer than supported
///   or not a version number
/// - [`EngineError::MalformedDocument`] if required fields are missing or the
///   upgraded document does not decode
pub fn migrate(document: Value) -> EngineResult<Graph> {
    let Value::Object(mut root) = document else {
        return Err(EngineError::MalformedDocument(
            "document is not an object".into(),
        ));
    };

    let found = match root.get("schemaVersion") {
        None | Some(Value::Null) => BASELINE_SCHEMA_VERSION.to_string(),
        Some(Value::String(v)) => v.trim().to_string(),
        Some(other) => {
            return Err(EngineError::MalformedDocument(format!(
                "schemaVersion must be a string, got {other}"
            )))
        }
    };

    let version = parse_version(&found).ok_or_else(|| unsupported(&found))?;
    let current = parse_version(CURRENT_SCHEMA_VERSION).unwrap_or_default();
    if version > current {
        tracing::warn!(found = %found, supported = CURRENT_SCHEMA_VERSION, "Refusing newer document");
        return Err(unsupported(&found));
    }

    root.insert("schemaVersion".into(), Value::String(found.clone()));
    let document = Value::Object(root);
    let problems: Vec<Finding> = validate_document(&document)
        .into_iter()
        .filter(Finding::is_error)
        .collect();
    if !problems.is_empty() {
        let detail = problems
            .iter()
            .map(|f| format!("{}: {}", f.scope, f.message))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(EngineError::MalformedDocument(detail));
    }
    let Value::Object(mut root) = document else {
        return Err(EngineError::MalformedDocument(
            "document is not an object".into(),
        ));
    };

    let mut applied = 0usize;
    for step in STEPS {
        let to = parse_version(step.to).unwrap_or_default();
        if version < to {
            tracing::debug!(from = step.from, to = step.to, "Applying migration step");
            apply_recursive(&mut root, step.upgrade);
            applied += 1;
        }
    }
    stamp_current(&mut root);

    let graph: Graph = serde_json::from_value(Value::Object(root))
        .map_err(|e| EngineError::MalformedDocument(e.to_string()))?;

    if applied > 0 {
        tracing::info!(
            from = %found,
            to = CURRENT_SCHEMA_VERSION,
            steps = applied,
            "Migrated document"
        );
    }
    Ok(graph)
}

fn child_diagrams(graph: &mut Map<String, Value>) -> impl Iterator<Item = &mut Map<String, Value>> {
    graph
        .get_mut("blocks")
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten()
        .filter_map(|block| block.get_mut("childDiagram").and_then(Value::as_object_mut))
}

fn apply_recursive(graph: &mut Map<String, Value>, upgrade: Upgrade) {
    upgrade(graph);
    for child in child_diagrams(graph) {
        apply_recursive(child, upgrade);
    }
}

fn stamp_current(graph: &mut Map<String, Value>) {
    graph.insert(
        "schemaVersion".into(),
        Value::String(CURRENT_SCHEMA_VERSION.to_string()),
    );
    for child in child_diagrams(graph) {
        stamp_current(child);
    }
}

/// Fill `key` with `default` when absent or null
fn default_field(object: &mut Map<String, Value>, key: &str, default: Value) {
    match object.get(key) {
        None | Some(Value::Null) => {
            object.insert(key.to_string(), default);
        }
        Some(_) => {}
    }
}

fn objects<'a>(
    graph: &'a mut Map<String, Value>,
    key: &str,
) -> impl Iterator<Item = &'a mut Map<String, Value>> {
    graph
        .get_mut(key)
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object_mut)
}

/// 1.0 → 1.1: requirements and metadata appear; block collections default
fn add_requirements_and_defaults(graph: &mut Map<String, Value>) {
    default_field(graph, "requirements", json!([]));
    default_field(graph, "metadata", json!({}));
    for block in objects(graph, "blocks") {
        default_field(block, "attributes", json!({}));
        default_field(block, "interfaces", json!([]));
        default_field(block, "links", json!([]));
    }
}

/// 1.1 → 1.2: explicit connection type/direction; single `cadLink` becomes
/// an entry in `links`
fn connection_defaults_and_cad_links(graph: &mut Map<String, Value>) {
    for conn in objects(graph, "connections") {
        default_field(conn, "type", json!("Auto"));
        default_field(conn, "arrowDirection", json!("forward"));
    }
    for block in objects(graph, "blocks") {
        let Some(legacy) = block.remove("cadLink") else {
            continue;
        };
        let Value::Object(mut link) = legacy else {
            continue;
        };
        link.insert("kind".into(), json!("cad"));
        default_field(block, "links", json!([]));
        if let Some(links) = block.get_mut("links").and_then(Value::as_array_mut) {
            links.push(Value::Object(link));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysblock_model::{ArrowDirection, BlockId, ConnectionType, Link};

    #[test]
    fn missing_version_is_baseline_and_gets_requirements() {
        let graph = migrate(json!({
            "blocks": [{"id": "b1", "name": "Test", "type": "Generic", "status": "Placeholder", "interfaces": []}],
            "connections": []
        }))
        .unwrap();
        assert_eq!(graph.schema_version, CURRENT_SCHEMA_VERSION);
        assert!(graph.requirements.is_empty());
        assert_eq!(graph.blocks.len(), 1);
    }

    #[test]
    fn newer_version_is_refused() {
        let err = migrate(json!({"schemaVersion": "99.0", "blocks": [], "connections": []}))
            .unwrap_err();
        assert!(matches!(err, EngineError::SchemaVersion { ref found, .. } if found == "99.0"));
        assert!(err.is_fatal_at_load());
    }

    #[test]
    fn garbage_version_is_refused() {
        let err = migrate(json!({"schemaVersion": "next", "blocks": [], "connections": []}))
            .unwrap_err();
        assert!(matches!(err, EngineError::SchemaVersion { .. }));
    }

    #[test]
    fn legacy_cad_link_and_connection_defaults() {
        let graph = migrate(json!({
            "schemaVersion": "1.1",
            "blocks": [
                {"id": "a", "name": "A", "interfaces": [{"id": "p", "name": "P"}],
                 "cadLink": {"occurrenceToken": "occ", "documentId": "doc"}},
                {"id": "b", "name": "B", "interfaces": [{"id": "q", "name": "Q"}]}
            ],
            "connections": [{"id": "c", "fromBlock": "a", "fromPort": "p", "toBlock": "b", "toPort": "q"}],
            "requirements": []
        }))
        .unwrap();
        let a = graph.block(&BlockId::new("a")).unwrap();
        assert_eq!(a.links, vec![Link::cad("occ", "doc")]);
        let conn = graph.connections.values().next().unwrap();
        assert_eq!(conn.connection_type, ConnectionType::Auto);
        assert_eq!(conn.arrow_direction, ArrowDirection::Forward);
    }

    #[test]
    fn child_diagrams_are_upgraded_and_stamped() {
        let graph = migrate(json!({
            "blocks": [{
                "id": "p", "name": "Parent",
                "childDiagram": {"blocks": [{"id": "c", "name": "Child"}], "connections": []}
            }],
            "connections": []
        }))
        .unwrap();
        let child = graph.block(&BlockId::new("p")).unwrap().child_diagram.as_deref().unwrap();
        assert_eq!(child.schema_version, CURRENT_SCHEMA_VERSION);
        assert!(child.requirements.is_empty());
    }

    #[test]
    fn missing_required_fields_are_malformed() {
        let err = migrate(json!({"blocks": [{"name": "no id"}], "connections": []})).unwrap_err();
        assert!(matches!(err, EngineError::MalformedDocument(ref m) if m.contains("no id")));
        assert!(matches!(migrate(json!([1, 2])), Err(EngineError::MalformedDocument(_))));
    }

    #[test]
    fn current_documents_pass_through() {
        let graph = Graph::new();
        let value = serde_json::to_value(&graph).unwrap();
        let migrated = migrate(value).unwrap();
        assert!(graph.semantically_eq(&migrated));
    }

    #[test]
    fn version_parsing() {
        assert_eq!(parse_version("1.2"), Some((1, 2)));
        assert_eq!(parse_version("2"), Some((2, 0)));
        assert_eq!(parse_version("x.1"), None);
        assert!(is_known_version("1.1"));
        assert!(!is_known_version("1.3"));
    }
}
