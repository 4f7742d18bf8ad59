//! Structural and referential validation
//!
//! [`validate`] runs the checks cheapest-first so that a malformed document
//! fails fast:
//!
//! 1. required fields present
//! 2. schema version known
//! 3. connection endpoints resolve to existing blocks and ports
//! 4. link completeness per kind
//! 5. hierarchy interface consistency
//!
//! Validation never mutates the graph and never fails; everything it finds
//! is returned as [`Finding`] data.

use crate::config::EngineConfig;
use crate::migrate::is_known_version;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use sysblock_model::{
    Block, BlockId, ConnectionId, DiagramPath, Graph, PortId, RequirementId,
};

/// Finding severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational problem; the data is usable
    Warning,
    /// The data violates a rule or invariant
    Error,
}

/// Machine-readable finding code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCode {
    /// A required field is absent or empty
    MissingField,
    /// Schema version not recognised
    SchemaVersion,
    /// Connection references a block that does not exist
    DanglingBlock,
    /// Connection references a port that does not exist
    DanglingPort,
    /// Connection joins a block to itself
    SelfConnection,
    /// Two connections share the same endpoint tuple
    DuplicateConnection,
    /// Port id declared twice on one block
    DuplicatePort,
    /// Requirement id used twice in one diagram
    DuplicateRequirement,
    /// Link misses kind-specific required fields
    LinkIncomplete,
    /// Child diagram boundary ports not declared on the parent block
    HierarchyInterfaceMismatch,
    /// Connected endpoints run at incompatible logic levels
    LogicLevelMismatch,
    /// Consumers draw more than a rail supplies
    PowerBudgetExceeded,
    /// An electrical quantity could not be parsed
    UnparsableQuantity,
    /// Status claims more completeness than the data supports
    IncompleteImplementation,
    /// Block without connections
    OrphanBlock,
    /// Block still at placeholder status
    PlaceholderBlock,
    /// Requirement not met
    RequirementViolated,
    /// Requirement target or value cannot be evaluated
    RequirementUnresolved,
}

impl FindingCode {
    /// Codes that make a graph unusable as a store
    #[must_use]
    pub const fn is_structural(self) -> bool {
        matches!(
            self,
            Self::MissingField
                | Self::DanglingBlock
                | Self::DanglingPort
                | Self::SelfConnection
                | Self::DuplicateConnection
                | Self::DuplicatePort
                | Self::DuplicateRequirement
        )
    }
}

impl fmt::Display for FindingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();
        f.write_str(&text)
    }
}

/// Entity a finding points at, for highlighting
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum EntityRef {
    /// A block
    Block(BlockId),
    /// A connection
    Connection(ConnectionId),
    /// A port on a block
    Port(BlockId, PortId),
    /// A requirement
    Requirement(RequirementId),
}

/// A structured validation or rule result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// What was found
    pub code: FindingCode,
    /// How bad it is
    pub severity: Severity,
    /// Human-readable explanation
    pub message: String,
    /// Offending entities
    pub entity_ids: Vec<EntityRef>,
    /// Diagram the entities live in
    #[serde(default, skip_serializing_if = "DiagramPath::is_root")]
    pub scope: DiagramPath,
}

impl Finding {
    /// Error finding
    #[must_use]
    pub fn error(code: FindingCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
            entity_ids: Vec::new(),
            scope: DiagramPath::root(),
        }
    }

    /// Warning finding
    #[must_use]
    pub fn warning(code: FindingCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    /// Attach an offending entity
    #[must_use]
    pub fn with_entity(mut self, entity: EntityRef) -> Self {
        self.entity_ids.push(entity);
        self
    }

    /// Attach an offending block
    #[must_use]
    pub fn with_block(self, id: &BlockId) -> Self {
        self.with_entity(EntityRef::Block(id.clone()))
    }

    /// Attach an offending connection
    #[must_use]
    pub fn with_connection(self, id: &ConnectionId) -> Self {
        self.with_entity(EntityRef::Connection(id.clone()))
    }

    /// Set the diagram scope
    #[must_use]
    pub fn in_scope(mut self, scope: DiagramPath) -> Self {
        self.scope = scope;
        self
    }

    /// Whether severity is error
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Whether the finding names the block
    #[must_use]
    pub fn mentions_block(&self, id: &BlockId) -> bool {
        self.entity_ids.iter().any(|e| match e {
            EntityRef::Block(b) | EntityRef::Port(b, _) => b == id,
            _ => false,
        })
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{level}[{}] {}: {}", self.code, self.scope, self.message)
    }
}

/// Error/warning counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FindingSummary {
    /// Findings with error severity
    pub errors: usize,
    /// Findings with warning severity
    pub warnings: usize,
}

impl FindingSummary {
    /// Count findings
    #[must_use]
    pub fn of(findings: &[Finding]) -> Self {
        findings.iter().fold(Self::default(), |mut acc, f| {
            match f.severity {
                Severity::Error => acc.errors += 1,
                Severity::Warning => acc.warnings += 1,
            }
            acc
        })
    }

    /// Whether any error was found
    #[inline]
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// Validate a graph and all nested child diagrams
#[must_use]
pub fn validate(graph: &Graph) -> Vec<Finding> {
    validate_with(graph, &EngineConfig::default())
}

/// Structural errors only, the findings that make a graph unusable
pub(crate) fn structural_errors(graph: &Graph) -> Vec<Finding> {
    validate(graph)
        .into_iter()
        .filter(|f| f.is_error() && f.code.is_structural())
        .collect()
}

/// Validate a graph, honouring `config.recurse_into_children`
#[must_use]
pub fn validate_with(graph: &Graph, config: &EngineConfig) -> Vec<Finding> {
    let diagrams = if config.recurse_into_children {
        graph.walk()
    } else {
        vec![(DiagramPath::root(), graph)]
    };

    let mut findings = Vec::new();
    for (scope, diagram) in diagrams {
        let mut local = Vec::new();
        check_required_fields(diagram, scope.is_root(), &mut local);
        check_schema_version(diagram, &mut local);
        check_references(diagram, &mut local);
        check_links(diagram, &mut local);
        check_hierarchy(diagram, &mut local);
        findings.extend(local.into_iter().map(|f| f.in_scope(scope.clone())));
    }
    findings
}

fn check_required_fields(graph: &Graph, is_root: bool, out: &mut Vec<Finding>) {
    // child diagrams inherit the root's version when they carry none
    if is_root && graph.schema_version.trim().is_empty() {
        out.push(Finding::error(
            FindingCode::MissingField,
            "schemaVersion is empty",
        ));
    }
    for block in graph.blocks.values() {
        if block.id.is_empty() {
            out.push(Finding::error(FindingCode::MissingField, "block with empty id"));
        }
    }
    for conn in graph.connections.values() {
        let empty = [
            ("id", conn.id.is_empty()),
            ("fromBlock", conn.from_block.is_empty()),
            ("fromPort", conn.from_port.is_empty()),
            ("toBlock", conn.to_block.is_empty()),
            ("toPort", conn.to_port.is_empty()),
        ];
        for (field, is_empty) in empty {
            if is_empty {
                out.push(
                    Finding::error(
                        FindingCode::MissingField,
                        format!("connection '{}' has empty {field}", conn.id),
                    )
                    .with_connection(&conn.id),
                );
            }
        }
    }
    for req in &graph.requirements {
        if req.id.is_empty() {
            out.push(Finding::error(
                FindingCode::MissingField,
                "requirement with empty id",
            ));
        }
    }
}

fn check_schema_version(graph: &Graph, out: &mut Vec<Finding>) {
    let version = graph.schema_version.trim();
    if !version.is_empty() && !is_known_version(version) {
        out.push(Finding::error(
            FindingCode::SchemaVersion,
            format!("unknown schema version '{version}'"),
        ));
    }
}

fn check_references(graph: &Graph, out: &mut Vec<Finding>) {
    for block in graph.blocks.values() {
        let mut seen = HashSet::new();
        for port in &block.interfaces {
            if !seen.insert(&port.id) {
                out.push(
                    Finding::error(
                        FindingCode::DuplicatePort,
                        format!("port '{}' declared twice on block '{}'", port.id, block.id),
                    )
                    .with_entity(EntityRef::Port(block.id.clone(), port.id.clone())),
                );
            }
        }
    }

    let mut tuples: HashMap<_, &ConnectionId> = HashMap::new();
    for conn in graph.connections.values() {
        for (block_id, port_id) in [
            (&conn.from_block, &conn.from_port),
            (&conn.to_block, &conn.to_port),
        ] {
            match graph.block(block_id) {
                None => out.push(
                    Finding::error(
                        FindingCode::DanglingBlock,
                        format!("connection '{}' references missing block '{block_id}'", conn.id),
                    )
                    .with_connection(&conn.id),
                ),
                Some(block) if !block.has_port(port_id) => out.push(
                    Finding::error(
                        FindingCode::DanglingPort,
                        format!(
                            "connection '{}' references missing port '{port_id}' on block '{block_id}'",
                            conn.id
                        ),
                    )
                    .with_connection(&conn.id)
                    .with_block(block_id),
                ),
                Some(_) => {}
            }
        }

        if conn.is_self_loop() {
            out.push(
                Finding::error(
                    FindingCode::SelfConnection,
                    format!("connection '{}' joins block '{}' to itself", conn.id, conn.from_block),
                )
                .with_connection(&conn.id)
                .with_block(&conn.from_block),
            );
        }

        if let Some(existing) = tuples.insert(conn.tuple(), &conn.id) {
            out.push(
                Finding::error(
                    FindingCode::DuplicateConnection,
                    format!(
                        "connections '{existing}' and '{}' join the same endpoints",
                        conn.id
                    ),
                )
                .with_connection(existing)
                .with_connection(&conn.id),
            );
        }
    }

    let mut requirement_ids = HashSet::new();
    for req in &graph.requirements {
        if !requirement_ids.insert(&req.id) {
            out.push(
                Finding::error(
                    FindingCode::DuplicateRequirement,
                    format!("requirement id '{}' is used more than once", req.id),
                )
                .with_entity(EntityRef::Requirement(req.id.clone())),
            );
        }
    }
}

fn check_links(graph: &Graph, out: &mut Vec<Finding>) {
    for block in graph.blocks.values() {
        for link in &block.links {
            let missing = link.missing_fields();
            if !missing.is_empty() {
                out.push(
                    Finding::warning(
                        FindingCode::LinkIncomplete,
                        format!(
                            "{} link on block '{}' is missing {}",
                            link.kind(),
                            block.id,
                            missing.join(", ")
                        ),
                    )
                    .with_block(&block.id),
                );
            }
        }
    }
}

/// Whether a block is a boundary stub inside a child diagram
#[must_use]
pub fn is_boundary_block(block: &Block) -> bool {
    block
        .attribute("boundary")
        .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "yes" | "1"))
}

fn check_hierarchy(graph: &Graph, out: &mut Vec<Finding>) {
    for block in graph.blocks.values() {
        let Some(child) = block.child_diagram.as_deref() else {
            continue;
        };
        if block.interfaces.is_empty() {
            continue;
        }
        for stub in child.blocks.values().filter(|b| is_boundary_block(b)) {
            for port in &stub.interfaces {
                if !block.has_port(&port.id) {
                    out.push(
                        Finding::warning(
                            FindingCode::HierarchyInterfaceMismatch,
                            format!(
                                "boundary port '{}' of child block '{}' is not declared on parent block '{}'",
                                port.id, stub.id, block.id
                            ),
                        )
                        .with_block(&block.id)
                        .with_entity(EntityRef::Port(stub.id.clone(), port.id.clone())),
                    );
                }
            }
        }
    }
}

/// Check required fields of a raw document before it is typed
///
/// Recurses into `childDiagram` objects. An absent `schemaVersion` is a
/// warning because the migrator reads such documents as the baseline.
#[must_use]
pub fn validate_document(document: &Value) -> Vec<Finding> {
    let mut out = Vec::new();
    check_document(document, &DiagramPath::root(), &mut out);
    out
}

fn check_document(document: &Value, scope: &DiagramPath, out: &mut Vec<Finding>) {
    let push = |out: &mut Vec<Finding>, finding: Finding| out.push(finding.in_scope(scope.clone()));

    let Some(root) = document.as_object() else {
        push(out, Finding::error(FindingCode::MissingField, "document is not an object"));
        return;
    };

    match root.get("schemaVersion") {
        None => push(
            out,
            Finding::warning(
                FindingCode::SchemaVersion,
                "schemaVersion absent; document is read as the baseline version",
            ),
        ),
        Some(Value::String(_)) => {}
        Some(_) => push(
            out,
            Finding::error(FindingCode::MissingField, "schemaVersion is not a string"),
        ),
    }

    match root.get("blocks").and_then(Value::as_array) {
        None => push(out, Finding::error(FindingCode::MissingField, "blocks list missing")),
        Some(blocks) => {
            for (index, block) in blocks.iter().enumerate() {
                let id = block.get("id").and_then(Value::as_str);
                match id {
                    None | Some("") => push(
                        out,
                        Finding::error(
                            FindingCode::MissingField,
                            format!("block #{index} has no id"),
                        ),
                    ),
                    Some(id) => {
                        if block.get("name").is_none() {
                            push(
                                out,
                                Finding::error(
                                    FindingCode::MissingField,
                                    format!("block '{id}' has no name"),
                                )
                                .with_block(&BlockId::new(id)),
                            );
                        }
                        if let Some(child) = block.get("childDiagram").filter(|c| !c.is_null()) {
                            check_document(child, &scope.child(BlockId::new(id)), out);
                        }
                    }
                }
            }
        }
    }

    match root.get("connections").and_then(Value::as_array) {
        None => push(
            out,
            Finding::error(FindingCode::MissingField, "connections list missing"),
        ),
        Some(connections) => {
            for (index, conn) in connections.iter().enumerate() {
                for field in ["id", "fromBlock", "fromPort", "toBlock", "toPort"] {
                    let present = conn
                        .get(field)
                        .and_then(Value::as_str)
                        .is_some_and(|v| !v.is_empty());
                    if !present {
                        push(
                            out,
                            Finding::error(
                                FindingCode::MissingField,
                                format!("connection #{index} has no {field}"),
                            ),
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sysblock_model::{
        ArrowDirection, BlockType, Connection, ConnectionType, Endpoint, Link, Port,
    };

    fn block(id: &str, ports: &[&str]) -> Block {
        let mut b = Block::new(id, id.to_uppercase(), BlockType::Electrical);
        for p in ports {
            b.interfaces.push(Port::new(*p, *p, "signal"));
        }
        b
    }

    fn connect(graph: &mut Graph, id: &str, from: (&str, &str), to: (&str, &str)) {
        graph.connections.insert(
            id.into(),
            Connection::new(
                id,
                Endpoint::new(from.0, from.1),
                Endpoint::new(to.0, to.1),
                ConnectionType::Data,
                ArrowDirection::Forward,
            ),
        );
    }

    fn two_blocks() -> Graph {
        let mut graph = Graph::new();
        graph.blocks.insert("a".into(), block("a", &["p1"]));
        graph.blocks.insert("b".into(), block("b", &["p2"]));
        graph
    }

    #[test]
    fn clean_graph_has_no_findings() {
        let mut graph = two_blocks();
        connect(&mut graph, "c1", ("a", "p1"), ("b", "p2"));
        assert!(validate(&graph).is_empty());
    }

    #[test]
    fn dangling_block_and_port_are_errors() {
        let mut graph = two_blocks();
        connect(&mut graph, "c1", ("a", "p1"), ("zz", "p2"));
        connect(&mut graph, "c2", ("a", "nope"), ("b", "p2"));
        let findings = validate(&graph);
        let codes: Vec<_> = findings.iter().map(|f| f.code).collect();
        assert!(codes.contains(&FindingCode::DanglingBlock));
        assert!(codes.contains(&FindingCode::DanglingPort));
        assert!(findings.iter().all(Finding::is_error));
    }

    #[test]
    fn self_and_duplicate_connections_are_reported() {
        let mut graph = two_blocks();
        graph.blocks.get_mut("a").unwrap().interfaces.push(Port::new("p9", "p9", "x"));
        connect(&mut graph, "c1", ("a", "p1"), ("a", "p9"));
        connect(&mut graph, "c2", ("a", "p1"), ("b", "p2"));
        connect(&mut graph, "c3", ("a", "p1"), ("b", "p2"));
        let codes: Vec<_> = validate(&graph).iter().map(|f| f.code).collect();
        assert!(codes.contains(&FindingCode::SelfConnection));
        assert!(codes.contains(&FindingCode::DuplicateConnection));
    }

    #[test]
    fn incomplete_link_is_warning() {
        let mut graph = two_blocks();
        graph.blocks.get_mut("a").unwrap().links.push(Link::Cad {
            occurrence_token: Some("occ".into()),
            document_id: None,
            label: None,
        });
        let findings = validate(&graph);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, FindingCode::LinkIncomplete);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert!(findings[0].message.contains("documentId"));
    }

    #[test]
    fn unknown_schema_version_is_error() {
        let mut graph = two_blocks();
        graph.schema_version = "7.3".into();
        let findings = validate(&graph);
        assert_eq!(findings[0].code, FindingCode::SchemaVersion);
    }

    #[test]
    fn hierarchy_boundary_ports_match_by_id() {
        let mut child = Graph::new();
        let mut stub = block("edge", &["i1", "x2"]);
        stub.interfaces[0].name = "Serial".into();
        stub.interfaces[1].name = "SPI".into();
        stub.attributes.insert("boundary".into(), "true".into());
        child.blocks.insert("edge".into(), stub);

        let mut parent = block("p", &[]);
        parent.interfaces.push(Port::new("i1", "SPI", "data"));
        parent.child_diagram = Some(Box::new(child));

        let mut graph = Graph::new();
        graph.blocks.insert("p".into(), parent);

        let findings = validate(&graph);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, FindingCode::HierarchyInterfaceMismatch);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert!(findings[0].message.contains("'x2'"));
        assert!(!findings[0].message.contains("'i1'"));
    }

    #[test]
    fn repeated_requirement_id_is_structural() {
        let mut graph = two_blocks();
        let req = sysblock_model::Requirement {
            id: "r".into(),
            target: sysblock_model::AttributeRef {
                block: "a".into(),
                attribute: "voltage".into(),
            },
            operator: sysblock_model::Comparison::Equal,
            target_value: "3.3".into(),
            unit: None,
        };
        graph.requirements.push(req.clone());
        graph.requirements.push(req);

        let findings = validate(&graph);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, FindingCode::DuplicateRequirement);
        assert!(findings[0].code.is_structural());
    }

    #[test]
    fn nested_findings_carry_scope() {
        let mut child = two_blocks();
        connect(&mut child, "c1", ("a", "p1"), ("ghost", "p"));
        let mut parent = block("p", &[]);
        parent.child_diagram = Some(Box::new(child));
        let mut graph = Graph::new();
        graph.blocks.insert("p".into(), parent);

        let findings = validate(&graph);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].scope, DiagramPath::root().child("p".into()));

        let shallow = validate_with(&graph, &EngineConfig::new().with_recursion(false));
        assert!(shallow.is_empty());
    }

    #[test]
    fn raw_document_required_fields() {
        let findings = validate_document(&json!({
            "blocks": [{"id": "b1"}, {"name": "anonymous"}],
            "connections": [{"id": "c1", "fromBlock": "b1"}]
        }));
        let summary = FindingSummary::of(&findings);
        assert!(summary.has_errors());
        assert_eq!(summary.warnings, 1);
        assert!(findings.iter().any(|f| f.message.contains("block 'b1' has no name")));
        assert!(findings.iter().any(|f| f.message.contains("block #1 has no id")));
        assert!(findings.iter().any(|f| f.message.contains("no toPort")));
    }

    #[test]
    fn raw_document_missing_lists() {
        let findings = validate_document(&json!({"schemaVersion": "1.2"}));
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.code == FindingCode::MissingField));
    }
}
