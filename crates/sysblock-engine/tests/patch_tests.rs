//! Property tests for patches and cascading removal

use proptest::prelude::*;
use sysblock_engine::{
    apply_patch, compute_patch, is_trivial_patch, EngineError, GraphStore, PatchOperation,
};
use sysblock_model::{
    ArrowDirection, AttributeRef, Block, BlockId, BlockType, Comparison, ConnectionType,
    EntityPath, Graph, Link, Requirement,
};
use sysblock_test_utils::{block_with_ports, connection, insert_block, insert_connection};

const IDS: [&str; 5] = ["a", "b", "c", "d", "e"];
const INNER: [&str; 3] = ["x", "y", "z"];
const REQUIREMENT_IDS: [&str; 3] = ["r1", "r2", "r3"];

#[derive(Debug, Clone)]
struct BlockShape {
    present: bool,
    name: u8,
    attribute: Option<u8>,
    described: bool,
    link: u8,
    unnamed_attribute: bool,
}

fn block_shape() -> impl Strategy<Value = BlockShape> {
    (
        any::<bool>(),
        0..3u8,
        proptest::option::of(0..3u8),
        any::<bool>(),
        0..4u8,
        any::<bool>(),
    )
        .prop_map(|(present, name, attribute, described, link, unnamed_attribute)| BlockShape {
            present,
            name,
            attribute,
            described,
            link,
            unnamed_attribute,
        })
}

fn shaped(id: &str, shape: &BlockShape) -> Block {
    let mut block = block_with_ports(id, &["p", "q"]);
    block.name = format!("{id}-{}", shape.name);
    if shape.described {
        block.description = "described".into();
    }
    if let Some(v) = shape.attribute {
        block.attributes.insert("rating".into(), format!("{v}V"));
    }
    if shape.unnamed_attribute {
        block.attributes.insert(String::new(), "blank key".into());
    }
    match shape.link {
        1 => block.links.push(Link::cad(format!("occ-{id}"), "doc-1")),
        2 => block.links.push(Link::ecad(format!("U-{id}"))),
        3 => block.links.push(Link::external(format!("PN-{id}"))),
        _ => {}
    }
    block
}

#[derive(Debug, Clone)]
struct Edge {
    from: usize,
    to: usize,
    kind: usize,
    direction: usize,
}

fn edge() -> impl Strategy<Value = Edge> {
    (0..IDS.len(), 0..IDS.len(), 0..5usize, 0..4usize)
        .prop_map(|(from, to, kind, direction)| Edge { from, to, kind, direction })
}

#[derive(Debug, Clone)]
struct Extras {
    requirements: Vec<Option<(u8, u8, usize)>>,
    revision: Option<u8>,
    children: Vec<Option<u8>>,
}

fn extras() -> impl Strategy<Value = Extras> {
    (
        proptest::collection::vec(
            proptest::option::of((0..6u8, 0..3u8, 0..IDS.len())),
            REQUIREMENT_IDS.len(),
        ),
        proptest::option::of(0..3u8),
        proptest::collection::vec(proptest::option::of(0..3u8), INNER.len()),
    )
        .prop_map(|(requirements, revision, children)| Extras {
            requirements,
            revision,
            children,
        })
}

fn requirement(id: &str, operator: u8, value: u8, block: &str) -> Requirement {
    let operator = match operator {
        0 => Comparison::Less,
        1 => Comparison::LessOrEqual,
        2 => Comparison::Equal,
        3 => Comparison::GreaterOrEqual,
        4 => Comparison::Greater,
        _ => Comparison::NotEqual,
    };
    Requirement {
        id: id.into(),
        target: AttributeRef {
            block: BlockId::new(block),
            attribute: "rating".into(),
        },
        operator,
        target_value: value.to_string(),
        unit: Some("V".into()),
    }
}

fn build(shapes: &[BlockShape], edges: &[Edge], nested: bool, extras: &Extras) -> Graph {
    const KINDS: [ConnectionType; 5] = [
        ConnectionType::Power,
        ConnectionType::Data,
        ConnectionType::Electrical,
        ConnectionType::Mechanical,
        ConnectionType::Auto,
    ];
    const DIRECTIONS: [ArrowDirection; 4] = [
        ArrowDirection::Forward,
        ArrowDirection::Backward,
        ArrowDirection::Bidirectional,
        ArrowDirection::None,
    ];

    let mut graph = Graph::new();
    for (shape, id) in shapes.iter().zip(IDS) {
        if shape.present {
            insert_block(&mut graph, shaped(id, shape));
        }
    }
    for e in edges {
        let (from, to) = (IDS[e.from], IDS[e.to]);
        if from == to || !graph.blocks.contains_key(from) || !graph.blocks.contains_key(to) {
            continue;
        }
        let mut conn = connection(&format!("{from}-{to}"), (from, "p"), (to, "q"), KINDS[e.kind]);
        conn.arrow_direction = DIRECTIONS[e.direction];
        insert_connection(&mut graph, conn);
    }
    for (slot, id) in extras.requirements.iter().zip(REQUIREMENT_IDS) {
        if let Some((operator, value, block)) = *slot {
            graph.requirements.push(requirement(id, operator, value, IDS[block]));
        }
    }
    if let Some(revision) = extras.revision {
        graph.metadata.extra.insert("revision".into(), revision.into());
    }
    if nested {
        if let Some(first) = graph.blocks.values_mut().next() {
            let mut child = Graph::new();
            for (slot, id) in extras.children.iter().zip(INNER) {
                if let Some(name) = *slot {
                    let mut inner = block_with_ports(id, &["p"]);
                    inner.name = format!("{id}-{name}");
                    insert_block(&mut child, inner);
                }
            }
            first.child_diagram = Some(Box::new(child));
        }
    }
    graph
}

fn graph_strategy() -> impl Strategy<Value = Graph> {
    (
        proptest::collection::vec(block_shape(), IDS.len()),
        proptest::collection::vec(edge(), 0..8),
        any::<bool>(),
        extras(),
    )
        .prop_map(|(shapes, edges, nested, extras)| build(&shapes, &edges, nested, &extras))
}

/// Send a patch through its document form, as a stored delta would travel
fn via_json(patch: &[PatchOperation]) -> Vec<PatchOperation> {
    let text = serde_json::to_string(patch).unwrap();
    serde_json::from_str(&text).unwrap()
}

proptest! {
    #[test]
    fn prop_applying_computed_patch_reaches_target(old in graph_strategy(), new in graph_strategy()) {
        let patch = via_json(&compute_patch(&old, &new));
        let patched = apply_patch(&old, &patch).unwrap();
        prop_assert!(patched.semantically_eq(&new));
    }

    #[test]
    fn prop_self_patch_is_trivial(graph in graph_strategy()) {
        prop_assert!(is_trivial_patch(&compute_patch(&graph, &graph)));
    }

    #[test]
    fn prop_block_removal_leaves_no_dangling_connections(graph in graph_strategy(), pick in 0..IDS.len()) {
        let id = sysblock_model::BlockId::new(IDS[pick]);
        let present = graph.blocks.contains_key(&id);
        let mut store = GraphStore::open(graph).unwrap();

        let removed = store.remove_block(&id);
        prop_assert_eq!(removed.is_ok(), present);
        prop_assert!(store.graph().connections.values().all(|c| !c.touches(&id)));
        prop_assert!(sysblock_engine::validate(store.graph()).iter().all(|f| !f.code.is_structural()));
    }
}

#[test]
fn test_position_change_yields_no_operations() {
    let shape = BlockShape {
        present: true,
        name: 0,
        attribute: None,
        described: true,
        link: 0,
        unnamed_attribute: false,
    };
    let old = build(
        &[shape],
        &[],
        false,
        &Extras { requirements: vec![], revision: None, children: vec![] },
    );
    let mut new = old.clone();
    for block in new.blocks.values_mut() {
        block.position = Some(sysblock_model::CanvasPoint { x: 40.0, y: -12.5 });
    }
    assert!(compute_patch(&old, &new).is_empty());
}

#[test]
fn test_removed_block_is_preceded_by_its_connections() {
    let mut old = Graph::new();
    insert_block(&mut old, block_with_ports("a", &["p"]));
    insert_block(&mut old, block_with_ports("b", &["q"]));
    insert_connection(&mut old, connection("a-b", ("a", "p"), ("b", "q"), ConnectionType::Data));
    let mut new = old.clone();
    new.blocks.shift_remove("b");
    new.connections.shift_remove("a-b");

    let patch = compute_patch(&old, &new);
    let paths: Vec<String> = patch.iter().map(|op| op.path().to_string()).collect();
    assert_eq!(paths.len(), 2);
    assert!(matches!(patch[0], PatchOperation::Remove { .. }));
    assert!(paths[0].contains("a-b"));
    assert!(paths[1].ends_with("b"));
}

#[test]
fn test_conflicting_patch_leaves_input_untouched() {
    let mut graph = Graph::new();
    insert_block(&mut graph, sysblock_model::Block::new("a", "A", BlockType::Generic));
    let before = graph.clone();

    let patch = vec![
        PatchOperation::Remove {
            path: EntityPath::new(vec!["blocks".into(), "a".into()]),
        },
        PatchOperation::Remove {
            path: EntityPath::new(vec!["blocks".into(), "missing".into()]),
        },
    ];
    let err = apply_patch(&graph, &patch).unwrap_err();
    assert!(matches!(err, EngineError::PatchConflict { .. }));
    assert!(err.is_conflict());
    assert_eq!(graph, before);
}

#[test]
fn test_blank_attribute_key_survives_stored_patch() {
    let old = Graph::new();
    let mut new = Graph::new();
    let mut block = block_with_ports("a", &["p"]);
    block.attributes.insert(String::new(), "unlabelled".into());
    block.attributes.insert("~e".into(), "literal".into());
    insert_block(&mut new, block);

    let mut edited = new.clone();
    let attrs = &mut edited.blocks.get_mut("a").unwrap().attributes;
    attrs.insert(String::new(), "relabelled".into());
    attrs.remove("~e");

    for (from, to) in [(&old, &new), (&new, &edited)] {
        let patch = via_json(&compute_patch(from, to));
        assert!(apply_patch(from, &patch).unwrap().semantically_eq(to));
    }
}

#[test]
fn test_patch_removing_only_the_block_is_refused() {
    let mut graph = Graph::new();
    insert_block(&mut graph, block_with_ports("a", &["p"]));
    insert_block(&mut graph, block_with_ports("b", &["q"]));
    insert_connection(&mut graph, connection("a-b", ("a", "p"), ("b", "q"), ConnectionType::Data));
    let before = graph.clone();

    let patch = vec![PatchOperation::Remove {
        path: EntityPath::new(vec!["blocks".into(), "b".into()]),
    }];
    let err = apply_patch(&graph, &patch).unwrap_err();
    assert!(matches!(err, EngineError::StructuralFindings(_)));
    assert_eq!(graph, before);
}
