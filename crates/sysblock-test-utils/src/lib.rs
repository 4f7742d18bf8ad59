//! Testing utilities for sysblock workspace
//!
//! Shared fixtures and tracing setup.

#![allow(missing_docs)]

use serde_json::{json, Value};
use std::sync::Once;
use sysblock_model::{
    ArrowDirection, Block, BlockId, BlockType, Connection, ConnectionType, Endpoint, Graph, Link,
    Port, Status,
};

static TRACING: Once = Once::new();

/// Install an env-filtered fmt subscriber once per test binary
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

pub fn block_with_ports(id: &str, ports: &[&str]) -> Block {
    let mut block = Block::new(id, id.to_uppercase(), BlockType::Electrical);
    for port in ports {
        block.interfaces.push(Port::new(*port, port.to_uppercase(), "signal"));
    }
    block
}

/// A block whose data supports `Implemented`
pub fn implemented_block(id: &str, ports: &[&str]) -> Block {
    let mut block = block_with_ports(id, ports);
    block.description = format!("{id} under test");
    block.attributes.insert("part".into(), format!("{id}-001"));
    block.links.push(Link::ecad(format!("U-{id}")));
    block.status = Status::Implemented;
    block
}

pub fn connection(id: &str, from: (&str, &str), to: (&str, &str), kind: ConnectionType) -> Connection {
    Connection::new(
        id,
        Endpoint::new(from.0, from.1),
        Endpoint::new(to.0, to.1),
        kind,
        ArrowDirection::Forward,
    )
}

pub fn insert_block(graph: &mut Graph, block: Block) {
    graph.blocks.insert(block.id.clone(), block);
}

pub fn insert_connection(graph: &mut Graph, conn: Connection) {
    graph.connections.insert(conn.id.clone(), conn);
}

/// Controller wired to a flash chip over SPI
pub fn simple_graph() -> Graph {
    let mut graph = Graph::new();
    insert_block(&mut graph, implemented_block("mcu", &["spi", "vin"]));
    insert_block(&mut graph, implemented_block("flash", &["spi"]));
    insert_connection(
        &mut graph,
        connection("spi-bus", ("mcu", "spi"), ("flash", "spi"), ConnectionType::Data),
    );
    graph
}

/// 500 mW rail feeding 200 mA and 100 mA consumers (990 mW at 3.3 V)
pub fn power_rail_graph() -> Graph {
    let mut graph = Graph::new();
    let mut rail = block_with_ports("rail", &["out"]);
    rail.attributes.insert("supply_capacity".into(), "500mW".into());
    insert_block(&mut graph, rail);

    for (id, draw) in [("radio", "200mA"), ("sensor", "100mA")] {
        let mut consumer = block_with_ports(id, &["vin"]);
        consumer.attributes.insert("current_draw".into(), draw.into());
        insert_block(&mut graph, consumer);
        insert_connection(
            &mut graph,
            connection(&format!("{id}-power"), ("rail", "out"), (id, "vin"), ConnectionType::Power),
        );
    }
    graph
}

/// Root `system` block owning `board`, which owns a placeholder `chip`
pub fn nested_graph() -> Graph {
    let mut inner = Graph::new();
    insert_block(&mut inner, Block::new("chip", "", BlockType::Electrical));

    let mut board = implemented_block("board", &["bus"]);
    board.child_diagram = Some(Box::new(inner));
    let mut middle = Graph::new();
    insert_block(&mut middle, board);

    let mut system = implemented_block("system", &["bus"]);
    system.child_diagram = Some(Box::new(middle));
    let mut root = Graph::new();
    insert_block(&mut root, system);
    insert_block(&mut root, implemented_block("peer", &["bus"]));
    insert_connection(
        &mut root,
        connection("link", ("system", "bus"), ("peer", "bus"), ConnectionType::Data),
    );
    root
}

pub fn block_id(id: &str) -> BlockId {
    BlockId::new(id)
}

/// Document without `schemaVersion`
pub fn legacy_document() -> Value {
    json!({
        "blocks": [{
            "id": "b1",
            "name": "Test",
            "type": "Generic",
            "status": "Placeholder",
            "interfaces": []
        }],
        "connections": []
    })
}

/// Document from a newer engine
pub fn future_document() -> Value {
    json!({"schemaVersion": "99.0", "blocks": [], "connections": []})
}
