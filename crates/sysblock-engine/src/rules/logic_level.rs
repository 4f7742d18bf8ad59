//! Logic-level compatibility between connected blocks

use super::units::{truthy, volts};
use super::RuleContext;
use crate::validation::{Finding, FindingCode};
use sysblock_model::Block;

/// Attribute keys read as a block's I/O voltage, most specific first
const LEVEL_KEYS: &[&str] = &["logic_level", "io_voltage", "vio", "voltage"];

/// What a block can tolerate on its inputs
const TOLERANCE_KEY: &str = "tolerant_voltage";
const FIVE_VOLT_TOLERANT_KEY: &str = "5v_tolerant";

enum Level {
    Absent,
    Unparsable(&'static str, String),
    Volts(f64),
}

fn level(block: &Block) -> Level {
    for key in LEVEL_KEYS {
        if let Some(text) = block.attribute(key) {
            return match volts(text) {
                Some(v) => Level::Volts(v),
                None => Level::Unparsable(*key, text.to_string()),
            };
        }
    }
    Level::Absent
}

fn tolerance(block: &Block) -> Option<f64> {
    let explicit = block.attribute(TOLERANCE_KEY).and_then(volts);
    let five = block
        .attribute(FIVE_VOLT_TOLERANT_KEY)
        .filter(|v| truthy(v))
        .map(|_| 5.0);
    match (explicit, five) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn same_level(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

/// Flag connections whose endpoints run at incompatible voltages
///
/// Endpoints are compatible when their levels are equal or when one side
/// tolerates the other side's level (a 3.3 V block wired to a 5 V tolerant
/// block passes). Blocks that declare no level are skipped.
#[must_use]
pub fn logic_level_compatibility(ctx: &RuleContext<'_>) -> Vec<Finding> {
    let mut findings = Vec::new();
    for conn in ctx.graph.connections.values() {
        let (Some(from), Some(to)) = (
            ctx.graph.block(&conn.from_block),
            ctx.graph.block(&conn.to_block),
        ) else {
            continue;
        };

        let mut levels = [0.0_f64; 2];
        let mut usable = true;
        for (slot, block) in [from, to].into_iter().enumerate() {
            match level(block) {
                Level::Volts(v) => levels[slot] = v,
                Level::Absent => usable = false,
                Level::Unparsable(key, text) => {
                    usable = false;
                    findings.push(
                        Finding::warning(
                            FindingCode::UnparsableQuantity,
                            format!("block '{}' has unreadable {key} '{text}'", block.id),
                        )
                        .with_block(&block.id),
                    );
                }
            }
        }
        if !usable {
            continue;
        }

        let [a, b] = levels;
        let tolerated =
            tolerance(to).is_some_and(|t| t + 1e-6 >= a) || tolerance(from).is_some_and(|t| t + 1e-6 >= b);
        if !same_level(a, b) && !tolerated {
            findings.push(
                Finding::error(
                    FindingCode::LogicLevelMismatch,
                    format!(
                        "connection '{}' joins '{}' at {a} V to '{}' at {b} V",
                        conn.id, from.id, to.id
                    ),
                )
                .with_connection(&conn.id)
                .with_block(&from.id)
                .with_block(&to.id),
            );
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use sysblock_model::{
        ArrowDirection, BlockType, Connection, ConnectionType, DiagramPath, Endpoint, Graph, Port,
    };

    fn block(id: &str, attrs: &[(&str, &str)]) -> Block {
        let mut b = Block::new(id, id, BlockType::Electrical);
        b.interfaces.push(Port::new("io", "IO", "data"));
        for (k, v) in attrs {
            b.attributes.insert((*k).into(), (*v).into());
        }
        b
    }

    fn wired(a: Block, b: Block) -> Graph {
        let mut graph = Graph::new();
        let conn = Connection::new(
            "c1",
            Endpoint::new(a.id.clone(), "io"),
            Endpoint::new(b.id.clone(), "io"),
            ConnectionType::Data,
            ArrowDirection::Forward,
        );
        graph.blocks.insert(a.id.clone(), a);
        graph.blocks.insert(b.id.clone(), b);
        graph.connections.insert(conn.id.clone(), conn);
        graph
    }

    fn run(graph: &Graph) -> Vec<Finding> {
        let config = EngineConfig::default();
        let scope = DiagramPath::root();
        logic_level_compatibility(&RuleContext {
            graph,
            scope: &scope,
            config: &config,
        })
    }

    #[test]
    fn mismatch_is_error() {
        let graph = wired(
            block("mcu", &[("voltage", "3.3V")]),
            block("sensor", &[("logic_level", "5V")]),
        );
        let findings = run(&graph);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, FindingCode::LogicLevelMismatch);
        assert!(findings[0].is_error());
        assert_eq!(findings[0].entity_ids.len(), 3);
    }

    #[test]
    fn five_volt_tolerant_accepts_three_volt_three() {
        let graph = wired(
            block("mcu", &[("voltage", "3.3V")]),
            block("buffer", &[("voltage", "5V"), ("5v_tolerant", "true")]),
        );
        assert!(run(&graph).is_empty());

        let reversed = wired(
            block("buffer", &[("voltage", "5V"), ("tolerant_voltage", "5V")]),
            block("mcu", &[("voltage", "3.3V")]),
        );
        assert!(run(&reversed).is_empty());
    }

    #[test]
    fn equal_levels_and_missing_levels_pass() {
        let equal = wired(
            block("a", &[("voltage", "3300mV")]),
            block("b", &[("io_voltage", "3.3")]),
        );
        assert!(run(&equal).is_empty());

        let missing = wired(block("a", &[("voltage", "3.3V")]), block("b", &[]));
        assert!(run(&missing).is_empty());
    }

    #[test]
    fn unreadable_level_is_warning() {
        let graph = wired(
            block("a", &[("voltage", "high")]),
            block("b", &[("voltage", "5V")]),
        );
        let findings = run(&graph);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, FindingCode::UnparsableQuantity);
    }
}
