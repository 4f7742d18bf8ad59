//! Orphan and placeholder detection

use super::RuleContext;
use crate::validation::{Finding, FindingCode};
use std::collections::HashSet;
use sysblock_model::{BlockId, Status};

/// Report unconnected blocks and blocks still at `Placeholder`
///
/// A lone block in a diagram is not an orphan.
#[must_use]
pub fn orphans_and_placeholders(ctx: &RuleContext<'_>) -> Vec<Finding> {
    let graph = ctx.graph;
    let connected: HashSet<&BlockId> = graph
        .connections
        .values()
        .flat_map(|c| [&c.from_block, &c.to_block])
        .collect();

    let mut findings = Vec::new();
    for block in graph.blocks.values() {
        if graph.blocks.len() > 1 && !connected.contains(&block.id) {
            findings.push(
                Finding::warning(
                    FindingCode::OrphanBlock,
                    format!("block '{}' has no connections", block.id),
                )
                .with_block(&block.id),
            );
        }
        if block.status == Status::Placeholder {
            findings.push(
                Finding::warning(
                    FindingCode::PlaceholderBlock,
                    format!("block '{}' is still a placeholder", block.id),
                )
                .with_block(&block.id),
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
        ArrowDirection, Block, BlockType, Connection, ConnectionType, DiagramPath, Endpoint, Graph,
    };

    fn run(graph: &Graph) -> Vec<Finding> {
        let config = EngineConfig::default();
        let scope = DiagramPath::root();
        orphans_and_placeholders(&RuleContext {
            graph,
            scope: &scope,
            config: &config,
        })
    }

    fn planned(id: &str) -> Block {
        let mut block = Block::new(id, id, BlockType::Generic);
        block.status = Status::Planned;
        block
    }

    #[test]
    fn single_block_is_not_orphan() {
        let mut graph = Graph::new();
        graph.blocks.insert("a".into(), planned("a"));
        assert!(run(&graph).is_empty());
    }

    #[test]
    fn unconnected_block_among_several() {
        let mut graph = Graph::new();
        for id in ["a", "b", "c"] {
            graph.blocks.insert(id.into(), planned(id));
        }
        graph.connections.insert(
            "c1".into(),
            Connection::new(
                "c1",
                Endpoint::new("a", "p"),
                Endpoint::new("b", "q"),
                ConnectionType::Auto,
                ArrowDirection::None,
            ),
        );
        let findings = run(&graph);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, FindingCode::OrphanBlock);
        assert!(findings[0].mentions_block(&BlockId::new("c")));
    }

    #[test]
    fn placeholders_are_reported() {
        let mut graph = Graph::new();
        graph
            .blocks
            .insert("a".into(), Block::new("a", "", BlockType::Generic));
        let findings = run(&graph);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, FindingCode::PlaceholderBlock);
    }
}
