//! Implementation completeness

use super::RuleContext;
use crate::validation::{Finding, FindingCode};
use sysblock_model::Status;

/// Flag blocks claiming `Implemented` or better while lacking attributes,
/// interfaces or links entirely
#[must_use]
pub fn implementation_completeness(ctx: &RuleContext<'_>) -> Vec<Finding> {
    ctx.graph
        .blocks
        .values()
        .filter(|block| block.status >= Status::Implemented)
        .filter_map(|block| {
            let missing: Vec<&str> = [
                ("attributes", block.attributes.is_empty()),
                ("interfaces", block.interfaces.is_empty()),
                ("links", block.links.is_empty()),
            ]
            .into_iter()
            .filter_map(|(name, empty)| empty.then_some(name))
            .collect();
            if missing.is_empty() {
                return None;
            }
            Some(
                Finding::warning(
                    FindingCode::IncompleteImplementation,
                    format!(
                        "block '{}' is {} but has no {}",
                        block.id,
                        block.status,
                        missing.join(", ")
                    ),
                )
                .with_block(&block.id),
            )
        })
        .collect()
}
