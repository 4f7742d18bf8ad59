//! Requirement evaluation

use super::units::parse_quantity_in;
use super::RuleContext;
use crate::validation::{EntityRef, Finding, FindingCode};
use sysblock_model::Requirement;

enum Outcome {
    Holds,
    Violated,
    Unresolved(String),
}

fn evaluate(req: &Requirement, actual: &str) -> Outcome {
    let unit = req.unit.as_deref();
    let numeric = (
        parse_quantity_in(actual, unit),
        parse_quantity_in(&req.target_value, unit),
    );
    let verdict = match numeric {
        (Some(a), Some(t)) if a.comparable(&t) => Some(req.operator.holds(a.value, t.value)),
        (Some(a), Some(t)) => {
            return Outcome::Unresolved(format!(
                "cannot compare {} with {}",
                a.dimension.map_or("a plain number".to_string(), |d| d.to_string()),
                t.dimension.map_or("a plain number".to_string(), |d| d.to_string()),
            ))
        }
        _ => req.operator.holds_text(actual, &req.target_value),
    };
    match verdict {
        Some(true) => Outcome::Holds,
        Some(false) => Outcome::Violated,
        None => Outcome::Unresolved(format!(
            "operator {} needs numeric values",
            req.operator
        )),
    }
}

/// Check each requirement against the attribute it targets
///
/// Values compare numerically when both sides parse as quantities of the
/// same dimension (a bare number takes the requirement's `unit`), otherwise
/// as trimmed text for `=` and `!=`.
#[must_use]
pub fn requirement_checks(ctx: &RuleContext<'_>) -> Vec<Finding> {
    let mut findings = Vec::new();
    for req in &ctx.graph.requirements {
        let entity = EntityRef::Requirement(req.id.clone());
        let Some(block) = ctx.graph.block(&req.target.block) else {
            findings.push(
                Finding::warning(
                    FindingCode::RequirementUnresolved,
                    format!("requirement '{}' targets missing block '{}'", req.id, req.target.block),
                )
                .with_entity(entity),
            );
            continue;
        };
        let Some(actual) = block.attribute(&req.target.attribute) else {
            findings.push(
                Finding::warning(
                    FindingCode::RequirementUnresolved,
                    format!("requirement '{}': {} is not set", req.id, req.target),
                )
                .with_entity(entity)
                .with_block(&block.id),
            );
            continue;
        };

        match evaluate(req, actual) {
            Outcome::Holds => {}
            Outcome::Violated => findings.push(
                Finding::error(
                    FindingCode::RequirementViolated,
                    format!(
                        "requirement '{}' violated: {} is '{actual}', expected {} {}{}",
                        req.id,
                        req.target,
                        req.operator,
                        req.target_value,
                        req.unit.as_deref().unwrap_or_default()
                    ),
                )
                .with_entity(entity)
                .with_block(&block.id),
            ),
            Outcome::Unresolved(why) => findings.push(
                Finding::warning(
                    FindingCode::RequirementUnresolved,
                    format!("requirement '{}': {why}", req.id),
                )
                .with_entity(entity)
                .with_block(&block.id),
            ),
        }
    }
    findings
}
