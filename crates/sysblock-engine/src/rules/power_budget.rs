//! Power budget of supply rails

use super::units::{amps, capacity_watts, milliwatts, volts, watts};
use super::RuleContext;
use crate::validation::{EntityRef, Finding, FindingCode};
use indexmap::IndexMap;
use sysblock_model::{Block, BlockId, ConnectionId, ConnectionType};

/// Attribute keys declaring a rail's supply capacity
const CAPACITY_KEYS: &[&str] = &["supply_capacity", "capacity"];
/// Attribute keys declaring a rail's output voltage
const RAIL_VOLTAGE_KEYS: &[&str] = &["output_voltage", "voltage"];

fn first_attribute<'a>(block: &'a Block, keys: &[&'static str]) -> Option<(&'static str, &'a str)> {
    keys.iter()
        .find_map(|key| block.attribute(key).map(|value| (*key, value)))
}

fn unreadable(block: &Block, key: &str, text: &str) -> Finding {
    Finding::warning(
        FindingCode::UnparsableQuantity,
        format!("block '{}' has unreadable {key} '{text}'", block.id),
    )
    .with_block(&block.id)
}

/// Demand of one consumer in watts at the rail voltage
///
/// `power_draw` wins over `current_draw`. `Ok(None)` means the consumer
/// declares no draw.
fn demand(consumer: &Block, rail_volts: f64) -> Result<Option<f64>, Finding> {
    if let Some(text) = consumer.attribute("power_draw") {
        return watts(text)
            .map(Some)
            .ok_or_else(|| unreadable(consumer, "power_draw", text));
    }
    if let Some(text) = consumer.attribute("current_draw") {
        return amps(text)
            .map(|a| Some(a * rail_volts))
            .ok_or_else(|| unreadable(consumer, "current_draw", text));
    }
    Ok(None)
}

/// Flag rails whose consumers draw more than the rail supplies
///
/// A rail is any block declaring `supply_capacity`. Its consumers are the
/// blocks at the other end of its `Power` connections, each counted once.
/// Current draw is converted at the rail's voltage, or at the configured
/// reference voltage when the rail declares none.
#[must_use]
pub fn power_budget(ctx: &RuleContext<'_>) -> Vec<Finding> {
    let mut findings = Vec::new();
    for rail in ctx.graph.blocks.values() {
        let Some((capacity_key, capacity_text)) = first_attribute(rail, CAPACITY_KEYS) else {
            continue;
        };

        let rail_volts = match first_attribute(rail, RAIL_VOLTAGE_KEYS) {
            Some((key, text)) => match volts(text) {
                Some(v) => v,
                None => {
                    findings.push(unreadable(rail, key, text));
                    continue;
                }
            },
            None => ctx.config.reference_voltage,
        };

        let Some(capacity) = capacity_watts(capacity_text, rail_volts) else {
            findings.push(unreadable(rail, capacity_key, capacity_text));
            continue;
        };

        let mut consumers: IndexMap<&BlockId, Vec<&ConnectionId>> = IndexMap::new();
        for conn in ctx.graph.connections_of(&rail.id) {
            if conn.connection_type != ConnectionType::Power {
                continue;
            }
            if let Some(other) = conn.opposite(&rail.id) {
                consumers.entry(other).or_default().push(&conn.id);
            }
        }

        let mut total = 0.0;
        let mut contributors = Vec::new();
        for (id, connections) in &consumers {
            let Some(consumer) = ctx.graph.block(id) else {
                continue;
            };
            match demand(consumer, rail_volts) {
                Ok(Some(w)) => {
                    total += w;
                    contributors.push((consumer, connections));
                }
                Ok(None) => {}
                Err(finding) => findings.push(finding),
            }
        }

        if total > capacity + 1e-9 {
            let mut finding = Finding::error(
                FindingCode::PowerBudgetExceeded,
                format!(
                    "rail '{}' demand {} exceeds capacity {}",
                    rail.id,
                    milliwatts(total),
                    milliwatts(capacity)
                ),
            )
            .with_block(&rail.id);
            for (consumer, connections) in contributors {
                finding = finding.with_block(&consumer.id);
                for conn in connections.iter() {
                    finding = finding.with_entity(EntityRef::Connection((*conn).clone()));
                }
            }
            findings.push(finding);
        } else {
            tracing::trace!(rail = %rail.id, demand_w = total, capacity_w = capacity, "Rail within budget");
        }
    }
    findings
}
