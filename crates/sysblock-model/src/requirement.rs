//! Requirements on block attributes

use crate::block::value_to_text;
use crate::ids::{BlockId, RequirementId};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Comparison operator of a requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    /// `<`
    #[serde(rename = "<")]
    Less,
    /// `<=`
    #[serde(rename = "<=")]
    LessOrEqual,
    /// `=`
    #[serde(rename = "=", alias = "==")]
    Equal,
    /// `>=`
    #[serde(rename = ">=")]
    GreaterOrEqual,
    /// `>`
    #[serde(rename = ">")]
    Greater,
    /// `!=`
    #[serde(rename = "!=")]
    NotEqual,
}

impl Comparison {
    /// Operator symbol
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Comparison::Less => "<",
            Comparison::LessOrEqual => "<=",
            Comparison::Equal => "=",
            Comparison::GreaterOrEqual => ">=",
            Comparison::Greater => ">",
            Comparison::NotEqual => "!=",
        }
    }

    /// Evaluate `actual <op> target` numerically
    #[must_use]
    pub fn holds(self, actual: f64, target: f64) -> bool {
        const EPSILON: f64 = 1e-9;
        let equal = (actual - target).abs() <= EPSILON * target.abs().max(1.0);
        match self {
            Comparison::Less => actual < target && !equal,
            Comparison::LessOrEqual => actual < target || equal,
            Comparison::Equal => equal,
            Comparison::GreaterOrEqual => actual > target || equal,
            Comparison::Greater => actual > target && !equal,
            Comparison::NotEqual => !equal,
        }
    }

    /// Evaluate textually; only `=` and `!=` are defined on text
    #[must_use]
    pub fn holds_text(self, actual: &str, target: &str) -> Option<bool> {
        match self {
            Comparison::Equal => Some(actual.trim() == target.trim()),
            Comparison::NotEqual => Some(actual.trim() != target.trim()),
            _ => None,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Reference to one attribute of one block
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeRef {
    /// Block carrying the attribute
    pub block: BlockId,
    /// Attribute key
    pub attribute: String,
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.block, self.attribute)
    }
}

/// A constraint on a block attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    /// Requirement id, unique within the owning graph
    pub id: RequirementId,
    /// Constrained attribute
    pub target: AttributeRef,
    /// Comparison operator
    pub operator: Comparison,
    /// Target value (free text, may carry a unit suffix)
    #[serde(deserialize_with = "deserialize_text")]
    pub target_value: String,
    /// Unit applied when `target_value` has none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(value_to_text)
}
