//! Electrical quantity parsing
//!
//! Attribute values are free text such as `"200mA"`, `"3.3 V"` or `"0.5W"`.
//! Parsed values are normalised to SI base units (volts, amperes, watts).

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static QUANTITY: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^\s*([-+]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][-+]?\d+)?)\s*([A-Za-zµμ]*)\s*$").ok()
});

/// Physical dimension of a parsed quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Volts
    Voltage,
    /// Amperes
    Current,
    /// Watts
    Power,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Voltage => "voltage",
            Self::Current => "current",
            Self::Power => "power",
        })
    }
}

/// A number with an optional dimension, value in SI base units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    /// Value in V, A or W; raw number when dimensionless
    pub value: f64,
    /// `None` when the text carried no unit
    pub dimension: Option<Dimension>,
}

impl Quantity {
    /// Whether two quantities can be compared
    #[inline]
    #[must_use]
    pub fn comparable(&self, other: &Quantity) -> bool {
        self.dimension == other.dimension
    }
}

/// Scale to base units and dimension of a unit suffix
fn unit_scale(unit: &str) -> Option<(f64, Option<Dimension>)> {
    let scale = match unit {
        "" => (1.0, None),
        "V" | "v" => (1.0, Some(Dimension::Voltage)),
        "mV" | "mv" => (1e-3, Some(Dimension::Voltage)),
        "kV" | "kv" => (1e3, Some(Dimension::Voltage)),
        "A" | "a" => (1.0, Some(Dimension::Current)),
        "mA" | "ma" => (1e-3, Some(Dimension::Current)),
        "uA" | "ua" | "µA" | "μA" => (1e-6, Some(Dimension::Current)),
        "W" | "w" => (1.0, Some(Dimension::Power)),
        "mW" | "mw" => (1e-3, Some(Dimension::Power)),
        "kW" | "kw" => (1e3, Some(Dimension::Power)),
        _ => return None,
    };
    Some(scale)
}

/// Parse `"<number><unit>"`; `None` on unknown units or non-numeric text
#[must_use]
pub fn parse_quantity(text: &str) -> Option<Quantity> {
    parse_quantity_in(text, None)
}

/// Parse, reading a bare number in `default_unit` when one is given
#[must_use]
pub fn parse_quantity_in(text: &str, default_unit: Option<&str>) -> Option<Quantity> {
    let caps = QUANTITY.as_ref()?.captures(text)?;
    let number: f64 = caps.get(1)?.as_str().parse().ok()?;
    let suffix = caps.get(2).map_or("", |m| m.as_str());
    let unit = if suffix.is_empty() {
        default_unit.map_or("", str::trim)
    } else {
        suffix
    };
    let (scale, dimension) = unit_scale(unit)?;
    Some(Quantity {
        value: number * scale,
        dimension,
    })
}

fn parse_as(text: &str, dimension: Dimension, bare_unit: &str) -> Option<f64> {
    parse_quantity_in(text, Some(bare_unit))
        .filter(|q| q.dimension == Some(dimension))
        .map(|q| q.value)
}

/// Volts; a bare number is read as volts
#[must_use]
pub fn volts(text: &str) -> Option<f64> {
    parse_as(text, Dimension::Voltage, "V")
}

/// Amperes; a bare number is read as milliamperes
#[must_use]
pub fn amps(text: &str) -> Option<f64> {
    parse_as(text, Dimension::Current, "mA")
}

/// Watts; a bare number is read as milliwatts
#[must_use]
pub fn watts(text: &str) -> Option<f64> {
    parse_as(text, Dimension::Power, "mW")
}

/// Interpret a rail capacity, in watts
///
/// Capacity may be given as power, or as current delivered at `volts`.
#[must_use]
pub fn capacity_watts(text: &str, volts: f64) -> Option<f64> {
    let quantity = parse_quantity_in(text, Some("mW"))?;
    match quantity.dimension {
        Some(Dimension::Power) => Some(quantity.value),
        Some(Dimension::Current) => Some(quantity.value * volts),
        _ => None,
    }
}

/// Format watts as milliwatts for messages
#[must_use]
pub fn milliwatts(watts: f64) -> String {
    format!("{:.1} mW", watts * 1e3)
}

/// Whether an attribute value reads as boolean true
#[must_use]
pub fn truthy(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "1" | "y"
    )
}
