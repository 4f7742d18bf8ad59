//! Blocks, ports and external links

use crate::graph::Graph;
use crate::hash::Fingerprint;
use crate::ids::{BlockId, PortId};
use crate::status::Status;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Engineering discipline of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlockType {
    /// No particular discipline
    #[default]
    Generic,
    /// Electrical component or subsystem
    Electrical,
    /// Mechanical part or assembly
    Mechanical,
    /// Software component
    Software,
}

impl BlockType {
    /// Name as used in documents
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            BlockType::Generic => "Generic",
            BlockType::Electrical => "Electrical",
            BlockType::Mechanical => "Mechanical",
            BlockType::Software => "Software",
        }
    }
}

/// A named connection point on a block
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Port {
    /// Port id, unique within the owning block
    pub id: PortId,
    /// Display name; hierarchy checks match on this
    #[serde(default)]
    pub name: String,
    /// Free-form signal/role tag
    #[serde(default)]
    pub kind: String,
}

impl Port {
    /// Create a port
    #[must_use]
    pub fn new(id: impl Into<PortId>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
        }
    }
}

/// Link from a block to an external CAD/ECAD artifact
///
/// Kind-specific fields are optional so that incomplete links can be loaded
/// and reported instead of rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Link {
    /// Mechanical CAD occurrence
    #[serde(rename_all = "camelCase")]
    Cad {
        /// Occurrence token inside the CAD document
        #[serde(default, skip_serializing_if = "Option::is_none")]
        occurrence_token: Option<String>,
        /// CAD document identifier
        #[serde(default, skip_serializing_if = "Option::is_none")]
        document_id: Option<String>,
        /// Optional display label
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// ECAD device
    #[serde(rename_all = "camelCase")]
    Ecad {
        /// Device identifier in the ECAD design
        #[serde(default, skip_serializing_if = "Option::is_none")]
        device_id: Option<String>,
        /// Optional display label
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// Any other external resource
    #[serde(rename_all = "camelCase")]
    External {
        /// External identifier (URL, part number, ...)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        identifier: Option<String>,
        /// Optional display label
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
}

fn present(field: Option<&String>) -> bool {
    field.is_some_and(|v| !v.trim().is_empty())
}

impl Link {
    /// Kind tag as used in documents
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Link::Cad { .. } => "cad",
            Link::Ecad { .. } => "ecad",
            Link::External { .. } => "external",
        }
    }

    /// Names of required fields that are absent or blank
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match self {
            Link::Cad {
                occurrence_token,
                document_id,
                ..
            } => {
                if !present(occurrence_token.as_ref()) {
                    missing.push("occurrenceToken");
                }
                if !present(document_id.as_ref()) {
                    missing.push("documentId");
                }
            }
            Link::Ecad { device_id, .. } => {
                if !present(device_id.as_ref()) {
                    missing.push("deviceId");
                }
            }
            Link::External { identifier, .. } => {
                if !present(identifier.as_ref()) {
                    missing.push("identifier");
                }
            }
        }
        missing
    }

    /// Whether every kind-specific required field is filled in
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Complete CAD link
    #[must_use]
    pub fn cad(occurrence_token: impl Into<String>, document_id: impl Into<String>) -> Self {
        Link::Cad {
            occurrence_token: Some(occurrence_token.into()),
            document_id: Some(document_id.into()),
            label: None,
        }
    }

    /// Complete ECAD link
    #[must_use]
    pub fn ecad(device_id: impl Into<String>) -> Self {
        Link::Ecad {
            device_id: Some(device_id.into()),
            label: None,
        }
    }

    /// Complete external link
    #[must_use]
    pub fn external(identifier: impl Into<String>) -> Self {
        Link::External {
            identifier: Some(identifier.into()),
            label: None,
        }
    }
}

/// Canvas position (presentation only)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CanvasPoint {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

/// Canvas size (presentation only)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CanvasSize {
    /// Width in canvas units
    pub width: f64,
    /// Height in canvas units
    pub height: f64,
}

/// A node in the system diagram
///
/// `status` is the block's own local progression value. The displayed
/// status of a block with a child diagram is computed by the roll-up and is
/// never written back here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Block id, unique within the owning graph
    pub id: BlockId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Free-text description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Engineering discipline
    #[serde(rename = "type", default)]
    pub block_type: BlockType,
    /// Local lifecycle status
    #[serde(default)]
    pub status: Status,
    /// Explicit external verification flag
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub verified: bool,
    /// Open-ended key/value attributes
    #[serde(default, deserialize_with = "deserialize_attributes")]
    pub attributes: BTreeMap<String, String>,
    /// Declared interfaces, in display order
    #[serde(default)]
    pub interfaces: Vec<Port>,
    /// Links to external artifacts
    #[serde(default)]
    pub links: Vec<Link>,
    /// Nested sub-diagram owned by this block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_diagram: Option<Box<Graph>>,
    /// Canvas position (presentation only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<CanvasPoint>,
    /// Canvas size (presentation only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<CanvasSize>,
}

impl Block {
    /// Create an empty block of the given type
    #[must_use]
    pub fn new(id: impl Into<BlockId>, name: impl Into<String>, block_type: BlockType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            block_type,
            status: Status::Placeholder,
            verified: false,
            attributes: BTreeMap::new(),
            interfaces: Vec::new(),
            links: Vec::new(),
            child_diagram: None,
            position: None,
            size: None,
        }
    }

    /// Look up a declared port
    #[inline]
    #[must_use]
    pub fn port(&self, id: &PortId) -> Option<&Port> {
        self.interfaces.iter().find(|p| &p.id == id)
    }

    /// Whether a port with this id is declared
    #[inline]
    #[must_use]
    pub fn has_port(&self, id: &PortId) -> bool {
        self.port(id).is_some()
    }

    /// Whether at least one link is complete
    #[inline]
    #[must_use]
    pub fn has_complete_link(&self) -> bool {
        self.links.iter().any(Link::is_complete)
    }

    /// Attribute value, trimmed; `None` when absent or blank
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Fingerprint of the semantic content, see [`block_fingerprint`]
    #[inline]
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        block_fingerprint(self)
    }
}

fn put(hasher: &mut blake3::Hasher, text: &str) {
    hasher.update(&(text.len() as u64).to_le_bytes());
    hasher.update(text.as_bytes());
}

fn encode_link(link: &Link) -> String {
    let field = |v: &Option<String>| v.clone().unwrap_or_default();
    match link {
        Link::Cad {
            occurrence_token,
            document_id,
            label,
        } => format!(
            "cad\u{0}{}\u{0}{}\u{0}{}",
            field(occurrence_token),
            field(document_id),
            field(label)
        ),
        Link::Ecad { device_id, label } => {
            format!("ecad\u{0}{}\u{0}{}", field(device_id), field(label))
        }
        Link::External { identifier, label } => {
            format!("external\u{0}{}\u{0}{}", field(identifier), field(label))
        }
    }
}

/// Stable, order-independent hash of a block's semantic content
///
/// Covers name, description, type, status and its inputs, attributes,
/// interfaces and links. Canvas position/size and the child diagram are
/// excluded. Interfaces and links are hashed as sets.
#[must_use]
pub fn block_fingerprint(block: &Block) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"sysblock.block.v1");
    put(&mut hasher, &block.name);
    put(&mut hasher, &block.description);
    put(&mut hasher, block.block_type.as_str());
    put(&mut hasher, block.status.label());
    hasher.update(&[u8::from(block.verified)]);

    hasher.update(&(block.attributes.len() as u64).to_le_bytes());
    for (key, value) in &block.attributes {
        put(&mut hasher, key);
        put(&mut hasher, value);
    }

    let mut ports: Vec<&Port> = block.interfaces.iter().collect();
    ports.sort_by(|a, b| (&a.id, &a.name, &a.kind).cmp(&(&b.id, &b.name, &b.kind)));
    hasher.update(&(ports.len() as u64).to_le_bytes());
    for port in ports {
        put(&mut hasher, port.id.as_str());
        put(&mut hasher, &port.name);
        put(&mut hasher, &port.kind);
    }

    let mut links: Vec<String> = block.links.iter().map(encode_link).collect();
    links.sort();
    hasher.update(&(links.len() as u64).to_le_bytes());
    for link in &links {
        put(&mut hasher, link);
    }

    Fingerprint::finish(&hasher)
}

/// Accept free text as well as JSON numbers/booleans for attribute values
pub(crate) fn deserialize_attributes<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| (key, value_to_text(value)))
        .collect())
}

pub(crate) fn value_to_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
