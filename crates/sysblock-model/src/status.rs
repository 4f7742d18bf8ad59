//! Lifecycle status progression

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a block
///
/// Variants are declared in progression order, so the derived `Ord` is the
/// total order used by the roll-up (`Placeholder` is the least complete).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Status {
    /// Nothing beyond an id is known
    #[default]
    Placeholder,
    /// Named and described
    Planned,
    /// At least one link to an external artifact
    #[serde(rename = "In-Work", alias = "InWork")]
    InWork,
    /// Has interfaces and a complete link
    Implemented,
    /// Externally verified
    Verified,
}

impl Status {
    /// All statuses in progression order
    pub const ALL: [Status; 5] = [
        Status::Placeholder,
        Status::Planned,
        Status::InWork,
        Status::Implemented,
        Status::Verified,
    ];

    /// Display label as used in documents
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Status::Placeholder => "Placeholder",
            Status::Planned => "Planned",
            Status::InWork => "In-Work",
            Status::Implemented => "Implemented",
            Status::Verified => "Verified",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
