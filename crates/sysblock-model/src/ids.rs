//! Identifier newtypes
//!
//! Ids are opaque strings chosen by the document author (or generated with
//! a random UUID when omitted). They are immutable once an entity exists.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing id
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh random id
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Borrow the id text
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Check for the empty id
            #[inline]
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identity of a [`crate::Block`], unique within its graph
    BlockId
);

string_id!(
    /// Identity of a [`crate::Port`], unique within its block
    PortId
);

string_id!(
    /// Identity of a [`crate::Connection`], unique within its graph
    ConnectionId
);

string_id!(
    /// Identity of a [`crate::Requirement`], unique within its graph
    RequirementId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(BlockId::generate(), BlockId::generate());
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = ConnectionId::new("c1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"c1\"");
        assert_eq!(id.to_string(), "c1");
    }
}
