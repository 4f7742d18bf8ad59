//! Entity paths for addressing within a graph document
//!
//! Provides [`EntityPath`], a stable, id-based address such as
//! `blocks/b1/attributes/voltage`. Paths never contain array indices, so a
//! path stays valid when unrelated entities are reordered.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Path within a graph document
///
/// Segments are joined with `/`. Inside a segment `~` is written as `~0`
/// and `/` as `~1`; an empty segment is written as `~e`. Arbitrary ids and
/// attribute keys round-trip.
///
/// # Examples
/// - `["blocks", "b1", "name"]` → `blocks/b1/name`
/// - `["blocks", "b1", "attributes", "a/b"]` → `blocks/b1/attributes/a~1b`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntityPath(Vec<String>);

impl EntityPath {
    /// Create new path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Empty path (document root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Append a segment, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(segment.into());
        new
    }
}

const EMPTY_SEGMENT: &str = "~e";

fn escape_segment(segment: &str) -> String {
    if segment.is_empty() {
        return EMPTY_SEGMENT.to_string();
    }
    segment.replace('~', "~0").replace('/', "~1")
}

fn unescape_segment(segment: &str) -> Result<String, PathError> {
    if segment == EMPTY_SEGMENT {
        return Ok(String::new());
    }
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => return Err(PathError::InvalidEscape(segment.to_string())),
        }
    }
    Ok(out)
}

impl Display for EntityPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let escaped: Vec<String> = self.0.iter().map(|s| escape_segment(s)).collect();
        write!(f, "{}", escaped.join("/"))
    }
}

impl FromStr for EntityPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }

        let segments: Vec<String> = s
            .split('/')
            .map(|seg| {
                if seg.is_empty() {
                    Err(PathError::EmptySegment)
                } else {
                    unescape_segment(seg)
                }
            })
            .collect::<Result<_, _>>()?;

        Ok(Self(segments))
    }
}

impl serde::Serialize for EntityPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for EntityPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors related to entity paths
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// Empty segment in path
    #[error("path contains empty segment")]
    EmptySegment,

    /// Dangling or unknown `~` escape
    #[error("invalid escape sequence in segment: {0}")]
    InvalidEscape(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(segments: &[&str]) -> EntityPath {
        EntityPath::new(segments.iter().map(|s| (*s).to_string()).collect())
    }

    #[test]
    fn path_display_and_parse() {
        let name = path(&["blocks", "b1", "name"]);
        assert_eq!(name.to_string(), "blocks/b1/name");
        let parsed: EntityPath = "blocks/b1/name".parse().unwrap();
        assert_eq!(parsed, name);
    }

    #[test]
    fn path_escapes_separator_and_tilde() {
        let key = EntityPath::root()
            .child("blocks")
            .child("b1")
            .child("attributes")
            .child("a/b~c");
        let text = key.to_string();
        assert_eq!(text, "blocks/b1/attributes/a~1b~0c");
        let parsed: EntityPath = text.parse().unwrap();
        assert_eq!(parsed.segments().last().map(String::as_str), Some("a/b~c"));
    }

    #[test]
    fn path_from_str_rejects_bad_input() {
        assert!(matches!(
            "blocks//name".parse::<EntityPath>(),
            Err(PathError::EmptySegment)
        ));
        assert!(matches!(
            "blocks/b~2".parse::<EntityPath>(),
            Err(PathError::InvalidEscape(_))
        ));
    }

    #[test]
    fn empty_segment_has_its_own_escape() {
        let attribute = path(&["blocks", "a", "attributes", ""]);
        let text = attribute.to_string();
        assert_eq!(text, "blocks/a/attributes/~e");
        let parsed: EntityPath = text.parse().unwrap();
        assert_eq!(parsed, attribute);

        let literal = EntityPath::root().child("~e");
        assert_eq!(literal.to_string(), "~0e");
        assert_eq!(literal.to_string().parse::<EntityPath>().unwrap(), literal);
    }

    #[test]
    fn empty_text_is_the_root() {
        assert!("".parse::<EntityPath>().unwrap().segments().is_empty());
        assert_eq!(EntityPath::root().to_string(), "");
    }

    #[test]
    fn serde_uses_escaped_text() {
        let name = path(&["blocks", "a/b", "name"]);
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"blocks/a~1b/name\"");
        assert_eq!(serde_json::from_str::<EntityPath>(&json).unwrap(), name);
    }
}
