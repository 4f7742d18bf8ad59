//! Semantic fingerprints

use std::fmt;

/// Blake3 digest of an entity's semantic content
///
/// Equal fingerprints mean the patch and diff engines treat two entities as
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Finish a hasher that was fed the entity's fields
    #[inline]
    #[must_use]
    pub(crate) fn finish(hasher: &blake3::Hasher) -> Self {
        Self(*hasher.finalize().as_bytes())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_depends_only_on_input() {
        let mut a = blake3::Hasher::new();
        a.update(b"rail");
        let mut b = blake3::Hasher::new();
        b.update(b"rail");
        assert_eq!(Fingerprint::finish(&a), Fingerprint::finish(&b));

        b.update(b"2");
        assert_ne!(Fingerprint::finish(&a), Fingerprint::finish(&b));
    }

    #[test]
    fn displays_as_lowercase_hex() {
        let text = Fingerprint::finish(&blake3::Hasher::new()).to_string();
        assert_eq!(text.len(), 64);
        assert!(text.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
