//! Content checksums for change detection.

use sha2::{Digest, Sha256};

/// Computes the checksum of definition content.
///
/// The checksum is the lowercase hex encoding of the SHA-256 digest, so two
/// contents compare equal exactly when their bytes do.
#[must_use]
pub fn checksum(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_digest() {
        assert_eq!(
            checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn differs_on_single_byte() {
        assert_ne!(checksum(b"create table a"), checksum(b"create table b"));
    }

    proptest! {
        #[test]
        fn stable_for_same_content(content in prop::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(checksum(&content), checksum(&content.clone()));
            prop_assert_eq!(checksum(&content).len(), 64);
        }
    }
}
