//! Content addressing and the 3/3 shard layout.
//!
//! An address is the uppercase hex SHA-256 of the *decoded* payload, so the
//! same bytes map to the same blob no matter which codec later stores them.
//!
//! ```text
//! <root>/84D/898/84D89877F0D4041EFB6BF91A16F0248F2FD573E6AF05C19F96BEDB9F882F7882
//! ```

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Length of a rendered address (32 bytes, two hex chars each).
pub const ADDRESS_LEN: usize = 64;

/// Hex characters consumed by each shard directory level.
pub const SHARD_WIDTH: usize = 3;

/// Compute the content address of `payload`.
#[inline]
pub fn content_address(payload: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(payload))
}

/// Raw SHA-256 digest, used where two decoded streams are compared.
#[inline]
pub fn digest(payload: &[u8]) -> [u8; 32] {
    Sha256::digest(payload).into()
}

/// Join `base` with the two shard segments and the full address.
///
/// # Panics
///
/// Panics if `address` is shorter than two shard widths or is not ASCII.
/// Callers holding untrusted input go through [`is_shardable`] first.
pub fn blob_location(base: impl AsRef<Path>, address: &str) -> PathBuf {
    let (l1, l2) = shard_segments(address);
    base.as_ref().join(l1).join(l2).join(address)
}

/// Whether `address` can be mapped onto the shard layout at all.
///
/// Only the first six characters matter for placement; full 64-char
/// validation is left to [`is_address`] so legacy short names stay
/// reachable.
pub fn is_shardable(address: &str) -> bool {
    address.len() >= 2 * SHARD_WIDTH && address.is_ascii() && !address.contains(['/', '\\'])
}

/// Whether `name` looks like a full address (64 hex digits, any case).
pub fn is_address(name: &str) -> bool {
    name.len() == ADDRESS_LEN && name.bytes().all(|b| b.is_ascii_hexdigit())
}

fn shard_segments(address: &str) -> (&str, &str) {
    (
        &address[..SHARD_WIDTH],
        &address[SHARD_WIDTH..2 * SHARD_WIDTH],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGITS_HASH: &str = "84D89877F0D4041EFB6BF91A16F0248F2FD573E6AF05C19F96BEDB9F882F7882";

    #[test]
    fn test_known_vector() {
        assert_eq!(content_address(b"0123456789"), DIGITS_HASH);
    }

    #[test]
    fn test_empty_payload_vector() {
        assert_eq!(
            content_address(b""),
            "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855"
        );
    }

    #[test]
    fn test_address_is_stable_and_uppercase() {
        let a = content_address(b"ABCDEFGHIJKLMNOPQRSTUVWXYZ");
        let b = content_address(b"ABCDEFGHIJKLMNOPQRSTUVWXYZ");
        assert_eq!(a, b);
        assert_eq!(a, "D6EC6898DE87DDAC6E5B3611708A7AA1C2D298293349CC1A6C299A1DB7149D38");
        assert_eq!(a.len(), ADDRESS_LEN);
        assert!(!a.chars().any(|c| c.is_ascii_lowercase()));
    }

    #[test]
    fn test_digest_matches_address() {
        let raw = digest(b"0123456789");
        assert_eq!(hex::encode_upper(raw), DIGITS_HASH);
    }

    #[test]
    fn test_blob_location_shards() {
        let path = blob_location("/data", DIGITS_HASH);
        assert_eq!(
            path,
            PathBuf::from("/data/84D/898").join(DIGITS_HASH)
        );
    }

    #[test]
    fn test_blob_location_short_name() {
        let path = blob_location("/data", "0011223344");
        assert_eq!(path, PathBuf::from("/data/001/122/0011223344"));
    }

    #[test]
    fn test_shardable() {
        assert!(is_shardable("DEADBEEF"));
        assert!(is_shardable(DIGITS_HASH));
        assert!(!is_shardable("DEAD"));
        assert!(!is_shardable("ÄÖÜ123"));
        assert!(!is_shardable("../../etc/passwd"));
    }

    #[test]
    fn test_is_address() {
        assert!(is_address(DIGITS_HASH));
        assert!(is_address(&DIGITS_HASH.to_lowercase()));
        assert!(!is_address("DEADBEEF"));
        assert!(!is_address(&format!("{}.gz", &DIGITS_HASH[..61])));
    }
}
