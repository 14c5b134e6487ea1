//! Content digests.

use alloy_primitives::B256;
use sha2::{Digest, Sha256};

/// Computes the SHA-256 digest of a cleaned ethscription payload.
///
/// Two creations with byte-identical cleaned payloads yield the same digest, and only the first
/// one seen is indexed.
pub fn content_sha(content: &str) -> B256 {
    B256::from_slice(Sha256::digest(content.as_bytes()).as_slice())
}
