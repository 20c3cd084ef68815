//! Blake2b hashing for allocation commitments and proof tags.

use allot_types::{CommitmentHash, ALLOCATION_SLOTS};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

type Blake2b256 = Blake2b<U32>;

/// Domain tag mixed into every allocation commitment.
const COMMITMENT_DOMAIN: &[u8] = b"allot/commitment/v1";

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Commit to a private allocation vector under a salt.
///
/// Hash input: domain tag, the 32-byte salt, then every slot as a big-endian
/// `i64`. Slots are hashed even when negative so that a malformed vector
/// still has a well-defined (and unprovable) commitment.
pub fn commitment_hash(salt: &[u8; 32], allocations: &[i64; ALLOCATION_SLOTS]) -> CommitmentHash {
    let mut encoded = [0u8; ALLOCATION_SLOTS * 8];
    for (chunk, value) in encoded.chunks_exact_mut(8).zip(allocations.iter()) {
        chunk.copy_from_slice(&value.to_be_bytes());
    }
    CommitmentHash::new(blake2b_256_multi(&[COMMITMENT_DOMAIN, salt, &encoded]))
}
