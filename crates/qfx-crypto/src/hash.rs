/// Compute the BLAKE3 hash of arbitrary bytes, 32-byte array.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Compute the Keccak-256 hash of arbitrary bytes, 32-byte array. Used only
/// for the deterministic child-address derivation, matching the executor's
/// create2-style scheme.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    use sha3::{Digest, Keccak256};
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hex-encode a random 32-byte transaction hash. The consensus core treats
/// transaction hashes as opaque strings supplied by callers (the RPC layer
/// computes the canonical hash over the signed wire transaction); this
/// helper exists for tests and for synthesizing child-transaction hashes
/// when the rollup bridge does not return one.
pub fn random_hash_hex() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
