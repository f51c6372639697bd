use qfx_core::types::Address;

use crate::hash::keccak256;

/// Derive a deterministic child-contract address for a triggered
/// `DEPLOY_CONTRACT` whose `salt_nonce != 0`: `keccak(0x01 || parent || salt_nonce || chain_id)[:20]`.
///
/// The `0x01` prefix distinguishes this scheme from other hash domains sharing
/// the same preimage shape; the exact prefix/byte order must match whatever
/// the executor independently recomputes, since both sides need to agree on
/// the resulting address without a round trip.
pub fn deterministic_child_address(parent_addr: &Address, salt_nonce: u64, chain_id: u64) -> Address {
    let mut preimage = Vec::with_capacity(1 + parent_addr.as_str().len() + 8 + 8);
    preimage.push(0x01u8);
    preimage.extend_from_slice(parent_addr.as_str().as_bytes());
    preimage.extend_from_slice(&salt_nonce.to_be_bytes());
    preimage.extend_from_slice(&chain_id.to_be_bytes());

    let digest = keccak256(&preimage);
    Address::new(format!("0x{}", hex::encode(&digest[12..32])))
}

/// Allocate a random address for a `salt_nonce == 0` deploy.
pub fn random_child_address() -> Address {
    Address::new(format!("0x{}", crate::hash::random_hash_hex()[..40].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_address_is_stable_for_same_inputs() {
        let parent = Address::new("0xparent");
        let a = deterministic_child_address(&parent, 7, 1);
        let b = deterministic_child_address(&parent, 7, 1);
        assert_eq!(a, b);
    }

    #[test]
    fn deterministic_address_varies_with_salt() {
        let parent = Address::new("0xparent");
        let a = deterministic_child_address(&parent, 7, 1);
        let b = deterministic_child_address(&parent, 8, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn random_addresses_are_not_fixed() {
        let a = random_child_address();
        let b = random_child_address();
        assert_ne!(a, b);
    }
}
