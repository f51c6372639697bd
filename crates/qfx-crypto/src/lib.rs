pub mod address;
pub mod hash;

pub use address::{deterministic_child_address, random_child_address};
pub use hash::{blake3_hash, keccak256, random_hash_hex};
