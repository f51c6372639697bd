use std::fmt;

use serde::{Deserialize, Serialize};

/// Unix timestamp, seconds UTC.
pub type Timestamp = i64;

/// Per-sender monotonic transaction counter.
pub type Nonce = u64;

/// Value amount. The consensus core treats this as an opaque integer;
/// it never needs to reason about decimals or a native denomination.
pub type Balance = u128;

/// Address space is shared by accounts and contracts: a `to_address` that
/// receives a `DEPLOY_CONTRACT` becomes a contract address for later calls.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Transaction hash — unique identity of a transaction row.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxHash(pub String);

impl TxHash {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({}…)", &self.0[..self.0.len().min(12)])
    }
}

/// An opaque byte blob: transaction payload data, calldata, diagnostics.
pub type Bytes = Vec<u8>;
