//! Key and hex helpers shared by the filterer, the repository and the retriever.
//!
//! Every hash and address crosses the database boundary as a lowercase,
//! `0x`-prefixed hex string so that live filtering and SQL filtering compare
//! the same representation.
use alloy_primitives::{Address, B256, keccak256};

/// Returns the state trie key for an account: the keccak-256 hash of its address.
pub fn address_to_key(address: &Address) -> B256 {
    keccak256(address.as_slice())
}

/// Encodes bytes as lowercase `0x`-prefixed hex.
pub fn to_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes.as_ref()))
}
