//! CIDv1 construction for Ethereum IPLD objects.
//!
//! Every object is addressed by the keccak-256 hash of its raw bytes, wrapped
//! in a multihash and tagged with the multicodec for its object type. The
//! string form is multibase base32 (the `b...` prefix).

use std::str::FromStr;

use alloy_primitives::keccak256;
use ::cid::Cid;
use multihash::Multihash;

use crate::{IpfsError, Result};

/// Multihash code for keccak-256.
pub const KECCAK_256: u64 = 0x1b;

/// Multicodecs for the Ethereum IPLD object types we publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Block headers, including uncles.
    EthBlock,
    EthTx,
    EthTxReceipt,
    EthStateTrie,
    EthStorageTrie,
}

impl Codec {
    /// The multicodec table code.
    pub fn code(self) -> u64 {
        match self {
            Codec::EthBlock => 0x90,
            Codec::EthTx => 0x93,
            Codec::EthTxReceipt => 0x95,
            Codec::EthStateTrie => 0x96,
            Codec::EthStorageTrie => 0x98,
        }
    }

    /// The multicodec table name, as accepted by the Kubo `cid-codec` argument.
    pub fn name(self) -> &'static str {
        match self {
            Codec::EthBlock => "eth-block",
            Codec::EthTx => "eth-tx",
            Codec::EthTxReceipt => "eth-tx-receipt",
            Codec::EthStateTrie => "eth-state-trie",
            Codec::EthStorageTrie => "eth-storage-trie",
        }
    }
}

/// Computes the CID string for `data` published under `codec`.
pub fn keccak256_cid(codec: Codec, data: &[u8]) -> Result<String> {
    let digest = keccak256(data);
    let hash = Multihash::<64>::wrap(KECCAK_256, digest.as_slice())
        .map_err(|e| IpfsError::Cid(e.to_string()))?;
    Ok(Cid::new_v1(codec.code(), hash).to_string())
}

/// Parses a CID string, accepting an optional `ipfs://` or `/ipfs/` prefix.
pub fn parse_cid(value: &str) -> Result<Cid> {
    let trimmed = value
        .strip_prefix("ipfs://")
        .or_else(|| value.strip_prefix("/ipfs/"))
        .unwrap_or(value);
    Cid::from_str(trimmed).map_err(|e| IpfsError::Cid(format!("{}: {}", trimmed, e)))
}
