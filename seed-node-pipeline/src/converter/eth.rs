//! Ethereum RLP shapes carried by a raw statediff payload.
use alloy_primitives::{Address, B256, Bytes, Signature, TxKind, U256, keccak256};
use alloy_rlp::{Encodable, RlpDecodable, RlpEncodable};

use crate::converter::rlp::wrap_list;
use crate::errors::DecodeError;

/// Index of the block number in an RLP-encoded header.
pub(crate) const HEADER_NUMBER_INDEX: usize = 8;

/// A pre-typed (legacy) transaction, signed with or without EIP-155 replay protection.
#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: TxKind,
    pub value: U256,
    pub input: Bytes,
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

impl LegacyTransaction {
    pub fn chain_id(&self) -> Option<u64> {
        if self.v >= 35 {
            Some((self.v - 35) / 2)
        } else {
            None
        }
    }

    fn y_parity(&self) -> Result<bool, DecodeError> {
        match self.v {
            27 => Ok(false),
            28 => Ok(true),
            v if v >= 35 => Ok((v - 35) % 2 == 1),
            v => Err(DecodeError::InvalidV(v)),
        }
    }

    /// Hash the sender signed over.
    pub fn signature_hash(&self) -> B256 {
        let mut payload = Vec::new();
        self.nonce.encode(&mut payload);
        self.gas_price.encode(&mut payload);
        self.gas_limit.encode(&mut payload);
        self.to.encode(&mut payload);
        self.value.encode(&mut payload);
        self.input.encode(&mut payload);
        if let Some(chain_id) = self.chain_id() {
            chain_id.encode(&mut payload);
            0u8.encode(&mut payload);
            0u8.encode(&mut payload);
        }
        keccak256(wrap_list(&payload))
    }

    pub fn recover_sender(&self) -> Result<Address, DecodeError> {
        let signature = Signature::new(self.r, self.s, self.y_parity()?);
        Ok(signature.recover_address_from_prehash(&self.signature_hash())?)
    }

    /// Recipient, or the zero address for contract creations.
    pub fn dst(&self) -> Address {
        self.to.to().copied().unwrap_or(Address::ZERO)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Receipt in the node's storage encoding, which carries the transaction
/// hash and created contract address alongside the consensus fields.
#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct StorageReceipt {
    /// Post-state root before Byzantium, status byte after.
    pub post_state_or_status: Bytes,
    pub cumulative_gas_used: u64,
    pub tx_hash: B256,
    /// Empty unless the transaction created a contract.
    pub contract_address: Bytes,
    pub logs: Vec<Log>,
    pub gas_used: u64,
}

impl StorageReceipt {
    pub fn created_contract(&self) -> Address {
        if self.contract_address.len() == 20 {
            Address::from_slice(&self.contract_address)
        } else {
            Address::ZERO
        }
    }

    /// First topic of every log that has one.
    pub fn topic0s(&self) -> Vec<B256> {
        self.logs
            .iter()
            .filter_map(|log| log.topics.first().copied())
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct StorageDiff {
    pub key: Bytes,
    pub value: Bytes,
    pub leaf: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct AccountDiff {
    pub key: Bytes,
    pub value: Bytes,
    pub storage: Vec<StorageDiff>,
    pub leaf: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct StateDiff {
    pub block_number: u64,
    pub block_hash: B256,
    pub created_accounts: Vec<AccountDiff>,
    pub deleted_accounts: Vec<AccountDiff>,
    pub updated_accounts: Vec<AccountDiff>,
}

impl StateDiff {
    /// Every account diff, created first, then deleted, then updated.
    pub fn accounts(&self) -> impl Iterator<Item = &AccountDiff> {
        self.created_accounts
            .iter()
            .chain(&self.deleted_accounts)
            .chain(&self.updated_accounts)
    }
}

/// Left-pads a trie path key to 32 bytes.
pub(crate) fn trie_key(key: &[u8]) -> Result<B256, DecodeError> {
    if key.len() > 32 {
        return Err(DecodeError::InvalidKey(key.len()));
    }
    Ok(B256::left_padding_from(key))
}
