//! Converter module for the seed node pipeline.
//!
//! Provides the `PayloadConverter` trait that turns one raw upstream payload
//! into a [`ConvertedPayload`], deriving the transaction and receipt metadata
//! that filtering and indexing need so neither has to decode again.

pub mod eth;
pub(crate) mod rlp;

use std::collections::BTreeMap;

use alloy_primitives::{Bytes, keccak256};
use alloy_rlp::Decodable;
use seed_node_shared::types::{
    ConvertedPayload, RawPayload, ReceiptMetaData, TrieNode, TrxMetaData,
};

use crate::errors::DecodeError;
use eth::{HEADER_NUMBER_INDEX, LegacyTransaction, StateDiff, StorageReceipt, trie_key};
use rlp::{is_list, list_items};

/// Trait for converting raw upstream payloads.
///
/// Conversion is a pure function of its input.
pub trait PayloadConverter: Send + Sync {
    fn convert(&self, payload: &RawPayload) -> Result<ConvertedPayload, DecodeError>;
}

/// Converter for Ethereum statediff payloads.
#[derive(Clone, Debug, Default)]
pub struct EthPayloadConverter;

impl EthPayloadConverter {
    pub fn new() -> Self {
        Self
    }
}

impl PayloadConverter for EthPayloadConverter {
    fn convert(&self, payload: &RawPayload) -> Result<ConvertedPayload, DecodeError> {
        if let Some(message) = &payload.err {
            return Err(DecodeError::Upstream {
                block_number: payload.block_number,
                message: message.clone(),
            });
        }

        let block = list_items(&payload.block_rlp, "block")?;
        let [header, transactions, uncles] = block[..] else {
            return Err(DecodeError::MalformedBlock(block.len()));
        };

        let header_fields = list_items(header, "header")?;
        let mut number_field = *header_fields
            .get(HEADER_NUMBER_INDEX)
            .ok_or(DecodeError::ShortHeader(header_fields.len()))?;
        let block_number = u64::decode(&mut number_field)?;

        let mut converted = ConvertedPayload {
            block_number,
            block_hash: keccak256(header),
            header_rlp: Bytes::copy_from_slice(header),
            uncles: list_items(uncles, "uncles")?
                .into_iter()
                .map(Bytes::copy_from_slice)
                .collect(),
            transactions: Vec::new(),
            trx_meta: Vec::new(),
            receipts: Vec::new(),
            receipt_meta: Vec::new(),
            state_nodes: BTreeMap::new(),
            storage_nodes: BTreeMap::new(),
        };

        let mut decoded_txs = Vec::new();
        for raw in list_items(transactions, "transactions")? {
            if !is_list(raw) {
                let mut body = raw;
                alloy_rlp::Header::decode(&mut body)?;
                return Err(DecodeError::UnsupportedTransaction(
                    body.first().copied().unwrap_or_default(),
                ));
            }
            let tx = LegacyTransaction::decode(&mut &raw[..])?;
            converted.trx_meta.push(TrxMetaData {
                tx_hash: keccak256(raw),
                src: tx.recover_sender()?,
                dst: tx.dst(),
            });
            converted.transactions.push(Bytes::copy_from_slice(raw));
            decoded_txs.push(tx);
        }

        let receipts = if payload.receipts_rlp.is_empty() {
            Vec::new()
        } else {
            list_items(&payload.receipts_rlp, "receipts")?
        };
        if receipts.len() != decoded_txs.len() {
            return Err(DecodeError::MismatchedReceipts {
                expected: decoded_txs.len(),
                actual: receipts.len(),
            });
        }
        for (index, raw) in receipts.into_iter().enumerate() {
            let receipt = StorageReceipt::decode(&mut &raw[..])?;
            let trx_meta = &converted.trx_meta[index];
            if receipt.tx_hash != trx_meta.tx_hash {
                return Err(DecodeError::ReceiptTxHash {
                    index,
                    expected: trx_meta.tx_hash,
                    actual: receipt.tx_hash,
                });
            }
            let contract_address = match decoded_txs[index].to.to() {
                Some(callee) => *callee,
                None => receipt.created_contract(),
            };
            converted.receipt_meta.push(ReceiptMetaData {
                tx_hash: receipt.tx_hash,
                contract_address,
                topic0s: receipt.topic0s(),
            });
            converted.receipts.push(Bytes::copy_from_slice(raw));
        }

        if !payload.state_diff_rlp.is_empty() {
            let state_diff = StateDiff::decode(&mut &payload.state_diff_rlp[..])?;
            for account in state_diff.accounts() {
                let state_key = trie_key(&account.key)?;
                converted.state_nodes.insert(
                    state_key,
                    TrieNode {
                        value: account.value.clone(),
                        leaf: account.leaf,
                    },
                );
                for storage in &account.storage {
                    converted.storage_nodes.entry(state_key).or_default().insert(
                        trie_key(&storage.key)?,
                        TrieNode {
                            value: storage.value.clone(),
                            leaf: storage.leaf,
                        },
                    );
                }
            }
        }

        Ok(converted)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, B256};
    use seed_node_shared::keys::address_to_key;

    use super::*;
    use crate::test_utils::{
        ACCOUNT, CREATED_CONTRACT, DST_A, DST_B, TOPIC, mock_block, mock_raw_payload,
    };

    #[test]
    fn test_convert_block() {
        let converted = EthPayloadConverter::new()
            .convert(&mock_raw_payload(100))
            .unwrap();

        assert_eq!(converted.block_number, 100);
        assert_eq!(converted.block_hash, keccak256(&converted.header_rlp));
        assert_eq!(converted.uncles.len(), 1);
        assert_eq!(converted.transactions.len(), 3);
        assert_eq!(converted.receipts.len(), 3);
        assert_eq!(converted.trx_meta[0].dst, DST_A);
        assert_eq!(converted.trx_meta[1].dst, DST_B);
        assert_eq!(converted.trx_meta[0].tx_hash, keccak256(&converted.transactions[0]));
    }

    #[test]
    fn test_contract_creation_metadata() {
        let converted = EthPayloadConverter::new()
            .convert(&mock_raw_payload(100))
            .unwrap();

        assert_eq!(converted.trx_meta[2].dst, Address::ZERO);
        assert_eq!(converted.receipt_meta[2].contract_address, CREATED_CONTRACT);
        assert_eq!(converted.receipt_meta[1].contract_address, DST_B);
        assert_eq!(converted.receipt_meta[1].topic0s, vec![TOPIC]);
        assert!(converted.receipt_meta[0].topic0s.is_empty());
    }

    #[test]
    fn test_senders_are_recovered() {
        let converted = EthPayloadConverter::new()
            .convert(&mock_raw_payload(100))
            .unwrap();

        // the same signature over different bodies recovers different signers
        assert_ne!(converted.trx_meta[0].src, Address::ZERO);
        assert_ne!(converted.trx_meta[0].src, converted.trx_meta[1].src);
    }

    #[test]
    fn test_state_and_storage_nodes() {
        let converted = EthPayloadConverter::new()
            .convert(&mock_raw_payload(100))
            .unwrap();
        let account_key = address_to_key(&ACCOUNT);

        assert_eq!(converted.state_nodes.len(), 2);
        assert!(converted.state_nodes[&account_key].leaf);
        assert!(!converted.state_nodes[&B256::repeat_byte(0x33)].leaf);
        assert_eq!(converted.storage_nodes.len(), 1);
        assert_eq!(converted.storage_nodes[&account_key].len(), 2);
    }

    #[test]
    fn test_upstream_error_is_rejected() {
        let raw = RawPayload::failed(7, "statediff unavailable");
        let result = EthPayloadConverter::new().convert(&raw);
        assert!(matches!(
            result,
            Err(DecodeError::Upstream { block_number: 7, .. })
        ));
    }

    #[test]
    fn test_malformed_block_is_rejected() {
        let mut raw = mock_raw_payload(100);
        raw.block_rlp = Bytes::from_static(&[0xc2, 0x80, 0x80]);
        assert!(matches!(
            EthPayloadConverter::new().convert(&raw),
            Err(DecodeError::MalformedBlock(2))
        ));

        raw.block_rlp = Bytes::from_static(&[0x83, 0x01, 0x02]);
        assert!(EthPayloadConverter::new().convert(&raw).is_err());
    }

    #[test]
    fn test_receipt_count_must_match() {
        let block = mock_block(100);
        let mut raw = mock_raw_payload(100);
        raw.receipts_rlp = block.receipts_rlp_without_last();

        assert!(matches!(
            EthPayloadConverter::new().convert(&raw),
            Err(DecodeError::MismatchedReceipts { expected: 3, actual: 2 })
        ));
    }
}
