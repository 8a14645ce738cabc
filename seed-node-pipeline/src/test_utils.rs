//! Block fixtures shared by the pipeline tests.
use alloy_primitives::{Address, B256, Bytes, TxKind, U256, hex, keccak256};
use alloy_rlp::{Encodable, RlpEncodable};
use seed_node_shared::keys::address_to_key;
use seed_node_shared::types::{ConvertedPayload, RawPayload};

use crate::converter::eth::{
    AccountDiff, LegacyTransaction, Log, StateDiff, StorageDiff, StorageReceipt,
};
use crate::converter::rlp::wrap_list;
use crate::converter::{EthPayloadConverter, PayloadConverter};

pub(crate) const DST_A: Address = Address::repeat_byte(0xaa);
pub(crate) const DST_B: Address = Address::repeat_byte(0xbb);
pub(crate) const CREATED_CONTRACT: Address = Address::repeat_byte(0xcc);
pub(crate) const ACCOUNT: Address = Address::repeat_byte(0x11);
pub(crate) const TOPIC: B256 = B256::repeat_byte(0xe1);
pub(crate) const STORAGE_LEAF: B256 = B256::repeat_byte(0x22);
pub(crate) const STORAGE_BRANCH: B256 = B256::repeat_byte(0x23);
pub(crate) const STATE_BRANCH: B256 = B256::repeat_byte(0x33);

#[derive(RlpEncodable)]
struct TestHeader {
    parent_hash: B256,
    ommers_hash: B256,
    beneficiary: Address,
    state_root: B256,
    transactions_root: B256,
    receipts_root: B256,
    logs_bloom: Bytes,
    difficulty: U256,
    number: u64,
    gas_limit: u64,
    gas_used: u64,
    timestamp: u64,
    extra_data: Bytes,
    mix_hash: B256,
    nonce: Bytes,
}

fn encode<T: Encodable>(value: &T) -> Vec<u8> {
    let mut out = Vec::new();
    value.encode(&mut out);
    out
}

fn encode_raw_list(items: &[Vec<u8>]) -> Vec<u8> {
    wrap_list(&items.concat())
}

pub(crate) fn header_rlp(number: u64, extra: u8) -> Vec<u8> {
    encode(&TestHeader {
        parent_hash: B256::left_padding_from(&number.saturating_sub(1).to_be_bytes()),
        ommers_hash: B256::ZERO,
        beneficiary: Address::repeat_byte(0xfe),
        state_root: B256::repeat_byte(extra),
        transactions_root: B256::ZERO,
        receipts_root: B256::ZERO,
        logs_bloom: Bytes::from(vec![0u8; 256]),
        difficulty: U256::from(1),
        number,
        gas_limit: 30_000_000,
        gas_used: 63_000,
        timestamp: 1_600_000_000 + number,
        extra_data: Bytes::from(vec![extra]),
        mix_hash: B256::ZERO,
        nonce: Bytes::from(vec![0u8; 8]),
    })
}

/// Signs `to` with the EIP-155 example signature; recovery yields a
/// deterministic sender per transaction body.
pub(crate) fn signed_tx(nonce: u64, to: TxKind) -> LegacyTransaction {
    LegacyTransaction {
        nonce,
        gas_price: 20_000_000_000,
        gas_limit: 21_000,
        to,
        value: U256::from(1_000_000_000_000_000_000u64),
        input: Bytes::new(),
        v: 37,
        r: U256::from_be_slice(&hex!(
            "28ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276"
        )),
        s: U256::from_be_slice(&hex!(
            "67cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        )),
    }
}

/// A block with a call to [`DST_A`], a call to [`DST_B`] emitting [`TOPIC`],
/// a contract creation, one uncle, a leaf and an intermediate state node,
/// and a storage leaf and branch under [`ACCOUNT`].
pub(crate) struct MockBlock {
    pub number: u64,
    pub transactions: Vec<LegacyTransaction>,
    pub receipts: Vec<StorageReceipt>,
    pub uncles: Vec<Vec<u8>>,
    pub state_diff: StateDiff,
}

impl MockBlock {
    /// Keeps only the first `n` transactions and their receipts.
    pub fn with_transactions(mut self, n: usize) -> Self {
        self.transactions.truncate(n);
        self.receipts.truncate(n);
        self
    }

    fn receipts_rlp_of(&self, receipts: &[StorageReceipt]) -> Vec<u8> {
        let encoded: Vec<Vec<u8>> = receipts.iter().map(encode).collect();
        encode_raw_list(&encoded)
    }

    pub fn receipts_rlp_without_last(&self) -> Bytes {
        let keep = self.receipts.len().saturating_sub(1);
        Bytes::from(self.receipts_rlp_of(&self.receipts[..keep]))
    }

    pub fn raw_payload(&self) -> RawPayload {
        let txs: Vec<Vec<u8>> = self.transactions.iter().map(encode).collect();
        let block_rlp = encode_raw_list(&[
            header_rlp(self.number, 0),
            encode_raw_list(&txs),
            encode_raw_list(&self.uncles),
        ]);
        RawPayload {
            block_number: self.number,
            block_rlp: Bytes::from(block_rlp),
            receipts_rlp: Bytes::from(self.receipts_rlp_of(&self.receipts)),
            state_diff_rlp: Bytes::from(encode(&self.state_diff)),
            err: None,
        }
    }

    pub fn converted(&self) -> ConvertedPayload {
        EthPayloadConverter::new()
            .convert(&self.raw_payload())
            .unwrap()
    }
}

fn receipt_for(tx: &LegacyTransaction, logs: Vec<Log>, contract: Option<Address>) -> StorageReceipt {
    StorageReceipt {
        post_state_or_status: Bytes::from_static(&[1]),
        cumulative_gas_used: 21_000,
        tx_hash: keccak256(encode(tx)),
        contract_address: contract
            .map(|a| Bytes::copy_from_slice(a.as_slice()))
            .unwrap_or_default(),
        logs,
        gas_used: 21_000,
    }
}

pub(crate) fn mock_block(number: u64) -> MockBlock {
    // nonces are salted with the block number so every block has distinct hashes
    let base = number * 10;
    let tx_a = signed_tx(base, TxKind::Call(DST_A));
    let tx_b = signed_tx(base + 1, TxKind::Call(DST_B));
    let tx_c = signed_tx(base + 2, TxKind::Create);

    let receipts = vec![
        receipt_for(&tx_a, vec![], None),
        receipt_for(
            &tx_b,
            vec![Log {
                address: DST_B,
                topics: vec![TOPIC, B256::repeat_byte(0x01)],
                data: Bytes::from_static(&[0xde, 0xad]),
            }],
            None,
        ),
        receipt_for(&tx_c, vec![], Some(CREATED_CONTRACT)),
    ];

    let account_key = address_to_key(&ACCOUNT);
    let state_diff = StateDiff {
        block_number: number,
        block_hash: keccak256(header_rlp(number, 0)),
        created_accounts: vec![],
        deleted_accounts: vec![],
        updated_accounts: vec![
            AccountDiff {
                key: Bytes::copy_from_slice(account_key.as_slice()),
                value: Bytes::from(format!("account-{}", number).into_bytes()),
                storage: vec![
                    StorageDiff {
                        key: Bytes::copy_from_slice(STORAGE_LEAF.as_slice()),
                        value: Bytes::from(format!("slot-{}", number).into_bytes()),
                        leaf: true,
                    },
                    StorageDiff {
                        key: Bytes::copy_from_slice(STORAGE_BRANCH.as_slice()),
                        value: Bytes::from(format!("slot-branch-{}", number).into_bytes()),
                        leaf: false,
                    },
                ],
                leaf: true,
            },
            AccountDiff {
                key: Bytes::copy_from_slice(STATE_BRANCH.as_slice()),
                value: Bytes::from(format!("branch-{}", number).into_bytes()),
                storage: vec![],
                leaf: false,
            },
        ],
    };

    MockBlock {
        number,
        transactions: vec![tx_a, tx_b, tx_c],
        receipts,
        uncles: vec![header_rlp(number.saturating_sub(1), 0xff)],
        state_diff,
    }
}

pub(crate) fn mock_raw_payload(number: u64) -> RawPayload {
    mock_block(number).raw_payload()
}

pub(crate) fn mock_converted_payload(number: u64) -> ConvertedPayload {
    mock_block(number).converted()
}
