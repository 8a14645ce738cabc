//! In-memory implementation of the CID index for tests and local development.
//!
//! Rows are kept in the same shape as the PostgreSQL tables and written with
//! the same upsert keys, so the behaviour under re-indexing matches. Each
//! `index` call applies to a copy of the tables and swaps it in only on
//! success.
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use seed_node_shared::types::{
    CidPayload, CidWrapper, FilterConfig, Gap, StateNodeCid, StorageNodeWithStateKeyCid,
};

use crate::{CidRepository, CidRetriever, RepositoryError};

#[derive(Clone, Debug)]
struct HeaderRow {
    id: i64,
    block_number: u64,
    block_hash: B256,
    cid: String,
    is_final: bool,
}

#[derive(Clone, Debug)]
struct TransactionRow {
    id: i64,
    header_id: i64,
    tx_hash: B256,
    tx_index: u32,
    cid: String,
    src: Address,
    dst: Address,
}

#[derive(Clone, Debug)]
struct ReceiptRow {
    tx_id: i64,
    cid: String,
    contract: Address,
    topic0s: Vec<B256>,
}

#[derive(Clone, Debug)]
struct StateRow {
    id: i64,
    header_id: i64,
    state_key: B256,
    cid: String,
    leaf: bool,
}

#[derive(Clone, Debug)]
struct StorageRow {
    state_id: i64,
    storage_key: B256,
    cid: String,
    leaf: bool,
}

#[derive(Clone, Debug, Default)]
struct Tables {
    next_id: i64,
    headers: Vec<HeaderRow>,
    transactions: Vec<TransactionRow>,
    receipts: Vec<ReceiptRow>,
    states: Vec<StateRow>,
    storage: Vec<StorageRow>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn upsert_header(&mut self, block_number: u64, block_hash: B256, cid: &str, is_final: bool) -> i64 {
        if let Some(row) = self
            .headers
            .iter_mut()
            .find(|r| r.block_number == block_number && r.block_hash == block_hash)
        {
            row.cid = cid.to_string();
            row.is_final = is_final;
            return row.id;
        }
        let id = self.next_id();
        self.headers.push(HeaderRow {
            id,
            block_number,
            block_hash,
            cid: cid.to_string(),
            is_final,
        });
        id
    }

    fn apply(&mut self, payload: &CidPayload) {
        let header_id = self.upsert_header(
            payload.block_number,
            payload.block_hash,
            &payload.header_cid,
            true,
        );
        for uncle in &payload.uncle_cids {
            self.upsert_header(payload.block_number, uncle.block_hash, &uncle.cid, false);
        }

        for trx in &payload.transaction_cids {
            let tx_id = match self
                .transactions
                .iter_mut()
                .find(|r| r.header_id == header_id && r.tx_hash == trx.tx_hash)
            {
                Some(row) => {
                    row.tx_index = trx.index;
                    row.cid = trx.cid.clone();
                    row.src = trx.src;
                    row.dst = trx.dst;
                    row.id
                }
                None => {
                    let id = self.next_id();
                    self.transactions.push(TransactionRow {
                        id,
                        header_id,
                        tx_hash: trx.tx_hash,
                        tx_index: trx.index,
                        cid: trx.cid.clone(),
                        src: trx.src,
                        dst: trx.dst,
                    });
                    id
                }
            };

            if let Some(receipt) = payload.receipt_cids.get(&trx.tx_hash) {
                let row = ReceiptRow {
                    tx_id,
                    cid: receipt.cid.clone(),
                    contract: receipt.contract,
                    topic0s: receipt.topic0s.clone(),
                };
                match self.receipts.iter_mut().find(|r| r.tx_id == tx_id) {
                    Some(existing) => *existing = row,
                    None => self.receipts.push(row),
                }
            }
        }

        for state in &payload.state_node_cids {
            let state_id = match self
                .states
                .iter_mut()
                .find(|r| r.header_id == header_id && r.state_key == state.state_key)
            {
                Some(row) => {
                    row.cid = state.cid.clone();
                    row.leaf = state.leaf;
                    row.id
                }
                None => {
                    let id = self.next_id();
                    self.states.push(StateRow {
                        id,
                        header_id,
                        state_key: state.state_key,
                        cid: state.cid.clone(),
                        leaf: state.leaf,
                    });
                    id
                }
            };

            for storage in payload
                .storage_node_cids
                .get(&state.state_key)
                .into_iter()
                .flatten()
            {
                let row = StorageRow {
                    state_id,
                    storage_key: storage.storage_key,
                    cid: storage.cid.clone(),
                    leaf: storage.leaf,
                };
                match self
                    .storage
                    .iter_mut()
                    .find(|r| r.state_id == state_id && r.storage_key == storage.storage_key)
                {
                    Some(existing) => *existing = row,
                    None => self.storage.push(row),
                }
            }
        }
    }

    fn header_ids_at(&self, block_number: u64) -> Vec<i64> {
        self.headers
            .iter()
            .filter(|h| h.block_number == block_number)
            .map(|h| h.id)
            .collect()
    }
}

/// In-memory CID index implementing both [`CidRepository`] and [`CidRetriever`].
pub struct InMemoryCidIndex {
    tables: RwLock<Tables>,
    reject_writes: AtomicBool,
}

impl InMemoryCidIndex {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            reject_writes: AtomicBool::new(false),
        }
    }

    /// Make subsequent `index` calls fail (or succeed again).
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Row counts per table: headers, transactions, receipts, state, storage.
    pub fn row_counts(&self) -> [usize; 5] {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        [
            tables.headers.len(),
            tables.transactions.len(),
            tables.receipts.len(),
            tables.states.len(),
            tables.storage.len(),
        ]
    }
}

impl Default for InMemoryCidIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CidRepository for InMemoryCidIndex {
    async fn index(&self, payload: &CidPayload) -> Result<(), RepositoryError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Rejected(format!(
                "block {}",
                payload.block_number
            )));
        }
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let mut staged = tables.clone();
        staged.apply(payload);
        *tables = staged;
        Ok(())
    }
}

#[async_trait]
impl CidRetriever for InMemoryCidIndex {
    async fn retrieve_cids(
        &self,
        filter: &FilterConfig,
        block_number: u64,
    ) -> Result<CidWrapper, RepositoryError> {
        let mut wrapper = CidWrapper::new(block_number);
        if !filter.in_range(block_number) {
            return Ok(wrapper);
        }
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        let header_ids = tables.header_ids_at(block_number);

        if !filter.header_filter.off {
            for header in tables.headers.iter().filter(|h| h.block_number == block_number) {
                if header.is_final {
                    wrapper.headers.push(header.cid.clone());
                } else if !filter.header_filter.final_only {
                    wrapper.uncles.push(header.cid.clone());
                }
            }
        }

        let mut block_trxs: Vec<&TransactionRow> = tables
            .transactions
            .iter()
            .filter(|t| header_ids.contains(&t.header_id))
            .collect();
        block_trxs.sort_by_key(|t| t.tx_index);

        let mut selected = Vec::new();
        if !filter.trx_filter.off {
            for trx in &block_trxs {
                if filter.trx_filter.matches(&trx.src, &trx.dst) {
                    selected.push(trx.id);
                    wrapper.transactions.push(trx.cid.clone());
                }
            }
        }

        if !filter.receipt_filter.off {
            for trx in &block_trxs {
                let Some(receipt) = tables.receipts.iter().find(|r| r.tx_id == trx.id) else {
                    continue;
                };
                let tx_selected = selected.contains(&trx.id);
                if filter.includes_receipt(tx_selected, &receipt.contract, &receipt.topic0s) {
                    wrapper.receipts.push(receipt.cid.clone());
                }
            }
        }

        let block_states: Vec<&StateRow> = tables
            .states
            .iter()
            .filter(|s| header_ids.contains(&s.header_id))
            .collect();

        if !filter.state_filter.off {
            let keys = filter.state_filter.keys();
            for state in &block_states {
                let key_match = keys.is_empty() || keys.contains(&state.state_key);
                if key_match && (state.leaf || filter.state_filter.intermediate_nodes) {
                    wrapper.state_nodes.push(StateNodeCid {
                        state_key: state.state_key,
                        cid: state.cid.clone(),
                        leaf: state.leaf,
                    });
                }
            }
            wrapper.state_nodes.sort_by_key(|s| s.state_key);
        }

        if !filter.storage_filter.off {
            let storage_filter = &filter.storage_filter;
            let state_keys = storage_filter.state_keys();
            for state in &block_states {
                if !(state_keys.is_empty() || state_keys.contains(&state.state_key)) {
                    continue;
                }
                for storage in tables.storage.iter().filter(|s| s.state_id == state.id) {
                    let key_match = storage_filter.storage_keys.is_empty()
                        || storage_filter.storage_keys.contains(&storage.storage_key);
                    if key_match && (storage.leaf || storage_filter.intermediate_nodes) {
                        wrapper.storage_nodes.push(StorageNodeWithStateKeyCid {
                            state_key: state.state_key,
                            storage_key: storage.storage_key,
                            cid: storage.cid.clone(),
                            leaf: storage.leaf,
                        });
                    }
                }
            }
            wrapper
                .storage_nodes
                .sort_by_key(|s| (s.state_key, s.storage_key));
        }

        Ok(wrapper)
    }

    async fn retrieve_first_block_number(&self) -> Result<Option<u64>, RepositoryError> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        Ok(tables.headers.iter().map(|h| h.block_number).min())
    }

    async fn retrieve_last_block_number(&self) -> Result<Option<u64>, RepositoryError> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        Ok(tables.headers.iter().map(|h| h.block_number).max())
    }

    async fn retrieve_gaps_in_data(&self) -> Result<Vec<Gap>, RepositoryError> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        let mut numbers: Vec<u64> = tables.headers.iter().map(|h| h.block_number).collect();
        numbers.sort_unstable();
        numbers.dedup();
        Ok(numbers
            .windows(2)
            .filter(|pair| pair[1] - pair[0] > 1)
            .map(|pair| Gap::new(pair[0] + 1, pair[1] - 1))
            .collect())
    }
}
