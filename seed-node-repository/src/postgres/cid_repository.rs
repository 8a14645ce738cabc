use async_trait::async_trait;
use seed_node_shared::keys::to_hex;
use seed_node_shared::types::{CidPayload, ReceiptCid, StateNodeCid, StorageNodeCid, TxCid};
use sqlx::{Postgres, Transaction};
use tracing::debug;

use crate::postgres::{to_db_block_number, to_db_tx_index};
use crate::{CidRepository, RepositoryError};

/// PostgreSQL implementation of the CID index write side.
///
/// Every payload is written inside a single transaction; dropping the
/// transaction on an early `?` return rolls it back.
pub struct PostgresCidRepository {
    pool: sqlx::PgPool,
}

impl PostgresCidRepository {
    /// Creates a new PostgreSQL repository instance.
    ///
    /// # Arguments
    ///
    /// * `pool` - Configured PostgreSQL connection pool with the CID index schema
    pub async fn new(pool: sqlx::PgPool) -> Result<Self, RepositoryError> {
        Ok(Self { pool })
    }

    /// Upserts a header or uncle row and returns its id.
    async fn index_header_tx(
        &self,
        block_number: i64,
        block_hash: &str,
        cid: &str,
        is_final: bool,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<i32, RepositoryError> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO header_cids (block_number, block_hash, cid, final)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (block_number, block_hash)
            DO UPDATE SET
                cid = EXCLUDED.cid,
                final = EXCLUDED.final
            RETURNING id
            "#,
        )
        .bind(block_number)
        .bind(block_hash)
        .bind(cid)
        .bind(is_final)
        .fetch_one(&mut **tx)
        .await?;
        Ok(id)
    }

    /// Upserts each transaction and, right after it, the receipt it owns.
    async fn index_transactions_and_receipts_tx(
        &self,
        header_id: i32,
        payload: &CidPayload,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<(), RepositoryError> {
        for trx in &payload.transaction_cids {
            let tx_id = self.index_transaction_tx(header_id, trx, tx).await?;
            if let Some(receipt) = payload.receipt_cids.get(&trx.tx_hash) {
                self.index_receipt_tx(tx_id, receipt, tx).await?;
            }
        }
        Ok(())
    }

    async fn index_transaction_tx(
        &self,
        header_id: i32,
        trx: &TxCid,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<i32, RepositoryError> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO transaction_cids (header_id, tx_hash, tx_index, cid, src, dst)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (header_id, tx_hash)
            DO UPDATE SET
                tx_index = EXCLUDED.tx_index,
                cid = EXCLUDED.cid,
                src = EXCLUDED.src,
                dst = EXCLUDED.dst
            RETURNING id
            "#,
        )
        .bind(header_id)
        .bind(to_hex(trx.tx_hash.as_slice()))
        .bind(to_db_tx_index(trx.index)?)
        .bind(&trx.cid)
        .bind(to_hex(trx.src.as_slice()))
        .bind(to_hex(trx.dst.as_slice()))
        .fetch_one(&mut **tx)
        .await?;
        Ok(id)
    }

    async fn index_receipt_tx(
        &self,
        tx_id: i32,
        receipt: &ReceiptCid,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<(), RepositoryError> {
        let topic0s: Vec<String> = receipt.topic0s.iter().map(|t| to_hex(t.as_slice())).collect();
        sqlx::query(
            r#"
            INSERT INTO receipt_cids (tx_id, cid, contract, topic0s)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tx_id)
            DO UPDATE SET
                cid = EXCLUDED.cid,
                contract = EXCLUDED.contract,
                topic0s = EXCLUDED.topic0s
            "#,
        )
        .bind(tx_id)
        .bind(&receipt.cid)
        .bind(to_hex(receipt.contract.as_slice()))
        .bind(topic0s)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Upserts each state node and, right after it, the storage nodes under it.
    async fn index_state_and_storage_tx(
        &self,
        header_id: i32,
        payload: &CidPayload,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<(), RepositoryError> {
        for state in &payload.state_node_cids {
            let state_id = self.index_state_tx(header_id, state, tx).await?;
            if let Some(storage_nodes) = payload.storage_node_cids.get(&state.state_key) {
                for storage in storage_nodes {
                    self.index_storage_tx(state_id, storage, tx).await?;
                }
            }
        }
        Ok(())
    }

    async fn index_state_tx(
        &self,
        header_id: i32,
        state: &StateNodeCid,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<i32, RepositoryError> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO state_cids (header_id, state_key, cid, leaf)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (header_id, state_key)
            DO UPDATE SET
                cid = EXCLUDED.cid,
                leaf = EXCLUDED.leaf
            RETURNING id
            "#,
        )
        .bind(header_id)
        .bind(to_hex(state.state_key.as_slice()))
        .bind(&state.cid)
        .bind(state.leaf)
        .fetch_one(&mut **tx)
        .await?;
        Ok(id)
    }

    async fn index_storage_tx(
        &self,
        state_id: i32,
        storage: &StorageNodeCid,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO storage_cids (state_id, storage_key, cid, leaf)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (state_id, storage_key)
            DO UPDATE SET
                cid = EXCLUDED.cid,
                leaf = EXCLUDED.leaf
            "#,
        )
        .bind(state_id)
        .bind(to_hex(storage.storage_key.as_slice()))
        .bind(&storage.cid)
        .bind(storage.leaf)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CidRepository for PostgresCidRepository {
    async fn index(&self, payload: &CidPayload) -> Result<(), RepositoryError> {
        let block_number = to_db_block_number(payload.block_number)?;
        let mut tx = self.pool.begin().await?;

        let header_id = self
            .index_header_tx(
                block_number,
                &to_hex(payload.block_hash.as_slice()),
                &payload.header_cid,
                true,
                &mut tx,
            )
            .await?;

        for uncle in &payload.uncle_cids {
            self.index_header_tx(
                block_number,
                &to_hex(uncle.block_hash.as_slice()),
                &uncle.cid,
                false,
                &mut tx,
            )
            .await?;
        }

        self.index_transactions_and_receipts_tx(header_id, payload, &mut tx)
            .await?;
        self.index_state_and_storage_tx(header_id, payload, &mut tx)
            .await?;

        tx.commit().await?;
        debug!(
            block = payload.block_number,
            transactions = payload.transaction_cids.len(),
            state_nodes = payload.state_node_cids.len(),
            "Indexed block CIDs"
        );
        Ok(())
    }
}
