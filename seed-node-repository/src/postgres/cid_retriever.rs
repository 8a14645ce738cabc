use std::str::FromStr;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use seed_node_shared::keys::to_hex;
use seed_node_shared::types::{
    CidWrapper, FilterConfig, Gap, StateNodeCid, StorageNodeWithStateKeyCid,
};
use sqlx::{Postgres, QueryBuilder, Transaction};

use crate::postgres::{from_db_block_number, to_db_block_number};
use crate::{CidRetriever, RepositoryError};

/// PostgreSQL implementation of the CID index read side.
///
/// One query is built per category from the subscription filter. The
/// matching rules mirror `FilterConfig` so that a retrieved block carries
/// exactly what the live filterer would have served.
pub struct PostgresCidRetriever {
    pool: sqlx::PgPool,
}

fn parse_key(value: &str) -> Result<B256, RepositoryError> {
    B256::from_str(value).map_err(|_| RepositoryError::InvalidValue(value.to_string()))
}

fn hex_addresses(values: &[Address]) -> Vec<String> {
    values.iter().map(|v| to_hex(v.as_slice())).collect()
}

fn hex_keys(values: &[B256]) -> Vec<String> {
    values.iter().map(|v| to_hex(v.as_slice())).collect()
}

impl PostgresCidRetriever {
    pub async fn new(pool: sqlx::PgPool) -> Result<Self, RepositoryError> {
        Ok(Self { pool })
    }

    async fn retrieve_header_cids_tx(
        &self,
        block_number: i64,
        is_final: bool,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<String>, RepositoryError> {
        let cids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT cid FROM header_cids
            WHERE block_number = $1 AND final = $2
            ORDER BY id
            "#,
        )
        .bind(block_number)
        .bind(is_final)
        .fetch_all(&mut **tx)
        .await?;
        Ok(cids)
    }

    /// Returns `(id, cid)` of every matching transaction, in block order.
    async fn retrieve_trx_cids_tx(
        &self,
        filter: &FilterConfig,
        block_number: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<(i32, String)>, RepositoryError> {
        let trx_filter = &filter.trx_filter;
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT transaction_cids.id, transaction_cids.cid FROM transaction_cids \
             INNER JOIN header_cids ON (transaction_cids.header_id = header_cids.id) \
             WHERE header_cids.block_number = ",
        );
        query.push_bind(block_number);

        if trx_filter.is_restricted() {
            query.push(" AND (");
            let mut separated = query.separated(" OR ");
            if !trx_filter.dst.is_empty() {
                separated
                    .push("transaction_cids.dst = ANY(")
                    .push_bind_unseparated(hex_addresses(&trx_filter.dst))
                    .push_unseparated(")");
            }
            if !trx_filter.src.is_empty() {
                separated
                    .push("transaction_cids.src = ANY(")
                    .push_bind_unseparated(hex_addresses(&trx_filter.src))
                    .push_unseparated(")");
            }
            query.push(")");
        }
        query.push(" ORDER BY transaction_cids.tx_index");

        let rows = query
            .build_query_as::<(i32, String)>()
            .fetch_all(&mut **tx)
            .await?;
        Ok(rows)
    }

    /// Returns receipt CIDs: those of the selected transactions while the
    /// transaction category is on, otherwise those matching the receipt allow-lists.
    async fn retrieve_rct_cids_tx(
        &self,
        filter: &FilterConfig,
        block_number: i64,
        trx_ids: &[i32],
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<String>, RepositoryError> {
        let rct_filter = &filter.receipt_filter;
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT receipt_cids.cid FROM receipt_cids \
             INNER JOIN transaction_cids ON (receipt_cids.tx_id = transaction_cids.id) \
             INNER JOIN header_cids ON (transaction_cids.header_id = header_cids.id) \
             WHERE header_cids.block_number = ",
        );
        query.push_bind(block_number);

        if !filter.trx_filter.off {
            if filter.trx_filter.is_restricted() {
                query
                    .push(" AND receipt_cids.tx_id = ANY(")
                    .push_bind(trx_ids.to_vec())
                    .push(")");
            }
        } else if rct_filter.has_allow_list() {
            query.push(" AND ");
            let mut own = query.separated(" AND ");
            if !rct_filter.topic0s.is_empty() {
                own.push("receipt_cids.topic0s && ")
                    .push_bind_unseparated(hex_keys(&rct_filter.topic0s));
            }
            if !rct_filter.contracts.is_empty() {
                own.push("receipt_cids.contract = ANY(")
                    .push_bind_unseparated(hex_addresses(&rct_filter.contracts))
                    .push_unseparated(")");
            }
        }
        query.push(" ORDER BY transaction_cids.tx_index");

        let cids = query
            .build_query_scalar::<String>()
            .fetch_all(&mut **tx)
            .await?;
        Ok(cids)
    }

    async fn retrieve_state_cids_tx(
        &self,
        filter: &FilterConfig,
        block_number: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<StateNodeCid>, RepositoryError> {
        let state_filter = &filter.state_filter;
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT state_cids.state_key, state_cids.cid, state_cids.leaf FROM state_cids \
             INNER JOIN header_cids ON (state_cids.header_id = header_cids.id) \
             WHERE header_cids.block_number = ",
        );
        query.push_bind(block_number);

        if !state_filter.addresses.is_empty() {
            query
                .push(" AND state_cids.state_key = ANY(")
                .push_bind(hex_keys(&state_filter.keys()))
                .push(")");
        }
        if !state_filter.intermediate_nodes {
            query.push(" AND state_cids.leaf = TRUE");
        }
        query.push(" ORDER BY state_cids.state_key");

        let rows = query
            .build_query_as::<(String, String, bool)>()
            .fetch_all(&mut **tx)
            .await?;
        rows.into_iter()
            .map(|(state_key, cid, leaf)| {
                Ok(StateNodeCid {
                    state_key: parse_key(&state_key)?,
                    cid,
                    leaf,
                })
            })
            .collect()
    }

    async fn retrieve_storage_cids_tx(
        &self,
        filter: &FilterConfig,
        block_number: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<StorageNodeWithStateKeyCid>, RepositoryError> {
        let storage_filter = &filter.storage_filter;
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT state_cids.state_key, storage_cids.storage_key, storage_cids.cid, storage_cids.leaf \
             FROM storage_cids \
             INNER JOIN state_cids ON (storage_cids.state_id = state_cids.id) \
             INNER JOIN header_cids ON (state_cids.header_id = header_cids.id) \
             WHERE header_cids.block_number = ",
        );
        query.push_bind(block_number);

        if !storage_filter.addresses.is_empty() {
            query
                .push(" AND state_cids.state_key = ANY(")
                .push_bind(hex_keys(&storage_filter.state_keys()))
                .push(")");
        }
        if !storage_filter.storage_keys.is_empty() {
            query
                .push(" AND storage_cids.storage_key = ANY(")
                .push_bind(hex_keys(&storage_filter.storage_keys))
                .push(")");
        }
        if !storage_filter.intermediate_nodes {
            query.push(" AND storage_cids.leaf = TRUE");
        }
        query.push(" ORDER BY state_cids.state_key, storage_cids.storage_key");

        let rows = query
            .build_query_as::<(String, String, String, bool)>()
            .fetch_all(&mut **tx)
            .await?;
        rows.into_iter()
            .map(|(state_key, storage_key, cid, leaf)| {
                Ok(StorageNodeWithStateKeyCid {
                    state_key: parse_key(&state_key)?,
                    storage_key: parse_key(&storage_key)?,
                    cid,
                    leaf,
                })
            })
            .collect()
    }
}

#[async_trait]
impl CidRetriever for PostgresCidRetriever {
    async fn retrieve_cids(
        &self,
        filter: &FilterConfig,
        block_number: u64,
    ) -> Result<CidWrapper, RepositoryError> {
        let mut wrapper = CidWrapper::new(block_number);
        if !filter.in_range(block_number) {
            return Ok(wrapper);
        }
        let number = to_db_block_number(block_number)?;
        let mut tx = self.pool.begin().await?;

        if !filter.header_filter.off {
            wrapper.headers = self.retrieve_header_cids_tx(number, true, &mut tx).await?;
            if !filter.header_filter.final_only {
                wrapper.uncles = self.retrieve_header_cids_tx(number, false, &mut tx).await?;
            }
        }

        let mut trx_ids = Vec::new();
        if !filter.trx_filter.off {
            for (id, cid) in self.retrieve_trx_cids_tx(filter, number, &mut tx).await? {
                trx_ids.push(id);
                wrapper.transactions.push(cid);
            }
        }

        if !filter.receipt_filter.off {
            wrapper.receipts = self
                .retrieve_rct_cids_tx(filter, number, &trx_ids, &mut tx)
                .await?;
        }

        if !filter.state_filter.off {
            wrapper.state_nodes = self.retrieve_state_cids_tx(filter, number, &mut tx).await?;
        }

        if !filter.storage_filter.off {
            wrapper.storage_nodes = self
                .retrieve_storage_cids_tx(filter, number, &mut tx)
                .await?;
        }

        tx.commit().await?;
        Ok(wrapper)
    }

    async fn retrieve_first_block_number(&self) -> Result<Option<u64>, RepositoryError> {
        let first = sqlx::query_scalar::<_, i64>(
            "SELECT block_number FROM header_cids ORDER BY block_number ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        first.map(from_db_block_number).transpose()
    }

    async fn retrieve_last_block_number(&self) -> Result<Option<u64>, RepositoryError> {
        let last = sqlx::query_scalar::<_, i64>(
            "SELECT block_number FROM header_cids ORDER BY block_number DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        last.map(from_db_block_number).transpose()
    }

    async fn retrieve_gaps_in_data(&self) -> Result<Vec<Gap>, RepositoryError> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT block_number + 1 AS start, next_block - 1 AS stop
            FROM (
                SELECT block_number, LEAD(block_number) OVER (ORDER BY block_number) AS next_block
                FROM (SELECT DISTINCT block_number FROM header_cids) AS numbers
            ) AS pairs
            WHERE next_block - block_number > 1
            ORDER BY start
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(start, stop)| {
                Ok(Gap::new(
                    from_db_block_number(start)?,
                    from_db_block_number(stop)?,
                ))
            })
            .collect()
    }
}
