use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::postgres::run_migrations;
use crate::{
    CidRepository, CidRetriever, InMemoryCidIndex, PostgresCidRepository, PostgresCidRetriever,
    RepositoryError,
};

/// Both halves of a CID index, sharing one backing store.
#[derive(Clone)]
pub struct CidIndex {
    pub repository: Arc<dyn CidRepository>,
    pub retriever: Arc<dyn CidRetriever>,
}

/// Where the CID index lives.
pub enum CidIndexSource {
    Mock,
    Live {
        database_url: String,
        max_connections: u32,
    },
}

impl CidIndexSource {
    pub fn mock() -> Self {
        CidIndexSource::Mock
    }

    pub fn live(database_url: impl Into<String>, max_connections: u32) -> Self {
        CidIndexSource::Live {
            database_url: database_url.into(),
            max_connections,
        }
    }

    /// Connects (and migrates) the backing store.
    pub async fn into_index(self) -> Result<CidIndex, RepositoryError> {
        match self {
            CidIndexSource::Mock => {
                let index = Arc::new(InMemoryCidIndex::new());
                Ok(CidIndex {
                    repository: index.clone(),
                    retriever: index,
                })
            }
            CidIndexSource::Live {
                database_url,
                max_connections,
            } => {
                let pool = PgPoolOptions::new()
                    .max_connections(max_connections)
                    .connect(&database_url)
                    .await?;
                run_migrations(&pool).await?;
                info!(max_connections, "Connected to CID index database");

                Ok(CidIndex {
                    repository: Arc::new(PostgresCidRepository::new(pool.clone()).await?),
                    retriever: Arc::new(PostgresCidRetriever::new(pool).await?),
                })
            }
        }
    }
}
