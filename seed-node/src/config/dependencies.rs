use std::sync::Arc;

use seed_node_pipeline::streamer::{RpcClient, RpcPayloadFetcher, RpcPayloadStreamer};
use seed_node_pipeline::{BackFillService, SeedNodeApi, Service, ServiceDependencies};
use tracing::info;

use crate::config::Config;
use crate::errors::SeedNodeError;

/// `Dependencies` holds the wired components of a seed node.
///
/// The gap repair service, when enabled, shares the pipeline components and
/// the cancellation token of the main service so stopping one stops both.
pub struct Dependencies {
    pub service: Arc<Service>,
    pub api: SeedNodeApi,
    pub streamer: RpcPayloadStreamer,
    pub backfill: Option<Arc<BackFillService>>,
}

impl Dependencies {
    /// Connects the CID index and the block store and builds every component.
    pub async fn new(config: &Config) -> Result<Self, SeedNodeError> {
        let index = config.index_source().into_index().await?;
        let store = config.ipfs_source().into_store();
        let deps = ServiceDependencies::eth(index, store);

        let service = Arc::new(Service::new(deps.clone(), config.service_config()));
        let api = SeedNodeApi::new(service.clone());

        let client = Arc::new(RpcClient::new(config.eth_rpc_url.clone())?);
        let streamer = RpcPayloadStreamer::new(
            client.clone(),
            config.poll_interval,
            config.payload_buffer_size,
        );

        let backfill = match config.backfill_config() {
            Some(backfill_config) => {
                let archival = if config.archival_rpc_url == config.eth_rpc_url {
                    client
                } else {
                    Arc::new(RpcClient::new(config.archival_rpc_url.clone())?)
                };
                info!(frequency = ?backfill_config.frequency, "Gap repair enabled");
                Some(Arc::new(BackFillService::new(
                    deps.converter,
                    deps.publisher,
                    deps.repository,
                    deps.retriever,
                    Arc::new(RpcPayloadFetcher::new(archival)),
                    backfill_config,
                    service.cancellation_token(),
                )))
            }
            None => None,
        };

        Ok(Self {
            service,
            api,
            streamer,
            backfill,
        })
    }
}
