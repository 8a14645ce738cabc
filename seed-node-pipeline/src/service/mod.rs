//! Service module for the seed node pipeline.
//!
//! The `Service` owns the ingest loop, the index worker pool, the live serve
//! loop and the subscription bookkeeping. Raw payloads are converted once and
//! fanned out without blocking to the index pipeline and the serve pipeline;
//! a consumer that falls behind loses payloads rather than stalling ingest.
mod subscriptions;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use ipfs::IpfsBlockStore;
use seed_node_repository::{CidIndex, CidRepository, CidRetriever};
use seed_node_shared::types::{ConvertedPayload, FilterConfig, RawPayload, ResponsePayload};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::converter::{EthPayloadConverter, PayloadConverter};
use crate::errors::{IndexError, QueryError, ServiceError, SubscriptionError};
use crate::fetcher::{EthIpldFetcher, IpldFetcher};
use crate::filterer::{EthResponseFilterer, ResponseFilterer};
use crate::publisher::{EthIpldPublisher, IpldPublisher};
use crate::resolver::{EthIpldResolver, IpldResolver};
use crate::streamer::PayloadStreamer;
use subscriptions::SubscriptionGroups;

/// Sizing of the service's worker pool and channels.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Number of publish-and-index workers, which bounds concurrent index transactions.
    pub workers: usize,
    /// Capacity of the index and serve channels.
    pub payload_buffer_size: usize,
    /// Capacity of each subscriber's channel.
    pub subscription_buffer_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            payload_buffer_size: 20_000,
            subscription_buffer_size: 20_000,
        }
    }
}

/// The pipeline stages a [`Service`] runs.
#[derive(Clone)]
pub struct ServiceDependencies {
    pub converter: Arc<dyn PayloadConverter>,
    pub publisher: Arc<dyn IpldPublisher>,
    pub repository: Arc<dyn CidRepository>,
    pub retriever: Arc<dyn CidRetriever>,
    pub fetcher: Arc<dyn IpldFetcher>,
    pub resolver: Arc<dyn IpldResolver>,
    pub filterer: Arc<dyn ResponseFilterer>,
}

impl ServiceDependencies {
    /// Wires the Ethereum stages around a CID index and a block store.
    pub fn eth(index: CidIndex, store: Arc<dyn IpfsBlockStore>) -> Self {
        Self {
            converter: Arc::new(EthPayloadConverter::new()),
            publisher: Arc::new(EthIpldPublisher::new(store.clone())),
            repository: index.repository,
            retriever: index.retriever,
            fetcher: Arc::new(EthIpldFetcher::new(store)),
            resolver: Arc::new(EthIpldResolver::new()),
            filterer: Arc::new(EthResponseFilterer::new()),
        }
    }
}

type SharedPayload = Arc<ConvertedPayload>;

/// Hands `payload` to a downstream consumer without waiting.
///
/// Returns false when the payload was dropped because the consumer is full
/// or gone.
fn forward(tx: &mpsc::Sender<SharedPayload>, consumer: &'static str, payload: SharedPayload) -> bool {
    let block = payload.block_number;
    match tx.try_send(payload) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(consumer, block, "Consumer is full, dropping payload");
            false
        }
        Err(TrySendError::Closed(_)) => {
            warn!(consumer, block, "Consumer has stopped, dropping payload");
            false
        }
    }
}

pub struct Service {
    deps: ServiceDependencies,
    config: ServiceConfig,
    subscriptions: Mutex<SubscriptionGroups>,
    cancel: CancellationToken,
    started: AtomicBool,
}

impl Service {
    pub fn new(deps: ServiceDependencies, config: ServiceConfig) -> Self {
        Self {
            deps,
            config,
            subscriptions: Mutex::new(SubscriptionGroups::default()),
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    fn groups(&self) -> MutexGuard<'_, SubscriptionGroups> {
        self.subscriptions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Token cancelled when the service stops; background tasks built around
    /// the service watch it too.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Starts ingesting from `streamer`.
    ///
    /// Spawns the index workers, the serve loop and the ingest loop. The
    /// returned handle resolves when ingest ends: `Ok` after [`Service::stop`],
    /// `Err` when the upstream subscription failed.
    ///
    /// # Arguments
    ///
    /// * `streamer` - The upstream source of raw payloads
    ///
    /// # Returns
    ///
    /// The ingest task handle, or `ServiceError::AlreadyStarted` on a second call.
    pub fn start(
        self: &Arc<Self>,
        streamer: &dyn PayloadStreamer,
    ) -> Result<JoinHandle<Result<(), ServiceError>>, ServiceError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServiceError::AlreadyStarted);
        }

        let buffer_size = self.config.payload_buffer_size.max(1);
        let (index_tx, index_rx) = mpsc::channel(buffer_size);
        let (serve_tx, serve_rx) = mpsc::channel(buffer_size);

        let index_rx = Arc::new(tokio::sync::Mutex::new(index_rx));
        for id in 0..self.config.workers.max(1) {
            tokio::spawn(self.clone().publish_and_index(id, index_rx.clone()));
        }
        tokio::spawn(self.clone().screen_and_serve(serve_rx));

        let payloads = streamer.stream();
        info!(workers = self.config.workers, "Seed node service started");
        Ok(tokio::spawn(
            self.clone().sync_and_publish(payloads, index_tx, serve_tx),
        ))
    }

    /// The ingest loop: converts every raw payload and fans it out.
    async fn sync_and_publish(
        self: Arc<Self>,
        mut payloads: mpsc::Receiver<Result<RawPayload, SubscriptionError>>,
        index_tx: mpsc::Sender<SharedPayload>,
        serve_tx: mpsc::Sender<SharedPayload>,
    ) -> Result<(), ServiceError> {
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Stopping sync and publish");
                    return Ok(());
                }
                next = payloads.recv() => next,
            };

            let raw = match next {
                Some(Ok(raw)) => raw,
                Some(Err(e)) => {
                    error!(error = %e, "Upstream subscription failed");
                    return Err(e.into());
                }
                None => {
                    error!("Upstream subscription closed");
                    return Err(SubscriptionError::Closed.into());
                }
            };

            let payload = match self.deps.converter.convert(&raw) {
                Ok(payload) => Arc::new(payload),
                Err(e) => {
                    error!(block = raw.block_number, error = %e, "Failed to convert payload");
                    continue;
                }
            };
            debug!(block = payload.block_number, "Converted payload");

            forward(&serve_tx, "serve", payload.clone());
            forward(&index_tx, "index", payload);
        }
    }

    /// One worker of the index pool.
    async fn publish_and_index(
        self: Arc<Self>,
        id: usize,
        payloads: Arc<tokio::sync::Mutex<mpsc::Receiver<SharedPayload>>>,
    ) {
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = async { payloads.lock().await.recv().await } => next,
            };
            let Some(payload) = next else {
                break;
            };

            let block = payload.block_number;
            let cids = match self.deps.publisher.publish(&payload).await {
                Ok(cids) => cids,
                Err(e) => {
                    error!(worker = id, block, error = %e, "Failed to publish payload");
                    continue;
                }
            };
            if let Err(e) = self.deps.repository.index(&cids).await.map_err(IndexError::from) {
                error!(worker = id, block, error = %e, "Failed to index payload");
                continue;
            }
            debug!(worker = id, block, "Published and indexed payload");
        }
        info!(worker = id, "Stopping publish and index worker");
    }

    /// The serve loop: screens every payload once per subscription group.
    async fn screen_and_serve(self: Arc<Self>, mut payloads: mpsc::Receiver<SharedPayload>) {
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = payloads.recv() => next,
            };
            let Some(payload) = next else {
                break;
            };
            let snapshot = self.groups().snapshot();
            let filterer = &self.deps.filterer;
            let closed =
                subscriptions::broadcast(&snapshot, |filter| filterer.filter(filter, &payload));
            if !closed.is_empty() {
                self.groups().remove_closed(&closed);
            }
        }
        info!("Stopping screen and serve");
    }

    /// Registers a subscriber for `filter`.
    ///
    /// A requested backfill starts in the background straight away. Unless the
    /// subscription is backfill-only it also joins the group of subscribers
    /// with an identical filter. The receiver closes once nothing is left to
    /// deliver: after the backfill for backfill-only subscriptions, otherwise
    /// on unsubscribe or stop. After stop the receiver is closed from the start.
    pub fn subscribe(
        self: &Arc<Self>,
        filter: FilterConfig,
    ) -> Result<(Uuid, mpsc::Receiver<ResponsePayload>), ServiceError> {
        let subscription_type = filter.subscription_type()?;
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.config.subscription_buffer_size.max(1));
        info!(subscription = %id, group = %subscription_type, "New subscription");

        if self.cancel.is_cancelled() {
            warn!(subscription = %id, "Service is stopped, subscription closes immediately");
            return Ok((id, rx));
        }
        if filter.back_fill || filter.back_fill_only {
            let service = self.clone();
            let (filter, tx) = (filter.clone(), tx.clone());
            tokio::spawn(async move { service.back_fill(id, filter, tx).await });
        }
        if !filter.back_fill_only {
            self.groups().insert(subscription_type, filter, id, tx);
        }
        Ok((id, rx))
    }

    /// Removes a subscriber from every group it belongs to.
    pub fn unsubscribe(&self, id: &Uuid) {
        if self.groups().remove(id) {
            info!(subscription = %id, "Unsubscribed");
        }
    }

    /// Signals every task to quit and closes all subscriber channels.
    pub fn stop(&self) {
        info!("Stopping seed node service");
        self.cancel.cancel();
        self.groups().clear();
    }

    pub fn subscription_group_count(&self) -> usize {
        self.groups().group_count()
    }

    pub fn subscriber_count(&self) -> usize {
        self.groups().subscriber_count()
    }

    /// Streams historical data matching `filter` to one subscriber.
    ///
    /// Failures are reported in-band and never end the live subscription.
    async fn back_fill(&self, id: Uuid, filter: FilterConfig, tx: mpsc::Sender<ResponsePayload>) {
        let (start, end) = match self.back_fill_range(&filter).await {
            Ok(range) => range,
            Err(e) => {
                warn!(subscription = %id, error = %e, "Unable to backfill");
                let block = u64::try_from(filter.start_block).unwrap_or_default();
                let _ = tx.try_send(ResponsePayload::error(block, format!("backfill unavailable: {e}")));
                return;
            }
        };
        debug!(subscription = %id, start, end, "Backfilling subscription");

        for block in start..=end {
            if self.cancel.is_cancelled() || tx.is_closed() {
                debug!(subscription = %id, block, "Backfill abandoned");
                return;
            }
            let response = match self.query_block(&filter, block).await {
                Ok(Some(response)) => response,
                Ok(None) => continue,
                Err(e) => {
                    warn!(subscription = %id, block, error = %e, "Backfill query failed");
                    ResponsePayload::error(block, format!("backfill error at block {block}: {e}"))
                }
            };
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                sent = tx.send(response) => if sent.is_err() {
                    debug!(subscription = %id, "Subscriber went away during backfill");
                    return;
                },
            }
        }
        info!(subscription = %id, start, end, "Finished backfill");
    }

    /// Clamps the requested range to the indexed one.
    async fn back_fill_range(&self, filter: &FilterConfig) -> Result<(u64, u64), QueryError> {
        let retriever = &self.deps.retriever;
        let first = retriever
            .retrieve_first_block_number()
            .await?
            .ok_or(QueryError::NoIndexedData)?;
        let last = retriever
            .retrieve_last_block_number()
            .await?
            .ok_or(QueryError::NoIndexedData)?;

        let start = first.max(u64::try_from(filter.start_block).unwrap_or_default());
        let end = if filter.is_open_ended() {
            last
        } else {
            last.min(u64::try_from(filter.end_block).unwrap_or_default())
        };
        Ok((start, end))
    }

    async fn query_block(
        &self,
        filter: &FilterConfig,
        block: u64,
    ) -> Result<Option<ResponsePayload>, QueryError> {
        let cids = self.deps.retriever.retrieve_cids(filter, block).await?;
        if cids.is_empty() {
            return Ok(None);
        }
        let blocks = self.deps.fetcher.fetch(&cids).await?;
        Ok(Some(self.deps.resolver.resolve(blocks)))
    }
}
