//! Gap repair for the CID index.
//!
//! The `BackFillService` periodically looks for block ranges missing from the
//! index and replays them through convert, publish and index using payloads
//! fetched out of band. Index writes are upserts, so repair can overlap live
//! ingestion safely.
use std::sync::Arc;
use std::time::Duration;

use seed_node_repository::{CidRepository, CidRetriever};
use seed_node_shared::types::{Gap, RawPayload};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::converter::PayloadConverter;
use crate::errors::{IndexError, QueryError};
use crate::publisher::IpldPublisher;
use crate::streamer::PayloadFetcher;

#[derive(Clone, Debug)]
pub struct BackFillConfig {
    /// Time between gap checks.
    pub frequency: Duration,
    /// Blocks requested from the fetcher in one call.
    pub batch_size: u64,
    pub max_concurrent_batches: usize,
    /// First block the index is expected to hold.
    pub start_block: u64,
}

impl Default for BackFillConfig {
    fn default() -> Self {
        Self {
            frequency: Duration::from_secs(60),
            batch_size: 5_000,
            max_concurrent_batches: 100,
            start_block: 1,
        }
    }
}

pub struct BackFillService {
    converter: Arc<dyn PayloadConverter>,
    publisher: Arc<dyn IpldPublisher>,
    repository: Arc<dyn CidRepository>,
    retriever: Arc<dyn CidRetriever>,
    fetcher: Arc<dyn PayloadFetcher>,
    config: BackFillConfig,
    cancel: CancellationToken,
}

/// Splits an inclusive range into consecutive `(start, stop)` bins of at most
/// `batch_size` blocks, lazily.
fn bin_ranges(start: u64, stop: u64, batch_size: u64) -> impl Iterator<Item = (u64, u64)> {
    let batch_size = batch_size.max(1);
    let mut next = (start <= stop).then_some(start);
    std::iter::from_fn(move || {
        let bin_start = next?;
        let bin_stop = bin_start.saturating_add(batch_size - 1).min(stop);
        next = bin_stop.checked_add(1).filter(|n| *n <= stop);
        Some((bin_start, bin_stop))
    })
}

impl BackFillService {
    pub fn new(
        converter: Arc<dyn PayloadConverter>,
        publisher: Arc<dyn IpldPublisher>,
        repository: Arc<dyn CidRepository>,
        retriever: Arc<dyn CidRetriever>,
        fetcher: Arc<dyn PayloadFetcher>,
        config: BackFillConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            converter,
            publisher,
            repository,
            retriever,
            fetcher,
            config,
            cancel,
        }
    }

    /// Checks for gaps every `frequency` until cancelled.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.frequency);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(frequency = ?self.config.frequency, "Gap repair started");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            match self.fill_gaps().await {
                Ok(0) => debug!("No gaps in index"),
                Ok(indexed) => info!(indexed, "Repaired gaps in index"),
                Err(e) => error!(error = %e, "Gap check failed"),
            }
        }
        info!("Gap repair stopped");
    }

    /// Ranges the index should hold but does not.
    ///
    /// Includes the range below the first indexed block when the index does
    /// not reach down to `start_block`.
    pub async fn find_gaps(&self) -> Result<Vec<Gap>, QueryError> {
        let Some(first) = self.retriever.retrieve_first_block_number().await? else {
            return Ok(Vec::new());
        };
        let mut gaps = Vec::new();
        if first > self.config.start_block {
            gaps.push(Gap::new(self.config.start_block, first - 1));
        }
        gaps.extend(self.retriever.retrieve_gaps_in_data().await?);
        Ok(gaps)
    }

    /// Finds every gap and backfills it, returning how many blocks were indexed.
    pub async fn fill_gaps(self: &Arc<Self>) -> Result<usize, QueryError> {
        let mut indexed = 0;
        for gap in self.find_gaps().await? {
            if self.cancel.is_cancelled() {
                break;
            }
            info!(start = gap.start, stop = gap.stop, "Filling gap");
            indexed += self.back_fill(gap.start, gap.stop).await;
        }
        Ok(indexed)
    }

    /// Fetches and indexes `start..=stop`, with at most
    /// `max_concurrent_batches` bins in flight.
    pub async fn back_fill(self: &Arc<Self>, start: u64, stop: u64) -> usize {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_batches.max(1)));
        let mut tasks = JoinSet::new();

        for (bin_start, bin_stop) in bin_ranges(start, stop, self.config.batch_size) {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let service = self.clone();
            tasks.spawn(async move {
                let _permit = permit;
                service.process_bin(bin_start, bin_stop).await
            });
        }

        let mut indexed = 0;
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(count) => indexed += count,
                Err(e) => error!(error = %e, "Backfill task failed"),
            }
        }
        indexed
    }

    async fn process_bin(&self, start: u64, stop: u64) -> usize {
        if self.cancel.is_cancelled() {
            return 0;
        }
        let bin: Vec<u64> = (start..=stop).collect();
        let payloads = match self.fetcher.fetch_payloads_at(&bin).await {
            Ok(payloads) => payloads,
            Err(e) => {
                warn!(start, stop, error = %e, "Failed to fetch backfill payloads");
                return 0;
            }
        };

        let mut indexed = 0;
        for raw in payloads {
            if self.index_payload(&raw).await {
                indexed += 1;
            }
        }
        indexed
    }

    async fn index_payload(&self, raw: &RawPayload) -> bool {
        let block = raw.block_number;
        let payload = match self.converter.convert(raw) {
            Ok(payload) => payload,
            Err(e) => {
                error!(block, error = %e, "Failed to convert backfill payload");
                return false;
            }
        };
        let cids = match self.publisher.publish(&payload).await {
            Ok(cids) => cids,
            Err(e) => {
                error!(block, error = %e, "Failed to publish backfill payload");
                return false;
            }
        };
        if let Err(e) = self.repository.index(&cids).await.map_err(IndexError::from) {
            error!(block, error = %e, "Failed to index backfill payload");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use ipfs::MockIpfsClient;
    use seed_node_repository::InMemoryCidIndex;

    use super::*;
    use crate::converter::EthPayloadConverter;
    use crate::publisher::EthIpldPublisher;
    use crate::streamer::MockPayloadFetcher;
    use crate::test_utils::{mock_converted_payload, mock_raw_payload};

    fn service(
        index: Arc<InMemoryCidIndex>,
        fetcher: Arc<MockPayloadFetcher>,
        config: BackFillConfig,
    ) -> Arc<BackFillService> {
        Arc::new(BackFillService::new(
            Arc::new(EthPayloadConverter::new()),
            Arc::new(EthIpldPublisher::new(Arc::new(MockIpfsClient::new()))),
            index.clone(),
            index,
            fetcher,
            config,
            CancellationToken::new(),
        ))
    }

    async fn index_blocks(index: &InMemoryCidIndex, blocks: impl IntoIterator<Item = u64>) {
        let publisher = EthIpldPublisher::new(Arc::new(MockIpfsClient::new()));
        for n in blocks {
            let cids = publisher.publish(&mock_converted_payload(n)).await.unwrap();
            index.index(&cids).await.unwrap();
        }
    }

    fn config(start_block: u64, batch_size: u64) -> BackFillConfig {
        BackFillConfig {
            batch_size,
            max_concurrent_batches: 2,
            start_block,
            ..Default::default()
        }
    }

    #[test]
    fn test_bin_ranges() {
        let bins = |start, stop, batch| bin_ranges(start, stop, batch).collect::<Vec<_>>();
        assert_eq!(bins(1, 7, 3), vec![(1, 3), (4, 6), (7, 7)]);
        assert_eq!(bins(5, 5, 100), vec![(5, 5)]);
        assert!(bins(6, 5, 3).is_empty());
        assert_eq!(bins(1, 2, 0), vec![(1, 1), (2, 2)]);
        assert_eq!(bins(u64::MAX - 1, u64::MAX, 10), vec![(u64::MAX - 1, u64::MAX)]);
    }

    #[test]
    fn test_bin_ranges_over_long_leading_gap() {
        let mut bins = bin_ranges(1, 15_000_000, 5_000);
        assert_eq!(bins.next(), Some((1, 5_000)));
        assert_eq!(bins.next(), Some((5_001, 10_000)));
        assert_eq!(bins.last(), Some((14_995_001, 15_000_000)));
        assert_eq!(bin_ranges(1, 15_000_000, 5_000).count(), 3_000);
    }

    #[tokio::test]
    async fn test_find_gaps_includes_leading_range() {
        let index = Arc::new(InMemoryCidIndex::new());
        index_blocks(&index, [5, 6, 9]).await;
        let svc = service(index, Arc::new(MockPayloadFetcher::default()), config(2, 10));

        let gaps = svc.find_gaps().await.unwrap();
        assert_eq!(gaps, vec![Gap::new(2, 4), Gap::new(7, 8)]);
    }

    #[tokio::test]
    async fn test_find_gaps_on_empty_index() {
        let index = Arc::new(InMemoryCidIndex::new());
        let svc = service(index, Arc::new(MockPayloadFetcher::default()), config(1, 10));
        assert!(svc.find_gaps().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fill_gaps_indexes_missing_blocks() {
        let index = Arc::new(InMemoryCidIndex::new());
        index_blocks(&index, [1, 5]).await;
        let fetcher = Arc::new(MockPayloadFetcher::new((2..=4).map(mock_raw_payload)));
        let svc = service(index.clone(), fetcher.clone(), config(1, 2));

        let indexed = svc.fill_gaps().await.unwrap();

        assert_eq!(indexed, 3);
        assert!(index.retrieve_gaps_in_data().await.unwrap().is_empty());
        let mut requested = fetcher.requested();
        requested.sort();
        assert_eq!(requested, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_unavailable_blocks_stay_missing() {
        let index = Arc::new(InMemoryCidIndex::new());
        index_blocks(&index, [1, 5]).await;
        let fetcher = Arc::new(MockPayloadFetcher::new([mock_raw_payload(3)]));
        let svc = service(index.clone(), fetcher, config(1, 10));

        assert_eq!(svc.fill_gaps().await.unwrap(), 1);
        assert_eq!(
            index.retrieve_gaps_in_data().await.unwrap(),
            vec![Gap::new(2, 2), Gap::new(4, 4)]
        );
    }

    #[tokio::test]
    async fn test_unreachable_fetcher_indexes_nothing() {
        let index = Arc::new(InMemoryCidIndex::new());
        index_blocks(&index, [1, 5]).await;
        let svc = service(index.clone(), Arc::new(MockPayloadFetcher::unreachable()), config(1, 10));

        assert_eq!(svc.fill_gaps().await.unwrap(), 0);
        assert_eq!(index.row_counts()[0], 2 * 2);
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled() {
        let index = Arc::new(InMemoryCidIndex::new());
        let svc = service(index, Arc::new(MockPayloadFetcher::default()), config(1, 10));
        let handle = tokio::spawn(svc.clone().run());

        svc.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
