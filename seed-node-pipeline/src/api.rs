//! Client-facing subscription API.
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use seed_node_shared::types::{FilterConfig, ResponsePayload};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::service::Service;

/// Entry point transports use to open subscriptions on a [`Service`].
#[derive(Clone)]
pub struct SeedNodeApi {
    service: Arc<Service>,
}

impl SeedNodeApi {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }

    /// Opens a subscription for `filter`.
    pub fn stream(&self, filter: FilterConfig) -> Result<PayloadSubscription, ServiceError> {
        let (id, receiver) = self.service.subscribe(filter)?;
        Ok(PayloadSubscription {
            id,
            receiver,
            service: self.service.clone(),
        })
    }
}

/// A stream of payloads for one subscriber.
///
/// Ends when the service has nothing more to send. Dropping it unsubscribes.
pub struct PayloadSubscription {
    id: Uuid,
    receiver: mpsc::Receiver<ResponsePayload>,
    service: Arc<Service>,
}

impl PayloadSubscription {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Stream for PayloadSubscription {
    type Item = ResponsePayload;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for PayloadSubscription {
    fn drop(&mut self) {
        debug!(subscription = %self.id, "Subscription dropped");
        self.service.unsubscribe(&self.id);
    }
}
