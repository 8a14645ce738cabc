use std::collections::HashMap;

use alloy_primitives::B256;
use seed_node_shared::types::{FilterConfig, ResponsePayload};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

/// Subscribers grouped by the content hash of their filter.
///
/// Every group has exactly one filter entry; a group is removed together
/// with its filter as soon as its last member leaves.
#[derive(Default)]
pub(crate) struct SubscriptionGroups {
    groups: HashMap<B256, HashMap<Uuid, mpsc::Sender<ResponsePayload>>>,
    filters: HashMap<B256, FilterConfig>,
}

impl SubscriptionGroups {
    pub fn insert(
        &mut self,
        subscription_type: B256,
        filter: FilterConfig,
        id: Uuid,
        sender: mpsc::Sender<ResponsePayload>,
    ) {
        self.groups
            .entry(subscription_type)
            .or_default()
            .insert(id, sender);
        self.filters.entry(subscription_type).or_insert(filter);
    }

    /// Removes `id` from every group, dropping groups left empty.
    pub fn remove(&mut self, id: &Uuid) -> bool {
        let mut removed = false;
        self.groups.retain(|subscription_type, members| {
            removed |= members.remove(id).is_some();
            if members.is_empty() {
                self.filters.remove(subscription_type);
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.filters.clear();
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.groups.values().map(HashMap::len).sum()
    }

    /// Copies every group's filter and member senders so screening can run
    /// without holding the lock.
    pub fn snapshot(&self) -> Vec<GroupSnapshot> {
        self.groups
            .iter()
            .filter_map(|(subscription_type, members)| {
                let filter = self.filters.get(subscription_type)?.clone();
                let members = members
                    .iter()
                    .map(|(id, sender)| (*id, sender.clone()))
                    .collect();
                Some(GroupSnapshot { filter, members })
            })
            .collect()
    }

    /// Removes every id in `closed`.
    pub fn remove_closed(&mut self, closed: &[Uuid]) {
        for id in closed {
            debug!(subscription = %id, "Subscriber went away, removing");
            self.remove(id);
        }
    }
}

/// One group's filter and senders, detached from [`SubscriptionGroups`].
pub(crate) struct GroupSnapshot {
    filter: FilterConfig,
    members: Vec<(Uuid, mpsc::Sender<ResponsePayload>)>,
}

/// Screens once per group with `screen` and pushes the result to every
/// member without waiting. Returns the members whose receiver is gone.
pub(crate) fn broadcast(
    snapshot: &[GroupSnapshot],
    mut screen: impl FnMut(&FilterConfig) -> ResponsePayload,
) -> Vec<Uuid> {
    let mut closed = Vec::new();
    for group in snapshot {
        let response = screen(&group.filter);
        for (id, sender) in &group.members {
            match sender.try_send(response.clone()) {
                Ok(()) => {
                    debug!(subscription = %id, block = response.block_number, "Sent payload")
                }
                Err(TrySendError::Full(_)) => {
                    warn!(subscription = %id, block = response.block_number, "Subscriber is behind, dropping payload")
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }
    }
    closed
}
