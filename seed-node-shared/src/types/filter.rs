//! The declarative filter a client supplies when subscribing.
//!
//! The matching rules live here so that the live filterer and every
//! retriever implementation share one definition of what "matches" means.
use alloy_primitives::{Address, B256, keccak256};
use serde::{Deserialize, Serialize};

use crate::keys::address_to_key;

/// Returns true when `actual` lies in the requested block range.
///
/// `end <= 0` or `end < start` leaves the range open-ended; `start` is inclusive.
pub fn check_range(start: i64, end: i64, actual: u64) -> bool {
    let actual = i64::try_from(actual).unwrap_or(i64::MAX);
    start <= actual && (end <= 0 || end < start || end >= actual)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeaderFilter {
    pub off: bool,
    /// Only canonical headers; uncles are skipped.
    pub final_only: bool,
}

impl Default for HeaderFilter {
    fn default() -> Self {
        Self {
            off: false,
            final_only: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrxFilter {
    pub off: bool,
    pub src: Vec<Address>,
    pub dst: Vec<Address>,
}

impl TrxFilter {
    /// True when the category is on and narrowed by an address allow-list.
    pub fn is_restricted(&self) -> bool {
        !self.off && !(self.src.is_empty() && self.dst.is_empty())
    }

    /// A transaction matches when its sender or its recipient is wanted.
    pub fn matches(&self, src: &Address, dst: &Address) -> bool {
        if self.src.is_empty() && self.dst.is_empty() {
            return true;
        }
        self.src.contains(src) || self.dst.contains(dst)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReceiptFilter {
    pub off: bool,
    pub topic0s: Vec<B256>,
    pub contracts: Vec<Address>,
}

impl ReceiptFilter {
    pub fn has_allow_list(&self) -> bool {
        !(self.topic0s.is_empty() && self.contracts.is_empty())
    }

    /// Matches the receipt on its own metadata, ignoring its transaction.
    pub fn matches(&self, contract: &Address, topic0s: &[B256]) -> bool {
        let topic_match =
            self.topic0s.is_empty() || topic0s.iter().any(|t| self.topic0s.contains(t));
        let contract_match = self.contracts.is_empty() || self.contracts.contains(contract);
        topic_match && contract_match
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateFilter {
    pub off: bool,
    pub addresses: Vec<Address>,
    pub intermediate_nodes: bool,
}

impl StateFilter {
    /// State trie keys for the wanted addresses.
    pub fn keys(&self) -> Vec<B256> {
        self.addresses.iter().map(address_to_key).collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageFilter {
    pub off: bool,
    pub addresses: Vec<Address>,
    /// Storage trie leaf keys, already hashed.
    pub storage_keys: Vec<B256>,
    pub intermediate_nodes: bool,
}

impl StorageFilter {
    /// State trie keys of the accounts whose storage is wanted.
    pub fn state_keys(&self) -> Vec<B256> {
        self.addresses.iter().map(address_to_key).collect()
    }
}

/// Client-declared specification of which subset of chain data to receive.
///
/// Every allow-list defaults to "match everything" when empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterConfig {
    pub back_fill: bool,
    pub back_fill_only: bool,
    pub start_block: i64,
    pub end_block: i64,
    pub header_filter: HeaderFilter,
    pub trx_filter: TrxFilter,
    pub receipt_filter: ReceiptFilter,
    pub state_filter: StateFilter,
    pub storage_filter: StorageFilter,
}

impl FilterConfig {
    /// Content hash of the serialized filter, used to group identical subscriptions.
    pub fn subscription_type(&self) -> Result<B256, serde_json::Error> {
        let encoded = serde_json::to_vec(self)?;
        Ok(keccak256(encoded))
    }

    pub fn in_range(&self, block_number: u64) -> bool {
        check_range(self.start_block, self.end_block, block_number)
    }

    /// True when the requested range has no upper bound.
    pub fn is_open_ended(&self) -> bool {
        self.end_block <= 0 || self.end_block < self.start_block
    }

    /// Decides whether a receipt is served.
    ///
    /// With the transaction category on, receipts follow their transactions
    /// exactly and the receipt allow-lists are not consulted. With it off, the
    /// receipt allow-lists decide on their own.
    pub fn includes_receipt(&self, tx_selected: bool, contract: &Address, topic0s: &[B256]) -> bool {
        if self.receipt_filter.off {
            return false;
        }
        if !self.trx_filter.off {
            return tx_selected;
        }
        self.receipt_filter.matches(contract, topic0s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range_open_ended() {
        assert!(check_range(5, 0, 5));
        assert!(check_range(5, -1, 1_000_000));
        assert!(!check_range(5, 0, 4));
    }

    #[test]
    fn test_check_range_end_before_start_is_open() {
        assert!(check_range(5, 4, 5));
        assert!(check_range(5, 4, 500));
    }

    #[test]
    fn test_check_range_bounded() {
        assert!(check_range(5, 10, 10));
        assert!(!check_range(5, 10, 11));
        assert!(check_range(5, 5, 5));
        assert!(!check_range(5, 5, 6));
    }

    #[test]
    fn test_default_filter_serves_everything_but_uncles() {
        let filter = FilterConfig::default();
        assert!(!filter.header_filter.off);
        assert!(filter.header_filter.final_only);
        assert!(!filter.trx_filter.is_restricted());
        assert!(filter.includes_receipt(true, &Address::ZERO, &[]));
    }

    #[test]
    fn test_trx_filter_matches_src_or_dst() {
        let a = Address::repeat_byte(0xaa);
        let b = Address::repeat_byte(0xbb);
        let c = Address::repeat_byte(0xcc);
        let filter = TrxFilter {
            off: false,
            src: vec![a],
            dst: vec![b],
        };

        assert!(filter.matches(&a, &c));
        assert!(filter.matches(&c, &b));
        assert!(!filter.matches(&c, &c));
    }

    #[test]
    fn test_receipt_filter_requires_topic_and_contract() {
        let topic = B256::repeat_byte(0x01);
        let contract = Address::repeat_byte(0x02);
        let filter = ReceiptFilter {
            off: false,
            topic0s: vec![topic],
            contracts: vec![contract],
        };

        assert!(filter.matches(&contract, &[B256::ZERO, topic]));
        assert!(!filter.matches(&Address::ZERO, &[topic]));
        assert!(!filter.matches(&contract, &[B256::ZERO]));
    }

    #[test]
    fn test_receipts_follow_narrowed_transactions() {
        let filter = FilterConfig {
            trx_filter: TrxFilter {
                dst: vec![Address::repeat_byte(0xaa)],
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(filter.includes_receipt(true, &Address::ZERO, &[]));
        assert!(!filter.includes_receipt(false, &Address::ZERO, &[]));
    }

    #[test]
    fn test_selected_receipt_ignores_own_allow_list() {
        let filter = FilterConfig {
            receipt_filter: ReceiptFilter {
                topic0s: vec![B256::repeat_byte(0x09)],
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(filter.includes_receipt(true, &Address::ZERO, &[]));
        assert!(!filter.includes_receipt(false, &Address::ZERO, &[]));
    }

    #[test]
    fn test_receipt_allow_list_applies_without_transactions() {
        let topic = B256::repeat_byte(0x09);
        let filter = FilterConfig {
            trx_filter: TrxFilter {
                off: true,
                ..Default::default()
            },
            receipt_filter: ReceiptFilter {
                topic0s: vec![topic],
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(filter.includes_receipt(false, &Address::ZERO, &[topic]));
        assert!(!filter.includes_receipt(false, &Address::ZERO, &[B256::ZERO]));
    }

    #[test]
    fn test_receipt_allow_list_never_widens_selection() {
        let dst = Address::repeat_byte(0xaa);
        let topic = B256::repeat_byte(0x09);
        let narrowed = FilterConfig {
            trx_filter: TrxFilter {
                dst: vec![dst],
                ..Default::default()
            },
            ..Default::default()
        };
        let with_topics = FilterConfig {
            receipt_filter: ReceiptFilter {
                topic0s: vec![topic],
                ..Default::default()
            },
            ..narrowed.clone()
        };

        for tx_selected in [true, false] {
            let without = narrowed.includes_receipt(tx_selected, &Address::ZERO, &[topic]);
            let with = with_topics.includes_receipt(tx_selected, &Address::ZERO, &[topic]);
            assert!(!with || without);
        }
    }

    #[test]
    fn test_receipts_off_serves_none() {
        let filter = FilterConfig {
            receipt_filter: ReceiptFilter {
                off: true,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(!filter.includes_receipt(true, &Address::ZERO, &[]));
    }

    #[test]
    fn test_identical_filters_share_subscription_type() {
        let a = FilterConfig {
            start_block: 10,
            ..Default::default()
        };
        let b = a.clone();
        let c = FilterConfig {
            start_block: 11,
            ..Default::default()
        };

        assert_eq!(a.subscription_type().unwrap(), b.subscription_type().unwrap());
        assert_ne!(a.subscription_type().unwrap(), c.subscription_type().unwrap());
    }

    #[test]
    fn test_deserialize_partial_filter() {
        let json = r#"{
            "backFill": true,
            "startBlock": 100,
            "trxFilter": { "dst": ["0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"] },
            "stateFilter": { "off": true }
        }"#;
        let filter: FilterConfig = serde_json::from_str(json).unwrap();

        assert!(filter.back_fill);
        assert_eq!(filter.start_block, 100);
        assert!(filter.is_open_ended());
        assert_eq!(filter.trx_filter.dst, vec![Address::repeat_byte(0xaa)]);
        assert!(filter.state_filter.off);
        assert!(filter.header_filter.final_only);
    }
}
