mod cid_payload;
mod converted_payload;
mod filter;
mod gap;
mod ipld_wrapper;
mod raw_payload;
mod response_payload;

pub use cid_payload::{
    CidPayload, CidWrapper, ReceiptCid, StateNodeCid, StorageNodeCid, StorageNodeWithStateKeyCid,
    TxCid, UncleCid,
};
pub use converted_payload::{ConvertedPayload, ReceiptMetaData, TrieNode, TrxMetaData};
pub use filter::{
    FilterConfig, HeaderFilter, ReceiptFilter, StateFilter, StorageFilter, TrxFilter, check_range,
};
pub use gap::Gap;
pub use ipld_wrapper::{IpldBlock, IpldWrapper};
pub use raw_payload::RawPayload;
pub use response_payload::ResponsePayload;
