//! 能力层：getCapabilities 数据结构、代币索引表与带缓存的能力存储

pub mod schema;
pub mod store;

pub use schema::{
    validate, CapabilityEntry, CapabilityTable, GetCapabilitiesResponse, SupportedToken,
    SwapCapability, TokenEntry, TokenUid, DEFAULT_DECIMALS,
};
pub use store::CapabilityStore;
