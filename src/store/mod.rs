//! Lead and vendor persistence.
//!
//! Both backends keep whole JSON documents and guarantee single-document
//! atomicity. Vendor quota writes are compare-and-swap on `Vendor::version`
//! so the quota ledger can retry without holding a lock across a batch.

mod error;
mod fjall_store;
mod keys;
mod locks;
mod memory;
mod query;
mod traits;

pub use error::{Result, StoreError};
pub use fjall_store::FjallStore;
pub(crate) use locks::StripedLocks;
pub use memory::MemoryStore;
pub use query::{
    DEFAULT_PAGE_LIMIT, LeadFilter, LeadQuery, LeadSort, LeadSummary, MAX_PAGE_LIMIT, Page,
    SortField, SortOrder, VendorFilter,
};
pub use traits::{LeadStore, VendorStore};
