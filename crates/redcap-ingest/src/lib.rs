//! Record-source and cache seams for the study dashboard.
//!
//! The REDCap transport itself (auth, retries, wire format) lives behind
//! [`RecordSource`]; the browser-storage-style cache lives behind
//! [`CacheStore`]. The derivation core depends on neither medium.

mod cache;
mod error;
mod source;

pub use cache::{
    CacheEntry, CachePolicy, CacheStore, DEFAULT_TTL, FileCacheStore, MemoryCacheStore,
    cached_value, store_value,
};
pub use error::{IngestError, Result};
pub use source::{FetchFilter, JsonFileSource, RecordSource};
