//! # Cache Module
//!
//! Request fingerprinting and the LRU/TTL idempotency cache that lets an
//! identical request replay a previous outcome without recomputation.

pub mod fingerprint;
pub mod idempotency;

pub use fingerprint::Fingerprint;
pub use idempotency::{CacheStats, IdempotencyCache};
