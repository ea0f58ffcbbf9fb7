//! # Outbox Module
//!
//! Side effects owed to the downstream provider: the in-memory transactional
//! outbox, the provider contract, and the dispatcher that delivers events
//! and drives compensation.

pub mod dispatcher;
pub mod provider;
pub mod store;

pub use dispatcher::{DispatchReport, OutboxDispatcher};
pub use provider::{DownstreamProvider, ProviderError, ProviderReply};
pub use store::{DeliveryStatus, OutboxEvent, OutboxEventType, TransactionalOutbox};
