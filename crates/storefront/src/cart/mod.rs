//! Shopping cart: in-memory store, local mirror and synchronization.
//!
//! [`CartSynchronizer`] is the only entry point the rest of the crate uses;
//! it owns a [`CartStore`] and decides, per session, whether the remote cart
//! service or the local [`CartMirror`] is the source of truth.

pub mod mirror;
pub mod retry;
pub mod store;
pub mod sync;

pub use mirror::CartMirror;
pub use retry::{RetryPolicy, Retryable};
pub use store::{CartStore, CartSummary, CartSummaryLine};
pub use sync::{CartError, CartSynchronizer, LoadReport, MutationReport, SyncState};
