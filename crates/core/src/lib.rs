//! Mercadito Core - Shared types library.
//!
//! This crate provides the domain types used across all Mercadito components:
//! - `storefront` - Cart synchronization, catalog and conversational assistant
//! - `cli` - Terminal front-end for the assistant
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Product snapshots, cart lines, prices, principals and type-safe IDs

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
