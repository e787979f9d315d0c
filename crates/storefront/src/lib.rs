//! Mercadito storefront library.
//!
//! Cart synchronization and the conversational shopping assistant, shared by
//! the CLI and the integration tests.
//!
//! # Modules
//!
//! - [`cart`] - In-memory cart, local mirror and the remote/local synchronizer
//! - [`catalog`] - Cached catalog snapshots
//! - [`assistant`] - Command parser, resolver, prompt and orchestrator
//! - [`backend`] - HTTP client for the backend REST API
//! - [`claude`] - Text generator backed by the Anthropic Messages API
//! - [`storage`] - Durable key/value storage for the cart mirror

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod assistant;
pub mod backend;
pub mod cart;
pub mod catalog;
pub mod claude;
pub mod config;
pub mod error;
pub mod storage;
