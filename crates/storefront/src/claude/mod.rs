//! Claude API integration for the shopping assistant.
//!
//! [`ClaudeClient`] implements [`crate::assistant::TextGenerator`] on top of
//! the Anthropic Messages API. Every request carries the rendered system
//! prompt (command grammar, catalog and cart) plus recent conversation turns.

mod client;
mod error;
mod types;

pub use client::ClaudeClient;
pub use error::ClaudeError;
pub use types::{ChatRequest, ChatResponse, ContentBlock, Message, StopReason, Usage};
