//! CLI commands.
//!
//! Every command opens a [`Session`]: the same wiring the assistant uses in
//! any front-end, built from [`StorefrontConfig`].

pub mod cart;
pub mod chat;

use std::sync::Arc;

use thiserror::Error;

use mercadito_storefront::assistant::Assistant;
use mercadito_storefront::backend::{BackendClient, BackendError};
use mercadito_storefront::cart::CartSynchronizer;
use mercadito_storefront::catalog::CatalogService;
use mercadito_storefront::claude::{ClaudeClient, ClaudeError};
use mercadito_storefront::config::StorefrontConfig;
use mercadito_storefront::storage::{FileStorage, StorageError};

/// Errors that stop a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Backend client could not be created.
    #[error("backend client error: {0}")]
    Backend(#[from] BackendError),

    /// Local storage directory is unusable.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Text generator client could not be created.
    #[error("assistant client error: {0}")]
    Claude(#[from] ClaudeError),

    /// Terminal I/O failed.
    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A wired-up shopping session.
pub struct Session {
    assistant: Assistant,
}

impl Session {
    /// Build the session from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a client cannot be built or the storage directory
    /// cannot be created.
    pub fn open(config: &StorefrontConfig) -> Result<Self, CliError> {
        let backend = BackendClient::new(&config.backend)?;
        let storage = Arc::new(FileStorage::open(&config.storage_dir)?);

        let cart = Arc::new(CartSynchronizer::new(
            config.principal.clone(),
            Arc::new(backend.clone()),
            storage,
            config.retry,
        ));
        let catalog = CatalogService::new(Arc::new(backend), config.catalog_ttl);

        let mut assistant = Assistant::new(config.principal.clone(), catalog, cart);
        match &config.claude {
            Some(claude) => {
                assistant = assistant.with_generator(Arc::new(ClaudeClient::new(claude)?));
            }
            None => tracing::warn!("ANTHROPIC_API_KEY not set, assistant replies are disabled"),
        }

        tracing::debug!(
            session_id = %assistant.session_id(),
            mode = %assistant.cart().mode(),
            storage_dir = %config.storage_dir.display(),
            "Session opened"
        );
        Ok(Self { assistant })
    }

    #[must_use]
    pub const fn assistant(&self) -> &Assistant {
        &self.assistant
    }
}
