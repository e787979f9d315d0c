//! Text generation seam.
//!
//! The orchestrator talks to the language model through [`TextGenerator`] so
//! tests can script replies and the HTTP client stays swappable.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Who said a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl ChatTurn {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Everything the generator needs for one reply.
#[derive(Debug, Clone)]
pub struct AssistantPrompt {
    /// Rendered system prompt with catalog and cart context.
    pub system: String,
    /// Earlier turns, oldest first.
    pub history: Vec<ChatTurn>,
    /// The user's new message.
    pub user: String,
}

/// Failure reported by a text generator.
///
/// Only the message is kept; [`GenerationError::kind`] derives a coarse
/// category from it for display.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct GenerationError {
    message: String,
}

impl GenerationError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Classify the failure for user messaging.
    #[must_use]
    pub fn kind(&self) -> GeneratorErrorKind {
        GeneratorErrorKind::classify(&self.message)
    }
}

/// Coarse generator failure category, used only to pick a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorErrorKind {
    Auth,
    Quota,
    Network,
    Other,
}

const AUTH_MARKERS: &[&str] = &[
    "401",
    "unauthorized",
    "authentication",
    "api key",
    "api_key",
    "x-api-key",
    "permission",
];

const QUOTA_MARKERS: &[&str] = &[
    "429",
    "quota",
    "rate limit",
    "rate_limit",
    "overloaded",
    "billing",
    "credit",
];

const NETWORK_MARKERS: &[&str] = &[
    "network",
    "timed out",
    "timeout",
    "connection",
    "connect",
    "dns",
    "error sending request",
];

impl GeneratorErrorKind {
    /// Classify an error message by substring.
    #[must_use]
    pub fn classify(message: &str) -> Self {
        let message = message.to_lowercase();
        let has_any = |markers: &[&str]| markers.iter().any(|m| message.contains(m));

        if has_any(AUTH_MARKERS) {
            Self::Auth
        } else if has_any(QUOTA_MARKERS) {
            Self::Quota
        } else if has_any(NETWORK_MARKERS) {
            Self::Network
        } else {
            Self::Other
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Quota => "quota",
            Self::Network => "network",
            Self::Other => "other",
        }
    }

    /// Apologetic message shown to the shopper.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::Auth => {
                "Lo siento, no pude autenticarme con el asistente. Avisa al equipo de la tienda."
            }
            Self::Quota => {
                "El asistente está recibiendo demasiadas solicitudes. Intenta de nuevo en unos minutos."
            }
            Self::Network => {
                "No pude comunicarme con el asistente. Revisa tu conexión e inténtalo de nuevo."
            }
            Self::Other => "Lo siento, el asistente no está disponible en este momento.",
        }
    }
}

impl std::fmt::Display for GeneratorErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A language model that turns a prompt into a reply.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a reply.
    async fn generate(&self, prompt: &AssistantPrompt) -> Result<String, GenerationError>;
}
