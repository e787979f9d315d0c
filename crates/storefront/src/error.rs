//! Assistant error handling with Sentry integration.
//!
//! Every failure the assistant can hit during a turn is converted into an
//! [`AssistantError`] and then into a message for the shopper. Nothing here
//! ends a session.

use thiserror::Error;

use mercadito_core::Principal;

use crate::assistant::{GenerationError, GeneratorErrorKind};
use crate::cart::CartError;

/// Recoverable failures surfaced to the shopper.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// No catalog product matches the requested name.
    #[error("product not found: {0}")]
    ProductNotFound(String),

    /// The product exists but has no line in the cart.
    #[error("product not in cart: {0}")]
    NotInCart(String),

    /// Quantity below 1 where at least 1 is needed.
    #[error("invalid quantity")]
    InvalidQuantity,

    /// The remote cart could not be reached; the change was kept locally.
    #[error("remote cart unavailable")]
    RemoteCartUnavailable,

    /// The text generator failed.
    #[error("generator unavailable: {0}")]
    GeneratorUnavailable(#[from] GenerationError),

    /// No text generator is configured.
    #[error("generator not configured")]
    GeneratorNotConfigured,

    /// Voice input was requested but the runtime has none.
    #[error("speech unsupported")]
    SpeechUnsupported,

    /// Listening failed or produced no transcript.
    #[error("speech failed: {0}")]
    SpeechFailed(String),
}

impl AssistantError {
    /// Map a cart admission error, naming the product as the shopper knows it.
    #[must_use]
    pub fn from_cart(err: &CartError, product_name: &str) -> Self {
        match err {
            CartError::InvalidQuantity => Self::InvalidQuantity,
            CartError::NotInCart(_) => Self::NotInCart(product_name.to_string()),
        }
    }

    /// Message shown to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::ProductNotFound(name) => {
                format!("No encontré \"{name}\" en el catálogo. ¿Quieres buscar otro producto?")
            }
            Self::NotInCart(name) => format!("{name} no está en tu carrito."),
            Self::InvalidQuantity => "La cantidad debe ser al menos 1.".to_string(),
            Self::RemoteCartUnavailable => {
                "No pude sincronizar con tu cuenta; guardé el cambio en este dispositivo."
                    .to_string()
            }
            Self::GeneratorUnavailable(err) => err.kind().user_message().to_string(),
            Self::GeneratorNotConfigured => GeneratorErrorKind::Other.user_message().to_string(),
            Self::SpeechUnsupported => {
                "El dictado por voz no está disponible aquí. Escribe tu mensaje, por favor."
                    .to_string()
            }
            Self::SpeechFailed(_) => "No pude entenderte. ¿Lo repites o lo escribes?".to_string(),
        }
    }

    /// Log the error, sending service failures to Sentry.
    pub fn report(&self) {
        match self {
            Self::GeneratorUnavailable(err) => {
                let event_id = sentry::capture_error(self);
                tracing::error!(
                    error = %err,
                    kind = %err.kind(),
                    sentry_event_id = %event_id,
                    "Text generator failed"
                );
            }
            Self::RemoteCartUnavailable => {
                tracing::warn!("Cart change kept locally, remote cart unavailable");
            }
            Self::SpeechFailed(reason) => tracing::warn!(%reason, "Voice input failed"),
            _ => tracing::debug!(error = %self, "Assistant turn recovered"),
        }
    }
}

/// Set the Sentry user context from the session principal.
pub fn set_sentry_user(principal: &Principal) {
    sentry::configure_scope(|scope| {
        scope.set_user(principal.user_id().map(|id| sentry::User {
            id: Some(id.to_string()),
            username: principal.display_name().map(String::from),
            ..Default::default()
        }));
        scope.set_tag("principal", principal.kind().as_str());
        scope.set_tag("cart_mode", principal.cart_mode().as_str());
    });
}

/// Add a breadcrumb for shopper actions.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added product", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use mercadito_core::ProductId;

    use super::*;

    #[test]
    fn test_assistant_error_display() {
        let err = AssistantError::ProductNotFound("Soda".to_string());
        assert_eq!(err.to_string(), "product not found: Soda");
    }

    #[test]
    fn test_user_messages() {
        let err = AssistantError::ProductNotFound("Soda".to_string());
        assert!(err.user_message().contains("\"Soda\""));

        let err = AssistantError::from_cart(&CartError::NotInCart(ProductId::new("1")), "Cafe");
        assert_eq!(err.user_message(), "Cafe no está en tu carrito.");

        let err = AssistantError::from(GenerationError::new("rate limited"));
        assert_eq!(
            err.user_message(),
            GeneratorErrorKind::Quota.user_message()
        );
    }

    #[test]
    fn test_report_without_sentry_client() {
        // Without an initialised client Sentry calls are no-ops.
        AssistantError::from(GenerationError::new("boom")).report();
        AssistantError::RemoteCartUnavailable.report();
        add_breadcrumb("cart", "Added product", Some(&[("product_id", "1")]));
    }
}
