//! System prompt rendering.

use askama::Template;
use tracing::warn;

use mercadito_core::{Principal, Product};

use super::generator::{AssistantPrompt, ChatTurn};
use crate::cart::CartSummary;
use crate::catalog::CatalogSnapshot;

/// Name used when the principal has none.
const DEFAULT_SHOPPER: &str = "un cliente";

/// Used only if the template fails to render.
const FALLBACK_PROMPT: &str = "Eres el asistente de compras de Mercadito. Responde en español. \
Para modificar el carrito escribe AGREGAR:<producto>:<cantidad>, ELIMINAR:<producto>:<cantidad>, \
ELIMINAR_TODOS:<producto>, ACTUALIZAR:<producto>:<cantidad>, VACIAR_CARRITO o VER_CARRITO.";

/// System prompt template for the shopping assistant.
#[derive(Template)]
#[template(path = "assistant/system_prompt.txt")]
struct SystemPromptTemplate<'a> {
    shopper: &'a str,
    products: &'a [Product],
    categories: &'a [String],
    brands: &'a [String],
    cart: &'a CartSummary,
}

/// Render the system prompt with catalog and cart context.
#[must_use]
pub fn render_system_prompt(
    principal: &Principal,
    catalog: &CatalogSnapshot,
    cart: &CartSummary,
) -> String {
    let template = SystemPromptTemplate {
        shopper: principal.display_name().unwrap_or(DEFAULT_SHOPPER),
        products: &catalog.products,
        categories: &catalog.categories,
        brands: &catalog.brands,
        cart,
    };

    template.render().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to render system prompt, using fallback");
        FALLBACK_PROMPT.to_string()
    })
}

/// Assemble the full prompt for one turn.
#[must_use]
pub fn build_prompt(
    principal: &Principal,
    catalog: &CatalogSnapshot,
    cart: &CartSummary,
    history: Vec<ChatTurn>,
    user: &str,
) -> AssistantPrompt {
    AssistantPrompt {
        system: render_system_prompt(principal, catalog, cart),
        history,
        user: user.to_string(),
    }
}
