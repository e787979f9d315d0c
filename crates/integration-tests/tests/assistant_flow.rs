//! Integration tests for full assistant turns.
//!
//! Each test scripts the language model's replies and checks what reaches
//! the shopper and the cart.

use std::sync::Arc;

use mercadito_core::{Price, Principal, ProductId};
use mercadito_integration_tests::{TestContext, customer};
use mercadito_storefront::assistant::{Command, UiEvent};
use mercadito_storefront::storage::MemoryStorage;

fn cafe() -> ProductId {
    ProductId::from("p-cafe")
}

// =============================================================================
// Cart Commands
// =============================================================================

#[tokio::test]
async fn test_add_update_remove_scenario() {
    let ctx = TestContext::new(customer(), Arc::new(MemoryStorage::new()));
    ctx.assistant.start().await;

    ctx.generator.reply("¡Listo! Agregué 5 cafés. AGREGAR:Cafe:5");
    let turn = ctx.assistant.handle_text("quiero cinco cafés").await;
    assert_eq!(
        turn.command,
        Command::AddProduct {
            name: "Cafe".to_string(),
            quantity: 5
        }
    );
    assert!(turn.events.contains(&UiEvent::CartUpdated { count: 5 }));
    let summary = ctx.assistant.cart().summary().await;
    assert_eq!(summary.subtotal, Price::from_cents(5000));
    assert_eq!(ctx.remote.quantity_of(&cafe()), 5);

    ctx.generator.reply("Ahora tienes 3. ACTUALIZAR:Cafe:3");
    ctx.assistant.handle_text("mejor solo tres").await;
    assert_eq!(ctx.assistant.cart().quantity_of(&cafe()).await, 3);
    assert_eq!(ctx.remote.quantity_of(&cafe()), 3);

    ctx.generator.reply("Quité los cafés. ELIMINAR:Cafe:3");
    let turn = ctx.assistant.handle_text("quita los tres").await;
    assert!(turn.events.contains(&UiEvent::CartUpdated { count: 0 }));
    assert!(ctx.assistant.cart().summary().await.is_empty());
    assert_eq!(ctx.remote.quantity_of(&cafe()), 0);
}

#[tokio::test]
async fn test_remove_all_is_not_read_as_partial_remove() {
    let ctx = TestContext::new(customer(), Arc::new(MemoryStorage::new()));
    ctx.assistant.start().await;

    ctx.generator.reply("AGREGAR:Pan Integral:4");
    ctx.assistant.handle_text("cuatro panes").await;

    ctx.generator.reply("Quité todo el pan. ELIMINAR_TODOS:Pan Integral");
    let turn = ctx.assistant.handle_text("ya no quiero pan").await;

    assert_eq!(
        turn.command,
        Command::RemoveAll {
            name: "Pan Integral".to_string()
        }
    );
    assert_eq!(turn.message, "Quité todo el pan.");
    assert_eq!(ctx.assistant.cart().quantity_of(&"p-pan".into()).await, 0);
}

#[tokio::test]
async fn test_unknown_product_leaves_cart_alone() {
    let ctx = TestContext::new(customer(), Arc::new(MemoryStorage::new()));
    ctx.assistant.start().await;
    let calls_after_load = ctx.remote.calls();

    ctx.generator.reply("AGREGAR:Soda:2");
    let turn = ctx.assistant.handle_text("dos sodas").await;

    assert!(turn.message.contains("No encontré \"Soda\""));
    assert!(turn.events.is_empty());
    assert!(ctx.assistant.cart().summary().await.is_empty());
    assert_eq!(ctx.remote.calls(), calls_after_load);
}

#[tokio::test]
async fn test_degraded_mutation_tells_the_shopper() {
    let ctx = TestContext::new(customer(), Arc::new(MemoryStorage::new()));
    ctx.assistant.start().await;
    ctx.remote.set_failing(true);

    ctx.generator.reply("Agregado. AGREGAR:Cafe:2");
    let turn = ctx.assistant.handle_text("dos cafés").await;

    assert!(turn.message.contains("No pude sincronizar con tu cuenta"));
    assert!(turn.events.contains(&UiEvent::CartUpdated { count: 2 }));
    assert_eq!(ctx.assistant.cart().quantity_of(&cafe()).await, 2);
    assert_eq!(ctx.remote.quantity_of(&cafe()), 0);
}

// =============================================================================
// Navigation Commands
// =============================================================================

#[tokio::test]
async fn test_filters_and_cart_view() {
    let ctx = TestContext::new(Principal::anonymous(), Arc::new(MemoryStorage::new()));
    ctx.assistant.start().await;

    ctx.generator.reply("Te muestro los lácteos. FILTRAR_CATEGORIA:lácteos");
    let turn = ctx.assistant.handle_text("lácteos").await;
    assert_eq!(turn.events, vec![UiEvent::FilterCategory("Lácteos".to_string())]);

    ctx.generator.reply("FILTRAR_MARCA:Desconocida");
    let turn = ctx.assistant.handle_text("marca rara").await;
    assert!(turn.events.is_empty());

    ctx.generator.reply("Aquí está tu carrito. VER_CARRITO");
    let turn = ctx.assistant.handle_text("ver carrito").await;
    assert_eq!(turn.events, vec![UiEvent::NavigateToCart]);
    assert_eq!(turn.message, "Aquí está tu carrito.");
}

// =============================================================================
// Conversation
// =============================================================================

#[tokio::test]
async fn test_prompt_carries_catalog_cart_and_history() {
    let ctx = TestContext::new(customer(), Arc::new(MemoryStorage::new()));
    ctx.assistant.start().await;

    ctx.generator.reply("AGREGAR:Cafe:1");
    ctx.assistant.handle_text("un café").await;
    ctx.generator.reply("¡Claro!");
    ctx.assistant.handle_text("gracias").await;

    let prompts = ctx.generator.prompts();
    assert_eq!(prompts.len(), 2);

    let second = &prompts[1];
    assert_eq!(second.user, "gracias");
    assert_eq!(second.history.len(), 2);
    assert!(second.system.contains("- Cafe ($10.00)"));
    assert!(second.system.contains("- 1 x Cafe = $10.00"));
    assert!(second.system.contains("Ana"));
}

#[tokio::test]
async fn test_generator_failure_is_reported_and_not_remembered() {
    let ctx = TestContext::new(customer(), Arc::new(MemoryStorage::new()));
    ctx.assistant.start().await;

    ctx.generator.fail("429 rate limit exceeded");
    let turn = ctx.assistant.handle_text("hola").await;

    assert_eq!(turn.command, Command::None);
    assert!(turn.events.is_empty());
    assert!(ctx.assistant.history().await.is_empty());
}
