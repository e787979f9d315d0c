//! Terminal rendering of assistant output.

use std::io::{self, Write};

use mercadito_core::CartMode;
use mercadito_storefront::assistant::{AssistantTurn, UiEvent};
use mercadito_storefront::cart::{CartSummary, LoadReport};

/// Print a cart as a small table.
pub fn write_cart(out: &mut impl Write, cart: &CartSummary) -> io::Result<()> {
    if cart.is_empty() {
        return writeln!(out, "Tu carrito está vacío.");
    }

    writeln!(out, "Tu carrito:")?;
    for line in &cart.lines {
        writeln!(
            out,
            "  {:>3} x {:<30} {:>10}",
            line.quantity, line.name, line.line_total
        )?;
    }
    writeln!(out, "  Artículos: {}  Subtotal: {}", cart.count, cart.subtotal)
}

/// Print the assistant's message followed by its UI events.
pub fn write_turn(out: &mut impl Write, turn: &AssistantTurn) -> io::Result<()> {
    writeln!(out, "{}", turn.message)?;

    for event in &turn.events {
        match event {
            UiEvent::Toast(text) => writeln!(out, "  · {text}")?,
            UiEvent::FilterCategory(name) => writeln!(out, "  [filtro de categoría: {name}]")?,
            UiEvent::FilterBrand(name) => writeln!(out, "  [filtro de marca: {name}]")?,
            UiEvent::Search(term) => writeln!(out, "  [búsqueda: {term}]")?,
            // The count is already in the toast; the cart view is printed by
            // the caller, which owns the synchronizer.
            UiEvent::CartUpdated { .. } | UiEvent::NavigateToCart => {}
        }
    }
    Ok(())
}

/// Print how the cart was loaded.
pub fn write_load_notice(out: &mut impl Write, report: &LoadReport) -> io::Result<()> {
    match (report.mode, report.degraded) {
        (CartMode::Remote, true) => writeln!(
            out,
            "No pude cargar tu carrito en línea; usando la copia guardada en este equipo."
        ),
        (CartMode::Remote, false) => writeln!(out, "Carrito sincronizado con tu cuenta."),
        (CartMode::Local, _) => writeln!(out, "Carrito guardado en este equipo."),
    }
}
