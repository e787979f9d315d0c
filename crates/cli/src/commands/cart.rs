//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! mercadito cart show
//! mercadito cart clear
//! ```

use std::io::{self, Write};

use super::{CliError, Session};
use crate::render::{write_cart, write_load_notice};

/// Load and print the cart.
///
/// # Errors
///
/// Returns an error if the terminal cannot be written.
pub async fn show(session: &Session) -> Result<(), CliError> {
    let cart = session.assistant().cart();
    let report = cart.load().await;
    let summary = cart.summary().await;

    let mut out = io::stdout().lock();
    write_load_notice(&mut out, &report)?;
    write_cart(&mut out, &summary)?;
    Ok(())
}

/// Empty the cart.
///
/// # Errors
///
/// Returns an error if the terminal cannot be written.
pub async fn clear(session: &Session) -> Result<(), CliError> {
    let cart = session.assistant().cart();
    cart.load().await;

    let mut out = io::stdout().lock();
    match cart.clear().await {
        Ok(report) if report.degraded => writeln!(
            out,
            "Carrito vaciado en este equipo; no pude sincronizar con tu cuenta."
        )?,
        Ok(_) => writeln!(out, "Carrito vaciado.")?,
        Err(e) => writeln!(out, "No pude vaciar el carrito: {e}")?,
    }
    Ok(())
}
