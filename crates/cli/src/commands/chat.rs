//! Conversation commands.
//!
//! # Usage
//!
//! ```bash
//! mercadito chat
//! mercadito ask "quiero dos cafés"
//! ```
//!
//! Inside `chat`, lines starting with `/` are handled locally:
//! `/carrito` shows the cart, `/vaciar` empties it, `/salir` exits.

use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};

use mercadito_storefront::assistant::{AssistantTurn, UiEvent};

use super::{CliError, Session};
use crate::render::{write_cart, write_load_notice, write_turn};

/// A line typed at the chat prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Message(&'a str),
    ShowCart,
    ClearCart,
    Help,
    Quit,
    Unknown(&'a str),
    Empty,
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    match line {
        "" => Input::Empty,
        "/carrito" => Input::ShowCart,
        "/vaciar" => Input::ClearCart,
        "/ayuda" => Input::Help,
        "/salir" | "/exit" | "/quit" => Input::Quit,
        _ if line.starts_with('/') => Input::Unknown(line),
        _ => Input::Message(line),
    }
}

const HELP: &str = "Escribe lo que necesitas, por ejemplo \"agrega dos cafés\".\n\
Comandos: /carrito, /vaciar, /ayuda, /salir";

/// Run the interactive chat loop until `/salir` or end of input.
///
/// # Errors
///
/// Returns an error only if the terminal cannot be read or written.
pub async fn run(session: &Session) -> Result<(), CliError> {
    let assistant = session.assistant();
    let report = assistant.start().await;

    {
        let mut out = io::stdout().lock();
        write_load_notice(&mut out, &report)?;
        writeln!(out, "{HELP}")?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        {
            let mut out = io::stdout().lock();
            write!(out, "> ")?;
            out.flush()?;
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_input(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Help => writeln!(io::stdout().lock(), "{HELP}")?,
            Input::Unknown(command) => writeln!(
                io::stdout().lock(),
                "No conozco el comando {command}. Usa /ayuda."
            )?,
            Input::ShowCart => {
                let cart = assistant.cart().summary().await;
                write_cart(&mut io::stdout().lock(), &cart)?;
            }
            Input::ClearCart => {
                let report = assistant.cart().clear().await;
                let mut out = io::stdout().lock();
                match report {
                    Ok(report) => {
                        writeln!(out, "Carrito vaciado.")?;
                        if report.degraded {
                            writeln!(out, "(sin conexión con tu cuenta; se guardó en este equipo)")?;
                        }
                    }
                    Err(e) => writeln!(out, "No pude vaciar el carrito: {e}")?,
                }
            }
            Input::Message(text) => {
                let turn = assistant.handle_text(text).await;
                print_turn(session, &turn).await?;
            }
        }
    }

    writeln!(io::stdout().lock(), "¡Hasta pronto!")?;
    Ok(())
}

/// Send one message and print the answer.
///
/// # Errors
///
/// Returns an error only if the terminal cannot be written.
pub async fn ask(session: &Session, text: &str) -> Result<(), CliError> {
    let assistant = session.assistant();
    assistant.start().await;

    let turn = assistant.handle_text(text).await;
    print_turn(session, &turn).await
}

async fn print_turn(session: &Session, turn: &AssistantTurn) -> Result<(), CliError> {
    // Fetch before locking stdout; the lock is not held across awaits.
    let cart = if turn.events.contains(&UiEvent::NavigateToCart) {
        Some(session.assistant().cart().summary().await)
    } else {
        None
    };

    let mut out = io::stdout().lock();
    write_turn(&mut out, turn)?;
    if let Some(cart) = cart {
        write_cart(&mut out, &cart)?;
    }
    Ok(())
}
