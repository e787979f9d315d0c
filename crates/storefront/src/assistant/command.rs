//! Command grammar parser.
//!
//! The generator is told to express cart and filter actions as colon
//! delimited keyword tokens (`AGREGAR:Cafe:2`). This module finds the first
//! such token in a reply and turns it into a [`Command`]. Any prose around
//! the token is kept so it can be shown to the shopper.
//!
//! Keywords are case-sensitive. Rules are tried in a fixed order and the
//! first structural match wins; `ELIMINAR_TODOS` is tried before `ELIMINAR`.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

static ADD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bAGREGAR:([^:\r\n]+):(\S+)").expect("Invalid regex"));
static REMOVE_ALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bELIMINAR_TODOS:([^\r\n]+)").expect("Invalid regex"));
static REMOVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bELIMINAR:([^:\r\n]+):(\S+)").expect("Invalid regex"));
static UPDATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bACTUALIZAR:([^:\r\n]+):(\S+)").expect("Invalid regex"));
static CLEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bVACIAR_CARRITO\b").expect("Invalid regex"));
static VIEW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bVER_CARRITO\b").expect("Invalid regex"));
static CATEGORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bFILTRAR_CATEGORIA:([^\r\n]+)").expect("Invalid regex"));
static BRAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bFILTRAR_MARCA:([^\r\n]+)").expect("Invalid regex"));
static SEARCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bBUSCAR:([^\r\n]+)").expect("Invalid regex"));

/// An action requested by the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AddProduct { name: String, quantity: u32 },
    RemoveQty { name: String, quantity: u32 },
    RemoveAll { name: String },
    SetQty { name: String, quantity: u32 },
    ClearCart,
    ViewCart,
    FilterByCategory { name: String },
    FilterByBrand { name: String },
    Search { term: String },
    /// Plain conversation, nothing to execute.
    None,
}

impl Command {
    /// Short lowercase name, used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AddProduct { .. } => "add_product",
            Self::RemoveQty { .. } => "remove_qty",
            Self::RemoveAll { .. } => "remove_all",
            Self::SetQty { .. } => "set_qty",
            Self::ClearCart => "clear_cart",
            Self::ViewCart => "view_cart",
            Self::FilterByCategory { .. } => "filter_by_category",
            Self::FilterByBrand { .. } => "filter_by_brand",
            Self::Search { .. } => "search",
            Self::None => "none",
        }
    }

    /// Canned confirmation used when the reply carried no prose.
    #[must_use]
    pub fn confirmation(&self) -> String {
        match self {
            Self::AddProduct { name, quantity } => {
                format!("Listo, agregué {quantity} de {name} a tu carrito.")
            }
            Self::RemoveQty { name, quantity } => {
                format!("Listo, quité {quantity} de {name} de tu carrito.")
            }
            Self::RemoveAll { name } => format!("Listo, eliminé {name} de tu carrito."),
            Self::SetQty { name, quantity } => {
                format!("Listo, ahora tienes {quantity} de {name} en tu carrito.")
            }
            Self::ClearCart => "Listo, vacié tu carrito.".to_string(),
            Self::ViewCart => "Aquí está tu carrito.".to_string(),
            Self::FilterByCategory { name } => {
                format!("Te muestro los productos de la categoría {name}.")
            }
            Self::FilterByBrand { name } => format!("Te muestro los productos de la marca {name}."),
            Self::Search { term } => format!("Buscando \"{term}\"."),
            Self::None => String::new(),
        }
    }
}

/// A generator reply split into its command and its prose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    pub command: Command,
    /// Text left after removing the command token, if any remains. For
    /// [`Command::None`] this is the whole reply.
    pub prose: Option<String>,
}

impl ParsedReply {
    fn plain(reply: &str) -> Self {
        let text = reply.trim();
        Self {
            command: Command::None,
            prose: (!text.is_empty()).then(|| text.to_string()),
        }
    }

    /// Message to show: the prose, or the command's canned confirmation.
    #[must_use]
    pub fn message(&self) -> String {
        self.prose
            .clone()
            .unwrap_or_else(|| self.command.confirmation())
    }
}

#[derive(Debug, Clone, Copy)]
enum Rule {
    Add,
    RemoveAll,
    Remove,
    Update,
    Clear,
    View,
    Category,
    Brand,
    Search,
}

const RULES: [Rule; 9] = [
    Rule::Add,
    Rule::RemoveAll,
    Rule::Remove,
    Rule::Update,
    Rule::Clear,
    Rule::View,
    Rule::Category,
    Rule::Brand,
    Rule::Search,
];

impl Rule {
    fn regex(self) -> &'static Regex {
        match self {
            Self::Add => &ADD_RE,
            Self::RemoveAll => &REMOVE_ALL_RE,
            Self::Remove => &REMOVE_RE,
            Self::Update => &UPDATE_RE,
            Self::Clear => &CLEAR_RE,
            Self::View => &VIEW_RE,
            Self::Category => &CATEGORY_RE,
            Self::Brand => &BRAND_RE,
            Self::Search => &SEARCH_RE,
        }
    }

    /// Build the command, or `None` when an argument is unusable.
    fn build(self, caps: &Captures<'_>) -> Option<Command> {
        let name = || caps.get(1).and_then(|m| clean_argument(m.as_str()));
        let quantity = || caps.get(2).and_then(|m| parse_quantity(m.as_str()));

        let command = match self {
            Self::Add => Command::AddProduct {
                name: name()?,
                quantity: quantity()?,
            },
            Self::RemoveAll => Command::RemoveAll { name: name()? },
            Self::Remove => Command::RemoveQty {
                name: name()?,
                quantity: quantity()?,
            },
            Self::Update => Command::SetQty {
                name: name()?,
                quantity: quantity()?,
            },
            Self::Clear => Command::ClearCart,
            Self::View => Command::ViewCart,
            Self::Category => Command::FilterByCategory { name: name()? },
            Self::Brand => Command::FilterByBrand { name: name()? },
            Self::Search => Command::Search { term: name()? },
        };
        Some(command)
    }
}

fn is_wrapper(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '*' | '"' | '\'' | '`' | '.' | ',' | ';' | '!' | '?' | '(' | ')' | '[' | ']'
        )
}

/// Strip markdown emphasis, quotes, brackets and trailing punctuation.
fn clean_argument(raw: &str) -> Option<String> {
    let cleaned = raw.trim_matches(is_wrapper);
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Parse a non-negative integer quantity.
fn parse_quantity(raw: &str) -> Option<u32> {
    raw.trim_matches(is_wrapper).parse().ok()
}

/// Parse a generator reply into a command plus remaining prose.
///
/// A token whose quantity is malformed is ignored and the whole reply is
/// treated as plain text.
#[must_use]
pub fn parse_reply(reply: &str) -> ParsedReply {
    for rule in RULES {
        let Some(caps) = rule.regex().captures(reply) else {
            continue;
        };

        let Some(command) = rule.build(&caps) else {
            debug!(rule = ?rule, "Malformed command token, treating reply as text");
            return ParsedReply::plain(reply);
        };

        let prose = caps.get(0).and_then(|token| {
            let before = reply.get(..token.start()).unwrap_or_default();
            let after = reply.get(token.end()..).unwrap_or_default();
            remaining_prose(before, after)
        });

        debug!(command = command.kind(), has_prose = prose.is_some(), "Parsed command");
        return ParsedReply { command, prose };
    }

    ParsedReply::plain(reply)
}

/// Join the text around a removed token, dropping it if nothing readable is
/// left.
fn remaining_prose(before: &str, after: &str) -> Option<String> {
    let joined = format!("{before}{after}");
    let lines: Vec<&str> = joined
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let prose = lines.join("\n");

    prose
        .chars()
        .any(char::is_alphanumeric)
        .then_some(prose)
}
