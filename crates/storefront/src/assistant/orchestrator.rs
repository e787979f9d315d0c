//! Conversational orchestrator.
//!
//! One [`Assistant`] serves one shopping session. A turn runs as:
//!
//! 1. Snapshot catalog and cart, render the prompt
//! 2. Ask the [`TextGenerator`] for a reply
//! 3. Parse the reply into a [`Command`]
//! 4. Execute the command against the [`CartSynchronizer`]
//! 5. Return an [`AssistantTurn`] with the message and UI events
//!
//! Turns are serialized: a second input waits until the current turn is
//! finished. Every failure is turned into a message; `handle_text` never
//! returns an error.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use mercadito_core::{Principal, Product};

use super::command::{Command, ParsedReply, parse_reply};
use super::generator::{ChatTurn, TextGenerator};
use super::prompt::build_prompt;
use super::resolver::{Resolution, match_name, resolve};
use super::speech::{NoSpeech, SpeechError, SpeechIo};
use crate::cart::{CartError, CartSynchronizer, LoadReport, MutationReport};
use crate::catalog::{CatalogService, CatalogSnapshot};
use crate::error::{AssistantError, add_breadcrumb, set_sentry_user};

/// Conversation entries kept in memory.
const HISTORY_LIMIT: usize = 20;

/// Conversation entries sent to the generator as context.
const CONTEXT_TURNS: usize = 10;

/// Reply used when there is nothing better to say.
const NEUTRAL_REPLY: &str = "¿En qué más te puedo ayudar?";

/// Reply to an empty input or an empty generator reply.
const EMPTY_REPLY: &str = "No entendí tu mensaje. ¿Me lo repites?";

/// Something the presentation layer should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Transient acknowledgment.
    Toast(String),
    /// The cart changed; `count` is the new unit total.
    CartUpdated { count: u32 },
    /// Show only this category.
    FilterCategory(String),
    /// Show only this brand.
    FilterBrand(String),
    /// Run a catalog search.
    Search(String),
    /// Open the cart view.
    NavigateToCart,
}

/// Result of one conversational turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantTurn {
    /// Message for the shopper.
    pub message: String,
    /// Command parsed from the generator reply.
    pub command: Command,
    pub events: Vec<UiEvent>,
}

impl AssistantTurn {
    fn reply(message: impl Into<String>, command: Command) -> Self {
        Self {
            message: message.into(),
            command,
            events: Vec::new(),
        }
    }

    fn failure(err: &AssistantError, command: Command) -> Self {
        err.report();
        Self::reply(err.user_message(), command)
    }

    fn with_event(mut self, event: UiEvent) -> Self {
        self.events.push(event);
        self
    }
}

/// Shopping assistant for one session.
pub struct Assistant {
    session_id: Uuid,
    principal: Principal,
    generator: Option<Arc<dyn TextGenerator>>,
    catalog: CatalogService,
    cart: Arc<CartSynchronizer>,
    speech: Arc<dyn SpeechIo>,
    conversation: Mutex<VecDeque<ChatTurn>>,
}

impl Assistant {
    /// Create an assistant without a generator or speech.
    #[must_use]
    pub fn new(principal: Principal, catalog: CatalogService, cart: Arc<CartSynchronizer>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            principal,
            generator: None,
            catalog,
            cart,
            speech: Arc::new(NoSpeech),
            conversation: Mutex::new(VecDeque::new()),
        }
    }

    /// Use a text generator.
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Use a speech backend.
    #[must_use]
    pub fn with_speech(mut self, speech: Arc<dyn SpeechIo>) -> Self {
        self.speech = speech;
        self
    }

    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    #[must_use]
    pub const fn principal(&self) -> &Principal {
        &self.principal
    }

    /// The session's cart.
    #[must_use]
    pub const fn cart(&self) -> &Arc<CartSynchronizer> {
        &self.cart
    }

    #[must_use]
    pub const fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    /// Start the session: load the cart and warm the catalog.
    #[instrument(skip(self), fields(session_id = %self.session_id))]
    pub async fn start(&self) -> LoadReport {
        set_sentry_user(&self.principal);
        let (report, catalog) = tokio::join!(self.cart.load(), self.catalog.snapshot());
        info!(
            products = catalog.products.len(),
            cart_count = report.count,
            "Assistant session started"
        );
        report
    }

    /// Conversation so far, oldest first.
    pub async fn history(&self) -> Vec<ChatTurn> {
        self.conversation.lock().await.iter().cloned().collect()
    }

    /// Forget the conversation. The cart is untouched.
    pub async fn reset_conversation(&self) {
        self.conversation.lock().await.clear();
    }

    /// Handle one typed (or transcribed) message.
    #[instrument(skip(self, text), fields(session_id = %self.session_id))]
    pub async fn handle_text(&self, text: &str) -> AssistantTurn {
        // Held for the whole turn so queued inputs run one at a time.
        let mut conversation = self.conversation.lock().await;

        let text = text.trim();
        if text.is_empty() {
            return AssistantTurn::reply(EMPTY_REPLY, Command::None);
        }

        let Some(generator) = &self.generator else {
            return AssistantTurn::failure(&AssistantError::GeneratorNotConfigured, Command::None);
        };

        let catalog = self.catalog.snapshot().await;
        let cart = self.cart.summary().await;
        let history = conversation
            .iter()
            .skip(conversation.len().saturating_sub(CONTEXT_TURNS))
            .cloned()
            .collect();
        let prompt = build_prompt(&self.principal, &catalog, &cart, history, text);

        let reply = match generator.generate(&prompt).await {
            Ok(reply) => reply,
            Err(e) => return AssistantTurn::failure(&AssistantError::from(e), Command::None),
        };

        remember(&mut conversation, ChatTurn::user(text));
        remember(&mut conversation, ChatTurn::assistant(reply.as_str()));

        let parsed = parse_reply(&reply);
        let turn = self.execute(parsed, &catalog).await;
        info!(
            command = turn.command.kind(),
            events = turn.events.len(),
            "Assistant turn complete"
        );
        turn
    }

    /// Listen once, handle the transcript, and read the answer aloud when
    /// the runtime can.
    #[instrument(skip(self), fields(session_id = %self.session_id))]
    pub async fn handle_voice(&self) -> AssistantTurn {
        let capabilities = self.speech.capabilities();
        if !capabilities.listen {
            return AssistantTurn::failure(&AssistantError::SpeechUnsupported, Command::None);
        }

        let transcript = match self.speech.listen().await {
            Ok(transcript) => transcript,
            Err(SpeechError::Unsupported) => {
                return AssistantTurn::failure(&AssistantError::SpeechUnsupported, Command::None);
            }
            Err(e) => {
                return AssistantTurn::failure(
                    &AssistantError::SpeechFailed(e.to_string()),
                    Command::None,
                );
            }
        };

        let turn = self.handle_text(&transcript).await;

        if capabilities.speak
            && let Err(e) = self.speech.speak(&turn.message).await
        {
            warn!(error = %e, "Failed to read reply aloud");
        }
        turn
    }

    /// Carry out a parsed command.
    async fn execute(&self, parsed: ParsedReply, catalog: &CatalogSnapshot) -> AssistantTurn {
        match &parsed.command {
            Command::None => {
                let message = parsed.prose.clone().unwrap_or_else(|| EMPTY_REPLY.to_string());
                AssistantTurn::reply(message, Command::None)
            }
            Command::AddProduct { name, quantity } => {
                let Some(product) = lookup(catalog, name) else {
                    return not_found(name, parsed.command.clone());
                };
                let result = self.cart.add(product, *quantity).await;
                finish_mutation(parsed, product, result)
            }
            Command::RemoveQty { name, quantity } => {
                let Some(product) = lookup(catalog, name) else {
                    return not_found(name, parsed.command.clone());
                };
                let result = self.remove_qty(product, *quantity).await;
                finish_mutation(parsed, product, result)
            }
            Command::RemoveAll { name } => {
                let Some(product) = lookup(catalog, name) else {
                    return not_found(name, parsed.command.clone());
                };
                let result = self.cart.remove_all(&product.id).await;
                finish_mutation(parsed, product, result)
            }
            Command::SetQty { name, quantity } => {
                let Some(product) = lookup(catalog, name) else {
                    return not_found(name, parsed.command.clone());
                };
                let result = if self.cart.quantity_of(&product.id).await > 0 {
                    self.cart.set_qty(product, *quantity).await
                } else {
                    self.cart.add(product, *quantity).await
                };
                finish_mutation(parsed, product, result)
            }
            Command::ClearCart => match self.cart.clear().await {
                Ok(report) => cart_changed(parsed, &report, None),
                Err(e) => AssistantTurn::failure(
                    &AssistantError::from_cart(&e, ""),
                    parsed.command.clone(),
                ),
            },
            Command::ViewCart => {
                AssistantTurn::reply(parsed.message(), Command::ViewCart)
                    .with_event(UiEvent::NavigateToCart)
            }
            Command::FilterByCategory { name } => match match_name(&catalog.categories, name) {
                Some(category) => AssistantTurn::reply(parsed.message(), parsed.command.clone())
                    .with_event(UiEvent::FilterCategory(category.to_string())),
                None => dropped(&parsed),
            },
            Command::FilterByBrand { name } => match match_name(&catalog.brands, name) {
                Some(brand) => AssistantTurn::reply(parsed.message(), parsed.command.clone())
                    .with_event(UiEvent::FilterBrand(brand.to_string())),
                None => dropped(&parsed),
            },
            Command::Search { term } => match resolve(&catalog.products, term) {
                Resolution::Found(_) => {
                    AssistantTurn::reply(parsed.message(), parsed.command.clone())
                        .with_event(UiEvent::Search(term.clone()))
                }
                Resolution::NotFound => dropped(&parsed),
            },
        }
    }

    /// Decrement a product, removing it when nothing would remain.
    ///
    /// Removing zero units leaves the cart as it is and still succeeds.
    async fn remove_qty(
        &self,
        product: &Product,
        quantity: u32,
    ) -> Result<MutationReport, CartError> {
        let current = self.cart.quantity_of(&product.id).await;
        if current == 0 {
            return Err(CartError::NotInCart(product.id.clone()));
        }

        match current.saturating_sub(quantity) {
            0 => self.cart.remove_all(&product.id).await,
            remaining if remaining == current => Ok(MutationReport {
                degraded: false,
                summary: self.cart.summary().await,
            }),
            remaining => self.cart.set_qty(product, remaining).await,
        }
    }
}

/// Append to the conversation, dropping the oldest entries past the limit.
fn remember(conversation: &mut VecDeque<ChatTurn>, turn: ChatTurn) {
    conversation.push_back(turn);
    while conversation.len() > HISTORY_LIMIT {
        conversation.pop_front();
    }
}

fn finish_mutation(
    parsed: ParsedReply,
    product: &Product,
    result: Result<MutationReport, CartError>,
) -> AssistantTurn {
    match result {
        Ok(report) => cart_changed(parsed, &report, Some(product)),
        Err(e) => AssistantTurn::failure(
            &AssistantError::from_cart(&e, &product.name),
            parsed.command,
        ),
    }
}

fn lookup<'a>(catalog: &'a CatalogSnapshot, name: &str) -> Option<&'a Product> {
    resolve(&catalog.products, name).product()
}

fn not_found(name: &str, command: Command) -> AssistantTurn {
    AssistantTurn::failure(&AssistantError::ProductNotFound(name.to_string()), command)
}

/// A filter or search that matched nothing is dropped without an error.
fn dropped(parsed: &ParsedReply) -> AssistantTurn {
    let message = parsed
        .prose
        .clone()
        .unwrap_or_else(|| NEUTRAL_REPLY.to_string());
    AssistantTurn::reply(message, parsed.command.clone())
}

fn cart_changed(
    parsed: ParsedReply,
    report: &MutationReport,
    product: Option<&Product>,
) -> AssistantTurn {
    let kind = parsed.command.kind();
    match product {
        Some(product) => add_breadcrumb("cart", kind, Some(&[("product_id", product.id.as_str())])),
        None => add_breadcrumb("cart", kind, None),
    }

    let mut message = parsed.message();
    if report.degraded {
        let notice = AssistantError::RemoteCartUnavailable;
        notice.report();
        message = format!("{message}\n{}", notice.user_message());
    }

    let count = report.summary.count;
    AssistantTurn::reply(message, parsed.command)
        .with_event(UiEvent::Toast(format!(
            "Carrito actualizado ({count} artículos)"
        )))
        .with_event(UiEvent::CartUpdated { count })
}
