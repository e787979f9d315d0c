//! Conversational shopping assistant.
//!
//! # Architecture
//!
//! - [`command`] parses generator replies into [`Command`]s
//! - [`resolver`] maps typed names onto catalog products
//! - [`generator`] is the language model seam; [`crate::claude`] implements it
//! - [`prompt`] renders the system prompt from catalog and cart
//! - [`speech`] is the optional voice seam
//! - [`orchestrator`] ties a turn together and owns conversation history

pub mod command;
pub mod generator;
pub mod orchestrator;
pub mod prompt;
pub mod resolver;
pub mod speech;

pub use command::{Command, ParsedReply, parse_reply};
pub use generator::{
    AssistantPrompt, ChatTurn, GenerationError, GeneratorErrorKind, Role, TextGenerator,
};
pub use orchestrator::{Assistant, AssistantTurn, UiEvent};
pub use resolver::{Resolution, match_name, resolve};
pub use speech::{NoSpeech, SpeechCapabilities, SpeechError, SpeechIo};
