//! Mercadito CLI - terminal shopping assistant.
//!
//! # Usage
//!
//! ```bash
//! # Chat with the assistant
//! mercadito chat
//!
//! # One message, one answer
//! mercadito ask "agrega dos cafés"
//!
//! # Inspect or empty the cart
//! mercadito cart show
//! mercadito cart clear
//! ```
//!
//! # Environment Variables
//!
//! - `MERCADITO_BACKEND_URL` - Backend REST API base URL (required)
//! - `MERCADITO_PRINCIPAL` / `MERCADITO_CUSTOMER_TOKEN` - Session identity
//! - `ANTHROPIC_API_KEY` - Enables the assistant's language model
//! - `SENTRY_DSN` - Error tracking (optional)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mercadito_storefront::config::StorefrontConfig;

mod commands;
mod render;

#[derive(Parser)]
#[command(name = "mercadito")]
#[command(author, version, about = "Mercadito shopping assistant")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the shopping assistant
    Chat,
    /// Send a single message to the assistant
    Ask {
        /// Message text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Inspect or change the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the cart
    Show,
    /// Remove every item
    Clear,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mercadito_storefront=info,mercadito_cli=info".into());

    // Logs go to stderr so they never interleave with the conversation.
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Sentry must be initialised before the tracing subscriber.
    let config = StorefrontConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);
    init_tracing();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), commands::CliError> {
    let session = commands::Session::open(&config)?;

    match cli.command {
        Commands::Chat => commands::chat::run(&session).await?,
        Commands::Ask { text } => commands::chat::ask(&session, &text.join(" ")).await?,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&session).await?,
            CartAction::Clear => commands::cart::clear(&session).await?,
        },
    }
    Ok(())
}
