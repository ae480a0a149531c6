//! fitpro - command-line client for the fitness-course service.
//!
//! Browse the course catalogue, manage the courses on your profile and
//! record workout progress from the terminal.

mod cli;
mod commands;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fitpro_core::api::ApiContext;
use fitpro_core::auth::TokenStore;
use fitpro_core::storage::{FileStore, KeyValueStore, KeyringStore};
use fitpro_core::{Config, PendingCourses, ReqwestTransport, SessionController, TokenBackend};

use cli::{Command, USAGE};

/// File holding the bearer token when the file backend is used
const TOKEN_FILE: &str = "session.json";

/// File holding the queue of course adds the server deferred
const PENDING_FILE: &str = "pending.json";

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes buffered log lines when dropped and must be
/// held until exit.
fn init_tracing() -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

/// Wire the session controller to the configured backend and stores
fn build_session(config: &Config) -> Result<SessionController> {
    let token_store: Arc<dyn KeyValueStore> = match config.token_backend {
        TokenBackend::File => Arc::new(FileStore::new(config.data_dir()?.join(TOKEN_FILE))),
        TokenBackend::Keyring => Arc::new(KeyringStore::new()),
    };
    let pending_store = Arc::new(FileStore::new(config.cache_dir()?.join(PENDING_FILE)));

    let transport = ReqwestTransport::new().context("Failed to create HTTP client")?;
    let base_url = config.api_base_url();
    debug!(%base_url, backend = ?config.token_backend, "Building session");
    let ctx = ApiContext::new(Arc::new(transport), base_url).with_timeout(config.request_timeout());

    Ok(SessionController::new(
        ctx,
        TokenStore::new(token_store),
        PendingCourses::new(pending_store),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });
    let session = build_session(&config)?;
    info!(?command, "fitpro starting");

    if command.needs_session() && !session.restore().await? {
        anyhow::bail!("Not logged in. Run `fitpro login` first.");
    }

    commands::run(command, &session, &mut config).await
}
