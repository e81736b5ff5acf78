//! CLI for coursefeed
//!
//! Subcommands:
//! - `server`: run the HTTP server with the live feed

use std::sync::Arc;

use clap::Parser;
use coursefeed::config::{load_config, load_config_from};
use coursefeed::feed::FeedBus;
use coursefeed::posts::{FeedService, MemoryPostStore};
use coursefeed::transport::{self, AppState};
use coursefeed::utils::logging;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "coursefeed")]
enum Command {
    /// Start the HTTP server
    Server {
        /// Configuration file to read instead of `config/default`
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cmd = Command::parse();

    match cmd {
        Command::Server { config } => {
            if let Err(e) = run_server(config.as_deref()).await {
                // no-op when the configured subscriber is already installed
                logging::init("info");
                error!("Server failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}

async fn run_server(config_path: Option<&str>) -> coursefeed::Result<()> {
    let config = match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    logging::init(&config.log.level);

    let bus = FeedBus::new(config.feed.capacity);
    let feed = FeedService::new(Arc::new(MemoryPostStore::new()), bus);
    let listener = transport::http::bind(&config.server).await?;

    let shutdown = CancellationToken::new();
    let mut server = tokio::spawn(transport::serve(
        listener,
        AppState::new(feed),
        shutdown.clone(),
    ));

    let outcome = tokio::select! {
        res = &mut server => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
            shutdown.cancel();
            server.await
        }
    };

    outcome.map_err(|e| std::io::Error::other(format!("server task failed: {e}")))?
}
