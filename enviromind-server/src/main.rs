use std::sync::Arc;

use clap::Parser;
use enviromind_core::{
    ChatStore, EnviroConfig, GeminiChatSession, GeminiSessionConfig, PgChatStore,
};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use enviromind_server::http::{self, HttpState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "enviromind.toml")]
    config: String,

    /// Check the database connection and exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience, production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match EnviroConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over service.log_level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    // Connect to DB
    let store = match PgChatStore::connect(&config.database).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            std::process::exit(1);
        }
    };

    if args.health {
        match store.ping().await {
            Ok(()) => println!("✅ PostgreSQL connected"),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }
        store.disconnect().await;
        return Ok(());
    }

    // One chat session for the whole process
    let session = match GeminiChatSession::new(GeminiSessionConfig::from(&config.assistant)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create Gemini chat session");
            store.disconnect().await;
            std::process::exit(1);
        }
    };
    if let Err(e) = session.seed().await {
        tracing::warn!(error = %e, "Seeding the chat session failed; starting with empty history");
    }

    let state = Arc::new(HttpState {
        store: Arc::new(store.clone()),
        assistant: Arc::new(session),
    });

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let result = http::start_http_server(state, &config.http, tx.subscribe()).await;

    store.disconnect().await;

    if let Err(e) = &result {
        tracing::error!("HTTP server error: {}", e);
    }
    result
}
