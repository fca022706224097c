//! Mailsense HTTP server
//!
//! Local API server exposing OAuth sign-in, classified inbox retrieval,
//! conversation grouping, summaries, smart replies, sending, and a
//! subscription scan over HTTP for the frontend.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use clap::Parser;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use mailsense_core::classifier::OpenAiClassifier;
use mailsense_core::config::Config;
use mailsense_core::credentials::create_credential_store;
use mailsense_core::mailbox::GmailMailbox;
use mailsense_core::oauth::OAuthClient;
use mailsense_core::pipeline::RetrievalPipeline;
use mailsense_core::session::SessionManager;
use mailsense_core::subscriptions::SubscriptionScanner;

mod routes;

use routes::AppState;

#[derive(Parser)]
#[command(name = "mailsense-server")]
#[command(about = "Mailsense - OAuth mailbox retrieval and classification server", long_about = None)]
struct Cli {
    /// Port to listen on (overrides the config file)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config first to get the log path
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load config ({}), using defaults", e);
        Config::default()
    });

    init_logging(&config)?;

    info!("Starting Mailsense server v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = config.validate_oauth() {
        warn!("OAuth is not fully configured: {}", e);
        warn!("Sign-in will fail until client_id and client_secret are set");
    }

    let store = create_credential_store(&config);
    let oauth = OAuthClient::new(config.oauth.clone());
    let session = Arc::new(SessionManager::new(store, oauth));

    // Pick up a credential persisted by an earlier run
    if let Err(e) = session.ensure_session().await {
        warn!("Could not load persisted credential: {}", e);
    }
    info!("Session state at startup: {}", session.state().as_str());

    let mailbox = Arc::new(GmailMailbox::new(
        session.clone(),
        config.pipeline.rate_limit_per_second,
        config.pipeline.max_retries,
    ));
    let classifier = Arc::new(OpenAiClassifier::new(config.classifier.clone())?);
    let pipeline = Arc::new(RetrievalPipeline::new(
        mailbox.clone(),
        classifier.clone(),
        config.pipeline.max_in_flight,
    ));
    let scanner = Arc::new(SubscriptionScanner::new(
        mailbox.clone(),
        config.pipeline.max_in_flight,
    ));

    let config = Arc::new(config);
    let state = AppState {
        session,
        mailbox,
        classifier,
        pipeline,
        scanner,
        config: config.clone(),
    };

    let cors_origin = config
        .server
        .frontend_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid frontend origin: {}", config.server.frontend_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://localhost:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Console logging at the configured level plus a daily rolling file at INFO
fn init_logging(config: &Config) -> Result<()> {
    let log_dir = config
        .general
        .log_file
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&log_dir)?;

    let file_name = config
        .general
        .log_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mailsense.log".to_string());
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, file_name);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .with_ansi(false)
        .with_target(false);

    // RUST_LOG wins over the configured level when set
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));
    let console_layer = tracing_subscriber::fmt::layer().with_target(true);

    tracing_subscriber::registry()
        .with(console_layer.with_filter(env_filter))
        .with(file_layer.with_filter(LevelFilter::INFO))
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
