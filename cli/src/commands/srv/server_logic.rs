//! # termgpt HTTP Server Implementation
//!
//! File: cli/src/commands/srv/server_logic.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This module runs the web terminal for `termgpt srv`:
//! - The terminal page and the JSON session API (see `handlers`)
//! - Port availability checking with automatic fallback
//! - CORS configuration
//! - Graceful shutdown handling
//!
//! ## Architecture
//!
//! 1. Build the Axum router around an `AppState` holding the chat service and
//!    the open sessions
//! 2. Find an available port if the requested one is in use
//! 3. Sweep sessions that went idle in the background
//! 4. Serve until Ctrl+C or SIGTERM
//!
//! ## Examples
//!
//! ```rust
//! let config = ServerConfig::resolve(&args, &cfg.server)?;
//! server_logic::run_server(config, service).await?;
//! ```
//!
use super::config::ServerConfig;
use super::handlers;
use super::state::AppState;
use crate::core::error::{RelayError, Result};
use crate::core::service::ChatService;
use anyhow::{anyhow, Context};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};

const MAX_PORT_ATTEMPTS: u8 = 10;
const MIN_SWEEP_PERIOD: Duration = Duration::from_secs(1);

/// Serves the web terminal until a shutdown signal arrives.
pub async fn run_server(config: ServerConfig, service: ChatService) -> Result<()> {
    let addr = find_available_port(config.host, config.port, MAX_PORT_ATTEMPTS).await?;
    let default_persona = service.registry().default_id().to_string();
    let state = AppState::new(service)?;
    let sweeper = state.spawn_session_sweeper(
        config.session_idle,
        (config.session_idle / 4).max(MIN_SWEEP_PERIOD),
    );
    let app = create_app(state, config.enable_cors);

    println!("\n=================================================================");
    println!("🤖 termgpt web terminal");
    println!("🌐 Local URL:          http://localhost:{}", addr.port());
    println!("⚙️  Binding to address: {}", addr);
    println!("🎭 Default persona:    {}", default_persona);
    println!("🔒 CORS enabled:       {}", config.enable_cors);
    println!("⏳ Session idle limit: {}s", config.session_idle.as_secs());
    println!("=================================================================\n");

    info!("Starting web terminal on {}", addr);
    println!("Server starting! Press Ctrl+C to stop.");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind TCP listener to address {}", addr))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    sweeper.abort();

    println!("\nServer shutdown complete.");
    Ok(())
}

/// Resolves when Ctrl+C or (on Unix) SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown..."),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
                info!("Received SIGTERM, initiating graceful shutdown...");
            }
            Err(e) => {
                error!(
                    "Failed to install SIGTERM handler: {}. Shutdown on SIGTERM might not work.",
                    e
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Tries `start_port` and the following ports until one can be bound.
async fn find_available_port(
    req_host: IpAddr,
    start_port: u16,
    max_attempts: u8,
) -> Result<SocketAddr> {
    let mut current_port = start_port;

    for attempt in 0..max_attempts {
        let addr = SocketAddr::new(req_host, current_port);
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                drop(listener);
                if attempt > 0 {
                    info!(
                        "Port {} was unavailable, successfully bound to available port {}.",
                        start_port, current_port
                    );
                }
                return Ok(addr);
            }
            Err(e) => {
                warn!(
                    "Attempt {}: Port {} on host {} is unavailable (Error: {}). Trying next port...",
                    attempt + 1,
                    current_port,
                    req_host,
                    e
                );
                current_port = match current_port.checked_add(1) {
                    Some(next) => next,
                    None => break,
                };
            }
        }
    }

    Err(anyhow!(RelayError::Server(format!(
        "Could not find an available port on host {} starting from port {} after trying {} ports.",
        req_host, start_port, max_attempts
    ))))
}

/// Builds the router: page, session API, tracing and CORS layers.
pub fn create_app(state: AppState, enable_cors: bool) -> Router {
    let cors_layer = if enable_cors {
        info!("CORS middleware enabled (permissive).");
        CorsLayer::permissive()
    } else {
        info!("CORS middleware disabled.");
        CorsLayer::new()
    };

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::default().include_headers(false))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/", get(handlers::index))
        .route("/api/personas", get(handlers::list_personas))
        .route("/api/sessions", post(handlers::create_session))
        .route(
            "/api/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/api/sessions/{id}/persona", put(handlers::set_persona))
        .route("/api/sessions/{id}/messages", post(handlers::post_message))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(trace_layer)
                .layer(cors_layer),
        )
}
