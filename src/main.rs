use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod content;
mod error;
mod game;
mod player;
mod session;
mod state;
mod web;

use crate::config::load_settings;
use crate::error::Result as AppResult;
use crate::session::SessionManagerHandle;
use crate::state::AppState;
use crate::web::run_server;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Setup tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=info,tower_http=debug", env!("CARGO_PKG_NAME")).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load Configuration
    let app_settings = Arc::new(load_settings()?);
    tracing::info!("Configuration loaded: {:?}", app_settings);

    // Initialize the session manager
    let session_manager = SessionManagerHandle::spawn(32, Arc::clone(&app_settings));
    tracing::info!("SessionManager initialized.");

    // Create AppState
    let app_state = AppState { session_manager };

    // Run the web server
    run_server(app_state, &app_settings.server).await?;

    Ok(())
}
