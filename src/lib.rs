//! Momentum Site - session, listing and watchlist core
//!
//! Client-side core of the momentum trading site: the auth overlay and
//! signed-in state, the featured watchlist, research and webinar listings,
//! and adding symbols to a personal watchlist, all backed by a hosted
//! backend-as-a-service.

pub mod backend;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod view_state;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use state::AppState;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging. Safe to call more than once.
pub fn init_tracing() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "momentum_site=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("Tracing initialized");
    }
}

/// Build application state from the environment and run the initial page load
pub async fn start() -> Result<AppState> {
    init_tracing();

    tracing::info!("Starting Momentum Site...");

    let config = AppConfig::from_env()?;
    let state = AppState::new(&config).await?;
    state.mount().await;

    tracing::info!("Application state initialized");
    Ok(state)
}
