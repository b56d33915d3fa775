//! Application state management

use crate::backend::supabase::SupabaseBackend;
use crate::backend::{AuthBackend, Backend, TableBackend};
use crate::config::AppConfig;
use crate::error::Result;
use crate::services::{ResearchFetcher, WatchlistFetcher, WebinarFetcher};
use crate::view_state::ViewStateController;
use std::sync::Arc;
use std::time::Duration;

/// Everything a page needs: backend handles, auth view-state and the listings
pub struct AppState {
    /// Row storage half of the backend
    pub tables: Arc<dyn TableBackend>,

    /// Signed-in flag, auth overlay and form actions
    pub view: ViewStateController,

    /// Featured momentum stocks
    pub watchlist: WatchlistFetcher,

    /// Research reports
    pub research: ResearchFetcher,

    /// Webinars
    pub webinars: WebinarFetcher,
}

impl AppState {
    /// Create state against the hosted backend described by `config`
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let backend = Arc::new(SupabaseBackend::new(config)?);

        tracing::info!("Backend: {}", config.backend_url);

        Ok(Self::with_backend(backend, config.overlay_close_delay).await)
    }

    /// Create state over any backend (hosted or in-memory)
    pub async fn with_backend<B>(backend: Arc<B>, overlay_close_delay: Duration) -> Self
    where
        B: Backend + 'static,
    {
        let auth: Arc<dyn AuthBackend> = backend.clone();
        let tables: Arc<dyn TableBackend> = backend;

        let view = ViewStateController::init(auth, overlay_close_delay).await;

        Self {
            watchlist: WatchlistFetcher::new(tables.clone()),
            research: ResearchFetcher::new(tables.clone()),
            webinars: WebinarFetcher::new(tables.clone()),
            tables,
            view,
        }
    }

    /// Initial page load: every listing fetches once, concurrently
    pub async fn mount(&self) {
        tokio::join!(
            self.watchlist.refresh(),
            self.research.refresh(),
            self.webinars.refresh(),
        );
        tracing::info!("Page mounted");
    }

    /// Check if user is authenticated
    pub fn is_authenticated(&self) -> bool {
        self.view.is_authenticated()
    }
}
