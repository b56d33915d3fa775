//! Watchlist commands

use super::ListingView;
use crate::models::{MomentumTier, WatchlistStock};
use crate::services::listing_service::ALL;
use crate::services::{AddOutcome, WatchlistService};
use crate::state::AppState;
use crate::view_state::Notice;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct StockCard {
    #[serde(flatten)]
    pub stock: WatchlistStock,
    pub momentum_tier: &'static str,
    pub change_label: String,
    pub price_label: String,
    pub volume_label: String,
    pub gaining: bool,
}

impl From<WatchlistStock> for StockCard {
    fn from(stock: WatchlistStock) -> Self {
        let momentum_tier = match stock.momentum_tier() {
            MomentumTier::High => "high",
            MomentumTier::Medium => "medium",
            MomentumTier::Low => "low",
        };

        Self {
            momentum_tier,
            change_label: stock.change_label(),
            price_label: stock.price_label(),
            volume_label: stock.volume_label(),
            gaining: stock.is_gaining(),
            stock,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AddToWatchlistResponse {
    pub outcome: Option<AddOutcome>,
    pub notice: Notice,
    /// Fragment to put in the address bar (set when sign-in is required)
    pub fragment: String,
}

/// Reload the featured stocks
pub async fn load_watchlist(state: &AppState) -> ListingView<StockCard> {
    state.watchlist.refresh().await;
    get_watchlist(state)
}

pub fn get_watchlist(state: &AppState) -> ListingView<StockCard> {
    ListingView::from_state(state.watchlist.state(), ALL.to_string(), StockCard::from)
}

/// "Add to My List" button
pub async fn add_to_watchlist(state: &AppState, symbol: &str) -> AddToWatchlistResponse {
    let (outcome, notice) = match WatchlistService::add_to_watchlist(state, symbol).await {
        Ok(outcome) => (Some(outcome), outcome.notice()),
        Err(e) => {
            tracing::error!("Error adding to watchlist: {}", e);
            (None, Notice::error("Failed to add to watchlist"))
        }
    };

    AddToWatchlistResponse {
        outcome,
        notice,
        fragment: state.view.fragment(),
    }
}
