//! Watchlist Service
//!
//! Featured momentum stocks (read) and the user's personal watchlist (write).

use super::listing_service::{ListFetcher, Listing};
use crate::backend::SortDirection;
use crate::error::{AppError, Result};
use crate::models::{NewWatchlistEntry, WatchlistStock};
use crate::state::AppState;
use crate::view_state::Notice;
use serde::Serialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use tracing::{error, info};

pub const STOCKS_TABLE: &str = "watchlist_stocks";
pub const USER_WATCHLIST_TABLE: &str = "user_watchlists";

impl Listing for WatchlistStock {
    type Filter = Infallible;

    const TABLE: &'static str = STOCKS_TABLE;
    const ORDER_COLUMN: &'static str = "momentum_score";
    const DIRECTION: SortDirection = SortDirection::Descending;
    const PAGE_SIZE: Option<usize> = None;
    const FILTER_COLUMN: &'static str = "";

    fn filter_value(filter: &Self::Filter) -> Value {
        match *filter {}
    }

    fn base_filters() -> Vec<(&'static str, Value)> {
        vec![("is_active", json!(true))]
    }

    fn is_visible(&self) -> bool {
        self.is_active
    }
}

pub type WatchlistFetcher = ListFetcher<WatchlistStock>;

/// Result of "Add to My List"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
    /// Not signed in: the auth overlay was opened instead
    AuthRequired,
}

impl AddOutcome {
    pub fn notice(&self) -> Notice {
        match self {
            AddOutcome::Added => Notice::success("Added to your personal watchlist!"),
            AddOutcome::AlreadyPresent => Notice::info("Stock already in your watchlist"),
            AddOutcome::AuthRequired => Notice::info("Sign in to access your personal watchlist"),
        }
    }
}

/// Watchlist service for business logic
pub struct WatchlistService;

impl WatchlistService {
    /// Add a symbol to the signed-in user's personal watchlist.
    ///
    /// Not signed in: opens the auth overlay and writes nothing.
    /// Duplicate (user, symbol): `AlreadyPresent`. Other failures are returned.
    pub async fn add_to_watchlist(state: &AppState, symbol: &str) -> Result<AddOutcome> {
        let Some(user) = state.view.user() else {
            info!("Add to watchlist while signed out; opening auth overlay");
            state.view.open_overlay();
            return Ok(AddOutcome::AuthRequired);
        };

        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(AppError::Validation("Stock symbol is required".to_string()));
        }

        let entry = NewWatchlistEntry {
            user_id: user.id.clone(),
            stock_symbol: symbol.to_string(),
            notes: None,
            target_price: None,
            stop_loss: None,
        };

        match state
            .tables
            .insert(USER_WATCHLIST_TABLE, serde_json::to_value(&entry)?)
            .await
        {
            Ok(()) => {
                info!("Added {} to watchlist of {}", symbol, user.id);
                Ok(AddOutcome::Added)
            }
            Err(e) if e.is_unique_violation() => {
                info!("{} already in watchlist of {}", symbol, user.id);
                Ok(AddOutcome::AlreadyPresent)
            }
            Err(e) => {
                error!("Error adding {} to watchlist: {}", symbol, e);
                Err(e)
            }
        }
    }
}
