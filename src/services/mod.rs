//! Services Layer
//!
//! Read and write logic over the backend, called by the commands layer.
//!
//! # Services
//!
//! - `listing_service` - Generic filtered/ordered/limited snapshot query
//! - `WatchlistService` - Featured stocks, add to personal watchlist
//! - `research_service` - Research reports by category
//! - `webinar_service` - Webinars by level

pub mod listing_service;
pub mod watchlist_service;
pub mod research_service;
pub mod webinar_service;

pub use listing_service::{fetch_snapshot, parse_selection, FilterOption, ListFetcher, ListState, Listing};
pub use watchlist_service::{AddOutcome, WatchlistFetcher, WatchlistService};
pub use research_service::{category_options, ResearchFetcher};
pub use webinar_service::{level_options, WebinarFetcher};
