//! Webinar commands

use super::ListingView;
use crate::error::{AppError, Result};
use crate::models::{Webinar, WebinarLevel, WebinarStatus};
use crate::services::listing_service::ALL;
use crate::services::{level_options, parse_selection, FilterOption};
use crate::state::AppState;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct WebinarCard {
    #[serde(flatten)]
    pub webinar: Webinar,
    pub status: &'static str,
}

impl From<Webinar> for WebinarCard {
    fn from(webinar: Webinar) -> Self {
        let status = match webinar.status() {
            WebinarStatus::Live => "LIVE",
            WebinarStatus::Recorded => "RECORDED",
            WebinarStatus::Upcoming => "UPCOMING",
        };
        Self { webinar, status }
    }
}

pub fn get_levels() -> Vec<FilterOption> {
    level_options()
}

pub fn get_webinars(state: &AppState) -> ListingView<WebinarCard> {
    let filter = state
        .webinars
        .filter()
        .map(|l| l.as_str())
        .unwrap_or(ALL)
        .to_string();

    ListingView::from_state(state.webinars.state(), filter, WebinarCard::from)
}

/// Level button; `"all"` clears the filter
pub async fn select_level(state: &AppState, selection: &str) -> Result<ListingView<WebinarCard>> {
    let level = parse_selection::<WebinarLevel>(selection).map_err(AppError::Validation)?;

    tracing::info!("Webinar level: {}", selection);
    state.webinars.set_filter(level).await;

    Ok(get_webinars(state))
}
