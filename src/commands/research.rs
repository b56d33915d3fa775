//! Research commands

use super::ListingView;
use crate::error::{AppError, Result};
use crate::models::{ReportCategory, ResearchReport};
use crate::services::listing_service::ALL;
use crate::services::{category_options, parse_selection, FilterOption};
use crate::state::AppState;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ReportCard {
    #[serde(flatten)]
    pub report: ResearchReport,
    pub category_badge: String,
}

impl From<ResearchReport> for ReportCard {
    fn from(report: ResearchReport) -> Self {
        Self {
            category_badge: report.category.badge(),
            report,
        }
    }
}

pub fn get_categories() -> Vec<FilterOption> {
    category_options()
}

pub fn get_reports(state: &AppState) -> ListingView<ReportCard> {
    let filter = state
        .research
        .filter()
        .map(|c| c.as_str())
        .unwrap_or(ALL)
        .to_string();

    ListingView::from_state(state.research.state(), filter, ReportCard::from)
}

/// Category button; `"all"` clears the filter
pub async fn select_category(state: &AppState, selection: &str) -> Result<ListingView<ReportCard>> {
    let category = parse_selection::<ReportCategory>(selection).map_err(AppError::Validation)?;

    tracing::info!("Research category: {}", selection);
    state.research.set_filter(category).await;

    Ok(get_reports(state))
}
