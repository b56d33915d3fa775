//! Webinar Service

use super::listing_service::{FilterOption, ListFetcher, Listing, ALL};
use crate::models::{Webinar, WebinarLevel};
use serde_json::{json, Value};

pub const WEBINARS_TABLE: &str = "webinars";
pub const WEBINARS_PAGE_SIZE: usize = 6;

impl Listing for Webinar {
    type Filter = WebinarLevel;

    const TABLE: &'static str = WEBINARS_TABLE;
    const ORDER_COLUMN: &'static str = "created_at";
    const PAGE_SIZE: Option<usize> = Some(WEBINARS_PAGE_SIZE);
    const FILTER_COLUMN: &'static str = "level";

    fn filter_value(filter: &Self::Filter) -> Value {
        json!(filter.as_str())
    }
}

pub type WebinarFetcher = ListFetcher<Webinar>;

/// Level buttons, "all" first
pub fn level_options() -> Vec<FilterOption> {
    std::iter::once(FilterOption { value: ALL, label: "All Levels" })
        .chain(WebinarLevel::ALL.iter().map(|l| FilterOption {
            value: l.as_str(),
            label: l.label(),
        }))
        .collect()
}
