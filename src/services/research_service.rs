//! Research Service
//!
//! Latest research reports, optionally narrowed to one category.

use super::listing_service::{FilterOption, ListFetcher, Listing, ALL};
use crate::models::{ReportCategory, ResearchReport};
use serde_json::{json, Value};

pub const REPORTS_TABLE: &str = "research_reports";
pub const REPORTS_PAGE_SIZE: usize = 6;

impl Listing for ResearchReport {
    type Filter = ReportCategory;

    const TABLE: &'static str = REPORTS_TABLE;
    const ORDER_COLUMN: &'static str = "published_at";
    const PAGE_SIZE: Option<usize> = Some(REPORTS_PAGE_SIZE);
    const FILTER_COLUMN: &'static str = "category";

    fn filter_value(filter: &Self::Filter) -> Value {
        json!(filter.as_str())
    }
}

pub type ResearchFetcher = ListFetcher<ResearchReport>;

/// Category buttons, "all" first
pub fn category_options() -> Vec<FilterOption> {
    std::iter::once(FilterOption { value: ALL, label: "All Reports" })
        .chain(ReportCategory::ALL.iter().map(|c| FilterOption {
            value: c.as_str(),
            label: c.label(),
        }))
        .collect()
}
