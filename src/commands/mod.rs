//! UI action commands
//!
//! The call sites the page invokes. Each one runs a controller or service
//! operation and turns backend failures into something renderable. Only
//! malformed input (an unknown filter selection) comes back as an error.

pub mod auth;
pub mod watchlist;
pub mod research;
pub mod webinars;

use crate::services::ListState;
use serde::Serialize;

/// Listing snapshot for rendering: loading, empty and populated are distinct
#[derive(Debug, Clone, Serialize)]
pub struct ListingView<T> {
    pub loading: bool,
    pub empty: bool,
    pub filter: String,
    pub items: Vec<T>,
}

impl<T> ListingView<T> {
    pub(crate) fn from_state<R, F>(state: ListState<R>, filter: String, map: F) -> Self
    where
        F: Fn(R) -> T,
    {
        match state {
            ListState::Loading => Self {
                loading: true,
                empty: false,
                filter,
                items: Vec::new(),
            },
            ListState::Ready(rows) => Self {
                loading: false,
                empty: rows.is_empty(),
                filter,
                items: rows.into_iter().map(map).collect(),
            },
        }
    }
}
