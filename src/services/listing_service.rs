//! Listing Service
//!
//! One filtered, ordered, limited snapshot query, parameterized by row type.
//! Each table the site lists implements [`Listing`]; [`ListFetcher`] holds
//! the rows currently on screen and replaces them wholesale on every load.

use crate::backend::{SelectQuery, SortDirection, TableBackend};
use crate::error::Result;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Selection value meaning "no filter"
pub const ALL: &str = "all";

/// A table the site lists as cards
pub trait Listing: DeserializeOwned + Clone + Send + Sync + 'static {
    /// Equality filter the user can pick (category, level, ...)
    type Filter: Copy + PartialEq + Send + Sync + 'static;

    const TABLE: &'static str;
    const ORDER_COLUMN: &'static str;
    const DIRECTION: SortDirection = SortDirection::Descending;
    const PAGE_SIZE: Option<usize>;

    /// Column compared against the selected filter
    const FILTER_COLUMN: &'static str;

    fn filter_value(filter: &Self::Filter) -> Value;

    /// Filters applied to every query regardless of selection
    fn base_filters() -> Vec<(&'static str, Value)> {
        Vec::new()
    }

    /// Last-line check on rows coming back from the backend
    fn is_visible(&self) -> bool {
        true
    }

    fn query(filter: Option<&Self::Filter>) -> SelectQuery {
        let mut query = SelectQuery::from(Self::TABLE);

        for (column, value) in Self::base_filters() {
            query = query.eq(column, value);
        }

        if let Some(filter) = filter {
            query = query.eq(Self::FILTER_COLUMN, Self::filter_value(filter));
        }

        query = query.order(Self::ORDER_COLUMN, Self::DIRECTION);

        match Self::PAGE_SIZE {
            Some(n) => query.limit(n),
            None => query,
        }
    }
}

/// Parse a filter selection where `"all"` (or empty) means no filter
pub fn parse_selection<F>(selection: &str) -> std::result::Result<Option<F>, F::Err>
where
    F: FromStr,
{
    let selection = selection.trim();
    if selection.is_empty() || selection == ALL {
        Ok(None)
    } else {
        selection.parse().map(Some)
    }
}

/// Filter button shown above a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// Run one snapshot query and decode its rows
pub async fn fetch_snapshot<T: Listing>(
    tables: &dyn TableBackend,
    filter: Option<&T::Filter>,
) -> Result<Vec<T>> {
    let query = T::query(filter);
    let raw = tables.select(&query).await?;

    let mut rows = Vec::with_capacity(raw.len());
    for value in raw {
        match serde_json::from_value::<T>(value) {
            Ok(row) if row.is_visible() => rows.push(row),
            Ok(_) => {}
            Err(e) => warn!("Skipping malformed {} row: {}", T::TABLE, e),
        }
    }

    Ok(rows)
}

/// What a listing currently shows
#[derive(Debug, Clone, PartialEq)]
pub enum ListState<T> {
    Loading,
    /// Terminal state; may be empty
    Ready(Vec<T>),
}

/// Holds one listing's rows and reloads them when the filter changes
pub struct ListFetcher<T: Listing> {
    tables: Arc<dyn TableBackend>,
    state: RwLock<ListState<T>>,
    filter: RwLock<Option<T::Filter>>,
    generation: AtomicU64,
}

impl<T: Listing> ListFetcher<T> {
    pub fn new(tables: Arc<dyn TableBackend>) -> Self {
        Self {
            tables,
            state: RwLock::new(ListState::Loading),
            filter: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> ListState<T> {
        self.state.read().clone()
    }

    pub fn is_loading(&self) -> bool {
        matches!(*self.state.read(), ListState::Loading)
    }

    /// Loaded with zero rows (distinct from still loading)
    pub fn is_empty(&self) -> bool {
        matches!(&*self.state.read(), ListState::Ready(rows) if rows.is_empty())
    }

    pub fn rows(&self) -> Vec<T> {
        match &*self.state.read() {
            ListState::Ready(rows) => rows.clone(),
            ListState::Loading => Vec::new(),
        }
    }

    pub fn filter(&self) -> Option<T::Filter> {
        *self.filter.read()
    }

    /// Change the filter; reloads only when the selection actually changed
    pub async fn set_filter(&self, filter: Option<T::Filter>) -> bool {
        if *self.filter.read() == filter && !self.is_loading() {
            return false;
        }
        *self.filter.write() = filter;
        self.refresh().await;
        true
    }

    /// Reload with the current filter.
    ///
    /// Failures are logged and leave an empty list. If a newer load was
    /// started while this one was in flight, this response is dropped.
    pub async fn refresh(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let filter = self.filter();

        *self.state.write() = ListState::Loading;
        debug!("Loading {} (request #{})", T::TABLE, generation);

        let rows = match fetch_snapshot::<T>(self.tables.as_ref(), filter.as_ref()).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("Error fetching {}: {}", T::TABLE, e);
                Vec::new()
            }
        };

        if self.generation.load(Ordering::Acquire) != generation {
            debug!("Dropping stale {} response (request #{})", T::TABLE, generation);
            return;
        }

        info!("Loaded {} {} row(s)", rows.len(), T::TABLE);
        *self.state.write() = ListState::Ready(rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Item {
        id: u32,
        kind: String,
    }

    impl Listing for Item {
        type Filter = &'static str;
        const TABLE: &'static str = "items";
        const ORDER_COLUMN: &'static str = "id";
        const PAGE_SIZE: Option<usize> = Some(2);
        const FILTER_COLUMN: &'static str = "kind";

        fn filter_value(filter: &Self::Filter) -> Value {
            json!(filter)
        }
    }

    /// Answers each query after a delay that depends on the filter
    struct SlowTables;

    #[async_trait]
    impl TableBackend for SlowTables {
        async fn select(&self, query: &SelectQuery) -> Result<Vec<Value>> {
            let kind = query
                .filters
                .first()
                .and_then(|(_, v)| v.as_str())
                .unwrap_or("none")
                .to_string();
            let delay = if kind == "slow" { 150 } else { 10 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(vec![json!({"id": 1, "kind": kind})])
        }

        async fn insert(&self, _table: &str, _row: Value) -> Result<()> {
            Err(AppError::Internal("read-only".into()))
        }
    }

    #[test]
    fn test_query_shape() {
        let query = Item::query(Some(&"a"));
        assert_eq!(query.table, "items");
        assert_eq!(query.filters, vec![("kind".to_string(), json!("a"))]);
        assert_eq!(query.order, Some(("id".to_string(), SortDirection::Descending)));
        assert_eq!(query.limit, Some(2));

        assert!(Item::query(None).filters.is_empty());
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection::<u8>("all"), Ok(None));
        assert_eq!(parse_selection::<u8>(""), Ok(None));
        assert_eq!(parse_selection::<u8>("7"), Ok(Some(7)));
        assert!(parse_selection::<u8>("x").is_err());
    }

    #[tokio::test]
    async fn test_newest_request_wins() {
        let fetcher = Arc::new(ListFetcher::<Item>::new(Arc::new(SlowTables)));

        let slow = {
            let fetcher = fetcher.clone();
            tokio::spawn(async move { fetcher.set_filter(Some("slow")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        fetcher.set_filter(Some("fast")).await;
        slow.await.unwrap();

        let rows = fetcher.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, "fast");
    }

    #[tokio::test]
    async fn test_malformed_rows_skipped() {
        let tables = crate::backend::memory::InMemoryBackend::new();
        tables.seed("items", vec![json!({"id": 1, "kind": "a"}), json!({"id": "bad"})]);

        let rows = fetch_snapshot::<Item>(&tables, None).await.unwrap();
        assert_eq!(rows, vec![Item { id: 1, kind: "a".into() }]);
    }
}
