//! In-memory backend
//!
//! Offline stand-in for the hosted service: accounts with password checks,
//! tables of JSON rows, equality filters, single-column ordering, limits and
//! unique keys. Used by tests and local previews without network access.

use super::{AuthBackend, SelectQuery, Session, SessionCallback, SessionHub, SortDirection, Subscription, TableBackend, User};
use crate::error::{AppError, Result, UNIQUE_VIOLATION};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::time::Duration;

const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    id: String,
    password: String,
}

/// Calls seen by the backend, for asserting what a flow actually issued
#[derive(Debug, Default)]
pub struct CallCounts {
    pub sign_up: AtomicUsize,
    pub sign_in: AtomicUsize,
    pub sign_out: AtomicUsize,
    pub select: AtomicUsize,
    pub insert: AtomicUsize,
}

impl CallCounts {
    pub fn sign_ups(&self) -> usize {
        self.sign_up.load(AtomicOrdering::SeqCst)
    }

    pub fn sign_ins(&self) -> usize {
        self.sign_in.load(AtomicOrdering::SeqCst)
    }

    pub fn selects(&self) -> usize {
        self.select.load(AtomicOrdering::SeqCst)
    }

    pub fn inserts(&self) -> usize {
        self.insert.load(AtomicOrdering::SeqCst)
    }
}

/// In-process implementation of [`AuthBackend`] and [`TableBackend`]
pub struct InMemoryBackend {
    accounts: DashMap<String, Account>,
    tables: RwLock<HashMap<String, Vec<Value>>>,
    unique_keys: RwLock<HashMap<String, Vec<Vec<String>>>>,
    sessions: SessionHub,
    fail_selects: AtomicBool,
    fail_inserts: AtomicBool,
    auth_latency: RwLock<Duration>,
    session_ttl: RwLock<Option<Duration>>,
    pub calls: CallCounts,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            tables: RwLock::new(HashMap::new()),
            unique_keys: RwLock::new(HashMap::new()),
            sessions: SessionHub::new(),
            fail_selects: AtomicBool::new(false),
            fail_inserts: AtomicBool::new(false),
            auth_latency: RwLock::new(Duration::ZERO),
            session_ttl: RwLock::new(None),
            calls: CallCounts::default(),
        }
    }

    /// Backend with the site's tables and constraints registered
    pub fn with_site_schema() -> Self {
        let backend = Self::new();
        for table in ["watchlist_stocks", "research_reports", "webinars", "user_watchlists"] {
            backend.tables.write().entry(table.to_string()).or_default();
        }
        backend.add_unique_key("watchlist_stocks", &["symbol"]);
        backend.add_unique_key("research_reports", &["slug"]);
        backend.add_unique_key("user_watchlists", &["user_id", "stock_symbol"]);
        backend
    }

    pub fn add_unique_key(&self, table: &str, columns: &[&str]) {
        self.unique_keys
            .write()
            .entry(table.to_string())
            .or_default()
            .push(columns.iter().map(|c| c.to_string()).collect());
    }

    /// Load rows directly, bypassing constraints
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables.read().get(table).cloned().unwrap_or_default()
    }

    /// Make every subsequent `select` fail (simulates an outage)
    pub fn set_fail_selects(&self, fail: bool) {
        self.fail_selects.store(fail, AtomicOrdering::SeqCst);
    }

    /// Make every subsequent `insert` fail with a permission error
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, AtomicOrdering::SeqCst);
    }

    /// Delay every sign-up and sign-in by `latency` (simulates a slow network)
    pub fn set_auth_latency(&self, latency: Duration) {
        *self.auth_latency.write() = latency;
    }

    /// Sessions issued from now on expire after `ttl`; `None` never expires
    pub fn set_session_ttl(&self, ttl: Option<Duration>) {
        *self.session_ttl.write() = ttl;
    }

    async fn simulate_latency(&self) {
        let latency = *self.auth_latency.read();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn violates_unique(&self, table: &str, existing: &[Value], row: &Value) -> Option<String> {
        let keys = self.unique_keys.read();
        let constraints = keys.get(table)?;

        constraints.iter().find_map(|columns| {
            let clash = existing
                .iter()
                .any(|other| columns.iter().all(|c| row.get(c).is_some() && row.get(c) == other.get(c)));
            clash.then(|| format!("{}_{}_key", table, columns.join("_")))
        })
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Total order over JSON scalars: null < bool < number < string
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[async_trait]
impl AuthBackend for InMemoryBackend {
    async fn sign_up(&self, email: &str, password: &str) -> Result<()> {
        self.calls.sign_up.fetch_add(1, AtomicOrdering::SeqCst);
        self.simulate_latency().await;

        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Auth(
                "Password should be at least 6 characters.".to_string(),
            ));
        }

        let key = email.trim().to_lowercase();
        if self.accounts.contains_key(&key) {
            return Err(AppError::Auth("User already registered".to_string()));
        }

        self.accounts.insert(
            key,
            Account {
                id: uuid::Uuid::new_v4().to_string(),
                password: password.to_string(),
            },
        );
        Ok(())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<()> {
        self.calls.sign_in.fetch_add(1, AtomicOrdering::SeqCst);
        self.simulate_latency().await;

        let key = email.trim().to_lowercase();
        let user_id = match self.accounts.get(&key) {
            Some(account) if account.password == password => account.id.clone(),
            _ => return Err(AppError::Auth("Invalid login credentials".to_string())),
        };

        let ttl = *self.session_ttl.read();
        let expires_at = ttl.map(|ttl| chrono::Utc::now().timestamp() + ttl.as_secs() as i64);

        self.sessions.replace(Some(Session {
            user: User {
                id: user_id,
                email: Some(key),
            },
            access_token: uuid::Uuid::new_v4().to_string(),
            refresh_token: None,
            expires_at,
        }));
        Ok(())
    }

    async fn sign_out(&self) -> Result<()> {
        self.calls.sign_out.fetch_add(1, AtomicOrdering::SeqCst);
        self.sessions.replace(None);
        Ok(())
    }

    async fn current_session(&self) -> Option<Session> {
        let session = self.sessions.current()?;

        if session.is_expired(chrono::Utc::now().timestamp()) {
            self.sessions.replace(None);
            return None;
        }

        Some(session)
    }

    fn on_session_change(&self, callback: SessionCallback) -> Subscription {
        self.sessions.subscribe(callback)
    }
}

#[async_trait]
impl TableBackend for InMemoryBackend {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Value>> {
        self.calls.select.fetch_add(1, AtomicOrdering::SeqCst);

        if self.fail_selects.load(AtomicOrdering::SeqCst) {
            return Err(AppError::backend(None, "Service unavailable"));
        }

        let tables = self.tables.read();
        let rows = tables.get(&query.table).ok_or_else(|| {
            AppError::backend(
                Some("42P01"),
                format!("relation \"public.{}\" does not exist", query.table),
            )
        })?;

        let mut matched: Vec<Value> = rows
            .iter()
            .filter(|row| query.filters.iter().all(|(col, value)| row.get(col) == Some(value)))
            .cloned()
            .collect();

        if let Some((column, direction)) = &query.order {
            matched.sort_by(|a, b| {
                let ord = compare_values(a.get(column), b.get(column));
                match direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }

        Ok(matched)
    }

    async fn insert(&self, table: &str, mut row: Value) -> Result<()> {
        self.calls.insert.fetch_add(1, AtomicOrdering::SeqCst);

        if self.fail_inserts.load(AtomicOrdering::SeqCst) {
            return Err(AppError::backend(
                Some("42501"),
                format!("new row violates row-level security policy for table \"{}\"", table),
            ));
        }

        let Some(fields) = row.as_object_mut() else {
            return Err(AppError::backend(Some("PGRST102"), "Row must be a JSON object"));
        };
        fields
            .entry("id")
            .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));

        let mut tables = self.tables.write();
        let existing = tables.entry(table.to_string()).or_default();

        if let Some(constraint) = self.violates_unique(table, &existing[..], &row) {
            return Err(AppError::backend(
                Some(UNIQUE_VIOLATION),
                format!("duplicate key value violates unique constraint \"{}\"", constraint),
            ));
        }

        existing.push(row);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_select_filters_orders_and_limits() {
        let backend = InMemoryBackend::new();
        backend.seed(
            "t",
            vec![
                json!({"k": "a", "score": 3}),
                json!({"k": "b", "score": 9.5}),
                json!({"k": "a", "score": 7}),
                json!({"k": "a", "score": 1}),
            ],
        );

        let query = SelectQuery::from("t")
            .eq("k", "a")
            .order("score", SortDirection::Descending)
            .limit(2);

        let rows = backend.select(&query).await.unwrap();
        let scores: Vec<_> = rows.iter().map(|r| r["score"].as_i64().unwrap()).collect();
        assert_eq!(scores, vec![7, 3]);
    }

    #[tokio::test]
    async fn test_unknown_table_is_an_error() {
        let backend = InMemoryBackend::new();
        let err = backend.select(&SelectQuery::from("missing")).await.unwrap_err();
        assert!(matches!(err, AppError::Backend { .. }));
    }

    #[tokio::test]
    async fn test_unique_key_rejects_duplicates() {
        let backend = InMemoryBackend::with_site_schema();
        let row = json!({"user_id": "u1", "stock_symbol": "NVDA"});

        backend.insert("user_watchlists", row.clone()).await.unwrap();
        let err = backend.insert("user_watchlists", row).await.unwrap_err();

        assert!(err.is_unique_violation());
        assert_eq!(backend.rows("user_watchlists").len(), 1);

        backend
            .insert("user_watchlists", json!({"user_id": "u2", "stock_symbol": "NVDA"}))
            .await
            .unwrap();
        assert_eq!(backend.rows("user_watchlists").len(), 2);
    }

    #[tokio::test]
    async fn test_accounts() {
        let backend = InMemoryBackend::new();

        assert!(backend.sign_up("a@example.com", "12345").await.is_err());
        backend.sign_up("a@example.com", "123456").await.unwrap();
        assert!(backend.sign_up("A@example.com", "123456").await.is_err());

        let err = backend.sign_in_with_password("a@example.com", "nope").await.unwrap_err();
        assert_eq!(err.user_message(), "Invalid login credentials");

        backend.sign_in_with_password("a@example.com", "123456").await.unwrap();
        let session = backend.current_session().await.unwrap();
        assert_eq!(session.user.email.as_deref(), Some("a@example.com"));

        backend.sign_out().await.unwrap();
        assert!(backend.current_session().await.is_none());
    }
}
