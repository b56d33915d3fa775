//! Backend-as-a-service adapters
//!
//! The site talks to one hosted backend for two things: identity (sessions)
//! and row storage. Both are modelled as traits so the HTTP client and the
//! in-memory double are interchangeable.

pub mod memory;
pub mod session;
pub mod supabase;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use session::{SessionCallback, SessionHub, Subscription};

/// Signed-in user identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Authenticated session issued by the identity service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    /// True once `expires_at` (unix seconds) has passed
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }
}

/// Sort direction for `order`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

/// Snapshot query: `select * from table where col = v ... order by c limit n`
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: String,
    pub filters: Vec<(String, Value)>,
    pub order: Option<(String, SortDirection)>,
    pub limit: Option<usize>,
}

impl SelectQuery {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn order(mut self, column: &str, direction: SortDirection) -> Self {
        self.order = Some((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

/// Identity half of the backend
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Register a new account; does not sign in
    async fn sign_up(&self, email: &str, password: &str) -> Result<()>;

    /// Exchange credentials for a session
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<()>;

    /// Invalidate the current session
    async fn sign_out(&self) -> Result<()>;

    /// One-shot read of the current session
    async fn current_session(&self) -> Option<Session>;

    /// Register for session change notifications until the guard is dropped
    fn on_session_change(&self, callback: SessionCallback) -> Subscription;
}

/// Row storage half of the backend
#[async_trait]
pub trait TableBackend: Send + Sync {
    /// Run a snapshot query and return raw rows
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Value>>;

    /// Insert one row; unique-key violations carry code `23505`
    async fn insert(&self, table: &str, row: Value) -> Result<()>;
}

/// Both halves, as provided by one hosted service
pub trait Backend: AuthBackend + TableBackend {}

impl<T: AuthBackend + TableBackend> Backend for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_builder() {
        let query = SelectQuery::from("research_reports")
            .eq("category", "strategy")
            .order("published_at", SortDirection::Descending)
            .limit(6);

        assert_eq!(query.table, "research_reports");
        assert_eq!(query.filters, vec![("category".to_string(), json!("strategy"))]);
        assert_eq!(
            query.order,
            Some(("published_at".to_string(), SortDirection::Descending))
        );
        assert_eq!(query.limit, Some(6));
    }

    #[test]
    fn test_session_expiry() {
        let session = Session {
            user: User { id: "u1".into(), email: None },
            access_token: "t".into(),
            refresh_token: None,
            expires_at: Some(100),
        };
        assert!(!session.is_expired(99));
        assert!(session.is_expired(100));
    }
}
