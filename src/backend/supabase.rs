//! Supabase adapter
//!
//! GoTrue endpoints for identity and PostgREST endpoints for rows. The
//! session returned by sign-in is kept in process and broadcast through a
//! [`SessionHub`].

use super::{AuthBackend, SelectQuery, Session, SessionCallback, SessionHub, Subscription, TableBackend};
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

/// HTTP client for a hosted Supabase project
pub struct SupabaseBackend {
    client: Client,
    base_url: Url,
    anon_key: String,
    sessions: SessionHub,
}

impl SupabaseBackend {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.backend_url.clone(),
            anon_key: config.anon_key.clone(),
            sessions: SessionHub::new(),
        })
    }

    fn get_headers(&self, access_token: Option<&str>) -> Result<HeaderMap> {
        let bearer = access_token.unwrap_or(&self.anon_key);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("apikey", header_value(&self.anon_key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", bearer))?);
        Ok(headers)
    }

    /// Rows are read with the user's token when signed in so row-level policies apply.
    /// An expired token is refreshed or dropped first; the anon key is the fallback.
    async fn row_headers(&self) -> Result<HeaderMap> {
        let session = self.current_session().await;
        self.get_headers(session.as_ref().map(|s| s.access_token.as_str()))
    }

    /// Exchange a refresh token for a new session and broadcast it
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");

        let response = self
            .client
            .post(url)
            .headers(self.get_headers(None)?)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(auth_error(response).await);
        }

        let session = session_from_token(response.json().await?);
        self.sessions.replace(Some(session.clone()));
        Ok(session)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::Config(format!("Invalid endpoint '{}': {}", path, e)))
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| AppError::Config(format!("Invalid header value: {}", e)))
}

/// Build the PostgREST URL for a snapshot query
pub fn build_select_url(base: &Url, query: &SelectQuery) -> Result<Url> {
    let path = format!("rest/v1/{}", urlencoding::encode(&query.table));
    let mut url = base
        .join(&path)
        .map_err(|e| AppError::Config(format!("Invalid table '{}': {}", query.table, e)))?;

    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("select", "*");

        for (column, value) in &query.filters {
            pairs.append_pair(column, &format!("eq.{}", filter_literal(value)));
        }

        if let Some((column, direction)) = &query.order {
            pairs.append_pair("order", &format!("{}.{}", column, direction.as_str()));
        }

        if let Some(limit) = query.limit {
            pairs.append_pair("limit", &limit.to_string());
        }
    }

    Ok(url)
}

fn filter_literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct AuthErrorBody {
    msg: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestErrorBody {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: super::User,
}

fn session_from_token(token: TokenResponse) -> Session {
    let expires_at = token
        .expires_at
        .or_else(|| token.expires_in.map(|secs| chrono::Utc::now().timestamp() + secs));

    Session {
        user: token.user,
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_at,
    }
}

/// GoTrue error body to an `Auth` error with its message verbatim
fn parse_auth_error(status: StatusCode, text: &str) -> AppError {
    let message = serde_json::from_str::<AuthErrorBody>(text)
        .ok()
        .and_then(|b| b.msg.or(b.error_description).or(b.message).or(b.error))
        .unwrap_or_else(|| format!("Authentication failed ({})", status));

    AppError::Auth(message)
}

/// PostgREST error body to a `Backend` error keeping its code
fn parse_rest_error(status: StatusCode, text: &str) -> AppError {
    match serde_json::from_str::<RestErrorBody>(text) {
        Ok(body) => AppError::backend(
            body.code.as_deref(),
            body.message.unwrap_or_else(|| format!("Request failed ({})", status)),
        ),
        Err(_) => AppError::backend(None, format!("Request failed ({}): {}", status, text)),
    }
}

async fn auth_error(response: Response) -> AppError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    parse_auth_error(status, &text)
}

async fn rest_error(response: Response) -> AppError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    parse_rest_error(status, &text)
}

/// The token is already unusable on these, so the sign-out still stands
fn logout_accepted(status: StatusCode) -> bool {
    status.is_success()
        || matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        )
}

#[async_trait]
impl AuthBackend for SupabaseBackend {
    async fn sign_up(&self, email: &str, password: &str) -> Result<()> {
        tracing::info!("Sign-up request for {}", email);

        let response = self
            .client
            .post(self.endpoint("auth/v1/signup")?)
            .headers(self.get_headers(None)?)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(auth_error(response).await);
        }

        // Any session returned here (auto-confirm projects) is ignored: sign-up never signs in
        Ok(())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<()> {
        tracing::info!("Sign-in attempt for {}", email);

        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .client
            .post(url)
            .headers(self.get_headers(None)?)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(auth_error(response).await);
        }

        let token: TokenResponse = response.json().await?;
        self.sessions.replace(Some(session_from_token(token)));

        tracing::info!("User {} signed in", email);
        Ok(())
    }

    async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.sessions.current() else {
            return Ok(());
        };

        let response = self
            .client
            .post(self.endpoint("auth/v1/logout")?)
            .headers(self.get_headers(Some(&session.access_token))?)
            .send()
            .await;

        // The local session goes away even if the server call fails
        self.sessions.replace(None);

        let response = response?;
        if !logout_accepted(response.status()) {
            return Err(auth_error(response).await);
        }

        tracing::info!("User {} signed out", session.user.id);
        Ok(())
    }

    async fn current_session(&self) -> Option<Session> {
        let session = self.sessions.current()?;

        if !session.is_expired(chrono::Utc::now().timestamp()) {
            return Some(session);
        }

        if let Some(refresh_token) = session.refresh_token.as_deref() {
            match self.refresh_session(refresh_token).await {
                Ok(refreshed) => {
                    tracing::info!("Session for {} refreshed", refreshed.user.id);
                    return Some(refreshed);
                }
                Err(e) => tracing::warn!("Session refresh for {} failed: {}", session.user.id, e),
            }
        }

        tracing::info!("Session for {} expired", session.user.id);
        self.sessions.replace(None);
        None
    }

    fn on_session_change(&self, callback: SessionCallback) -> Subscription {
        self.sessions.subscribe(callback)
    }
}

#[async_trait]
impl TableBackend for SupabaseBackend {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Value>> {
        let url = build_select_url(&self.base_url, query)?;
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .headers(self.row_headers().await?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rest_error(response).await);
        }

        Ok(response.json().await?)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<()> {
        let url = self.endpoint(&format!("rest/v1/{}", urlencoding::encode(table)))?;
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .headers(self.row_headers().await?)
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rest_error(response).await);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SortDirection;

    fn base() -> Url {
        Url::parse("https://demo.supabase.co").unwrap()
    }

    #[test]
    fn test_select_url_with_filter_order_limit() {
        let query = SelectQuery::from("research_reports")
            .eq("category", "strategy")
            .order("published_at", SortDirection::Descending)
            .limit(6);

        let url = build_select_url(&base(), &query).unwrap();
        assert_eq!(
            url.as_str(),
            "https://demo.supabase.co/rest/v1/research_reports?select=*&category=eq.strategy&order=published_at.desc&limit=6"
        );
    }

    #[test]
    fn test_select_url_boolean_filter_without_limit() {
        let query = SelectQuery::from("watchlist_stocks")
            .eq("is_active", true)
            .order("momentum_score", SortDirection::Descending);

        let url = build_select_url(&base(), &query).unwrap();
        assert_eq!(
            url.as_str(),
            "https://demo.supabase.co/rest/v1/watchlist_stocks?select=*&is_active=eq.true&order=momentum_score.desc"
        );
    }

    fn backend() -> SupabaseBackend {
        let config = AppConfig::new("https://demo.supabase.co", "anon-key").unwrap();
        SupabaseBackend::new(&config).unwrap()
    }

    fn session(access_token: &str, expires_at: i64) -> Session {
        Session {
            user: crate::backend::User { id: "u1".into(), email: None },
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: Some(expires_at),
        }
    }

    #[tokio::test]
    async fn test_headers_use_anon_key_without_session() {
        let backend = backend();

        let headers = backend.row_headers().await.unwrap();
        assert_eq!(headers.get("apikey").unwrap(), "anon-key");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer anon-key");
    }

    #[tokio::test]
    async fn test_headers_use_live_session_token() {
        let backend = backend();
        let later = chrono::Utc::now().timestamp() + 3600;
        backend.sessions.replace(Some(session("live-jwt", later)));

        let headers = backend.row_headers().await.unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer live-jwt");
    }

    #[tokio::test]
    async fn test_expired_session_dropped_and_broadcast() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let backend = backend();
        let earlier = chrono::Utc::now().timestamp() - 10;
        backend.sessions.replace(Some(session("expired-jwt", earlier)));

        let cleared = Arc::new(AtomicUsize::new(0));
        let counter = cleared.clone();
        let _sub = backend.on_session_change(Box::new(move |next: Option<Session>| {
            if next.is_none() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        let headers = backend.row_headers().await.unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer anon-key");
        assert_eq!(cleared.load(Ordering::SeqCst), 1);
        assert!(backend.current_session().await.is_none());
    }

    #[test]
    fn test_gotrue_error_bodies() {
        let err = parse_auth_error(
            StatusCode::BAD_REQUEST,
            r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#,
        );
        assert!(matches!(&err, AppError::Auth(m) if m == "Invalid login credentials"));

        let err = parse_auth_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Email not confirmed"}"#,
        );
        assert_eq!(err.user_message(), "Email not confirmed");

        let err = parse_auth_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"code":422,"error_code":"weak_password","msg":"Password should be at least 6 characters."}"#,
        );
        assert_eq!(err.user_message(), "Password should be at least 6 characters.");

        let err = parse_auth_error(StatusCode::BAD_GATEWAY, "upstream timeout");
        assert!(err.user_message().contains("502"));
    }

    #[test]
    fn test_postgrest_error_bodies() {
        let err = parse_rest_error(
            StatusCode::CONFLICT,
            r#"{"code":"23505","details":"Key (user_id, stock_symbol)=(u1, NVDA) already exists.","hint":null,"message":"duplicate key value violates unique constraint \"user_watchlists_user_id_stock_symbol_key\""}"#,
        );
        assert!(err.is_unique_violation());
        assert!(err.user_message().starts_with("duplicate key value"));

        let err = parse_rest_error(
            StatusCode::FORBIDDEN,
            r#"{"code":"42501","details":null,"hint":null,"message":"new row violates row-level security policy for table \"user_watchlists\""}"#,
        );
        assert!(!err.is_unique_violation());
        assert!(matches!(&err, AppError::Backend { code: Some(c), .. } if c == "42501"));

        let err = parse_rest_error(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
        assert!(matches!(err, AppError::Backend { code: None, .. }));
    }

    #[test]
    fn test_logout_statuses() {
        assert!(logout_accepted(StatusCode::NO_CONTENT));
        assert!(logout_accepted(StatusCode::UNAUTHORIZED));
        assert!(logout_accepted(StatusCode::FORBIDDEN));
        assert!(logout_accepted(StatusCode::NOT_FOUND));
        assert!(!logout_accepted(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_sign_out_without_session_is_noop() {
        let config = AppConfig::new("https://demo.supabase.co", "anon-key").unwrap();
        let backend = SupabaseBackend::new(&config).unwrap();

        assert!(backend.sign_out().await.is_ok());
        assert!(backend.current_session().await.is_none());
    }
}
