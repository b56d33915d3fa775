//! Runtime configuration
//!
//! Read from the process environment. The `VITE_`-prefixed names used by the
//! web build are accepted as fallbacks so one `.env` can serve both.

use crate::error::{AppError, Result};
use std::time::Duration;
use url::Url;

const DEFAULT_OVERLAY_CLOSE_DELAY_MS: u64 = 1000;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Backend and view-state configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the hosted backend (e.g. `https://xyz.supabase.co`)
    pub backend_url: Url,
    /// Public anon key sent with every request
    pub anon_key: String,
    /// Delay between a successful sign-in and the overlay closing
    pub overlay_close_delay: Duration,
    /// Request timeout for the HTTP client
    pub http_timeout: Duration,
}

impl AppConfig {
    pub fn new(backend_url: &str, anon_key: &str) -> Result<Self> {
        let backend_url = Url::parse(backend_url)
            .map_err(|e| AppError::Config(format!("Invalid backend URL '{}': {}", backend_url, e)))?;

        if anon_key.trim().is_empty() {
            return Err(AppError::Config("Anon key is required".to_string()));
        }

        Ok(Self {
            backend_url,
            anon_key: anon_key.to_string(),
            overlay_close_delay: Duration::from_millis(DEFAULT_OVERLAY_CLOSE_DELAY_MS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        })
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|k| lookup(*k).filter(|v| !v.is_empty()));

        let url = first(&["SUPABASE_URL", "VITE_SUPABASE_URL"][..])
            .ok_or_else(|| AppError::Config("SUPABASE_URL is not set".to_string()))?;
        let anon_key = first(&["SUPABASE_ANON_KEY", "VITE_SUPABASE_ANON_KEY"][..])
            .ok_or_else(|| AppError::Config("SUPABASE_ANON_KEY is not set".to_string()))?;

        let mut config = Self::new(&url, &anon_key)?;

        if let Some(ms) = parse_u64(&lookup, "AUTH_OVERLAY_CLOSE_DELAY_MS")? {
            config.overlay_close_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_u64(&lookup, "HTTP_TIMEOUT_SECS")? {
            config.http_timeout = Duration::from_secs(secs);
        }

        tracing::debug!("Loaded config for backend {}", config.backend_url);

        Ok(config)
    }
}

fn parse_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{} must be a non-negative integer, got '{}'", key, raw))),
        None => Ok(None),
    }
}
