//! Row types for the site's tables, plus the display rules attached to them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Featured momentum stock (`watchlist_stocks`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistStock {
    pub id: String,
    pub symbol: String,
    pub company_name: String,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub price_change: Option<f64>,
    #[serde(default)]
    pub price_change_percent: Option<f64>,
    pub momentum_score: f64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub volume: Option<i64>,
    pub market_cap: String,
    pub sector: String,
    pub reason: String,
    pub added_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl WatchlistStock {
    pub fn momentum_tier(&self) -> MomentumTier {
        MomentumTier::from_score(self.momentum_score)
    }

    /// Signed change text, e.g. `+1.25 (+0.84%)`
    pub fn change_label(&self) -> String {
        format!(
            "{} ({}%)",
            signed(self.price_change),
            signed(self.price_change_percent)
        )
    }

    pub fn is_gaining(&self) -> bool {
        self.price_change.unwrap_or(0.0) >= 0.0
    }

    /// e.g. `$150.00`
    pub fn price_label(&self) -> String {
        match self.current_price {
            Some(price) => format!("${:.2}", price),
            None => MISSING_VALUE.to_string(),
        }
    }

    /// Volume with thousands separators, e.g. `2,500,000`
    pub fn volume_label(&self) -> String {
        match self.volume {
            Some(volume) => group_thousands(volume),
            None => MISSING_VALUE.to_string(),
        }
    }
}

/// Rendered in place of a value the row doesn't carry
pub const MISSING_VALUE: &str = "--";

fn signed(value: Option<f64>) -> String {
    match value {
        Some(v) if v >= 0.0 => format!("+{:.2}", v),
        Some(v) => format!("{:.2}", v),
        None => MISSING_VALUE.to_string(),
    }
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Whole-number column that may arrive as `null`, an integer or a float (`numeric`)
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(number.and_then(|n| {
        n.as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64))
    }))
}

/// Momentum strength bucket used for badges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MomentumTier {
    High,   // 8 and up
    Medium, // 6 and up
    Low,
}

impl MomentumTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            MomentumTier::High
        } else if score >= 6.0 {
            MomentumTier::Medium
        } else {
            MomentumTier::Low
        }
    }
}

/// Research category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportCategory {
    TechnicalAnalysis,
    FundamentalAnalysis,
    MarketOutlook,
    Strategy,
}

impl ReportCategory {
    pub const ALL: [ReportCategory; 4] = [
        ReportCategory::TechnicalAnalysis,
        ReportCategory::FundamentalAnalysis,
        ReportCategory::MarketOutlook,
        ReportCategory::Strategy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportCategory::TechnicalAnalysis => "technical_analysis",
            ReportCategory::FundamentalAnalysis => "fundamental_analysis",
            ReportCategory::MarketOutlook => "market_outlook",
            ReportCategory::Strategy => "strategy",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReportCategory::TechnicalAnalysis => "Technical Analysis",
            ReportCategory::FundamentalAnalysis => "Fundamental Analysis",
            ReportCategory::MarketOutlook => "Market Outlook",
            ReportCategory::Strategy => "Strategy",
        }
    }

    /// Badge text, e.g. `TECHNICAL ANALYSIS`
    pub fn badge(&self) -> String {
        self.as_str().replace('_', " ").to_uppercase()
    }
}

impl fmt::Display for ReportCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Unknown report category: {}", s))
    }
}

/// Research report (`research_reports`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    pub summary: String,
    #[serde(default)]
    pub content: String,
    pub category: ReportCategory,
    #[serde(default)]
    pub stock_symbols: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub author_name: String,
    pub read_time: i32,
    #[serde(default)]
    pub is_featured: bool,
    pub views: i64,
    pub created_at: Option<DateTime<Utc>>,
}

/// Webinar difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebinarLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl WebinarLevel {
    pub const ALL: [WebinarLevel; 3] = [
        WebinarLevel::Beginner,
        WebinarLevel::Intermediate,
        WebinarLevel::Advanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WebinarLevel::Beginner => "beginner",
            WebinarLevel::Intermediate => "intermediate",
            WebinarLevel::Advanced => "advanced",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WebinarLevel::Beginner => "Beginner",
            WebinarLevel::Intermediate => "Intermediate",
            WebinarLevel::Advanced => "Advanced",
        }
    }
}

impl fmt::Display for WebinarLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebinarLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| format!("Unknown webinar level: {}", s))
    }
}

/// Webinar (`webinars`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webinar {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    pub description: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    pub duration: i32,
    pub level: WebinarLevel,
    #[serde(default)]
    pub topics: Vec<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub is_live: bool,
    pub is_recorded: bool,
    pub views: i64,
    pub created_at: DateTime<Utc>,
}

/// Broadcast state shown on a webinar card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebinarStatus {
    Live,
    Recorded,
    Upcoming,
}

impl Webinar {
    pub fn status(&self) -> WebinarStatus {
        if self.is_live {
            WebinarStatus::Live
        } else if self.is_recorded {
            WebinarStatus::Recorded
        } else {
            WebinarStatus::Upcoming
        }
    }
}

/// Row in a user's personal watchlist (`user_watchlists`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserWatchlistEntry {
    pub id: String,
    pub user_id: String,
    pub stock_symbol: String,
    pub notes: Option<String>,
    pub target_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub added_at: Option<DateTime<Utc>>,
}

/// Insert payload for `user_watchlists`; the backend fills the rest
#[derive(Debug, Clone, Serialize)]
pub struct NewWatchlistEntry {
    pub user_id: String,
    pub stock_symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
}
