//! Best-effort Indonesian public holiday lookup
//!
//! Queries api-harilibur per (year, month) and caches the result for the
//! process lifetime, so at most one outbound call is made per calendar month
//! ever queried. Any network or parse failure caches an empty month and
//! resolves to `None` — holiday context is decoration, never a hard error.

use chrono::{DateTime, Datelike, Local};
use dashmap::DashMap;
use serde::Deserialize;

const HOLIDAY_API_ENDPOINT: &str = "https://api-harilibur.vercel.app/api";

/// A holiday matched to a specific calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolidayInfo {
    pub name: String,
    pub is_national: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct HolidayEntry {
    #[serde(default)]
    holiday_date: String,
    #[serde(default)]
    holiday_name: String,
    #[serde(default)]
    is_national_holiday: bool,
}

pub struct HolidayClient {
    client: reqwest::Client,
    endpoint: String,
    month_cache: DashMap<(i32, u32), Vec<HolidayEntry>>,
}

impl Default for HolidayClient {
    fn default() -> Self {
        Self::new(HOLIDAY_API_ENDPOINT)
    }
}

impl HolidayClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            month_cache: DashMap::new(),
        }
    }

    async fn month_holidays(&self, year: i32, month: u32) -> Vec<HolidayEntry> {
        if let Some(cached) = self.month_cache.get(&(year, month)) {
            return cached.clone();
        }

        let entries = match self.fetch_month(year, month).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("failed to fetch holidays for {year}-{month}: {e}");
                Vec::new()
            }
        };

        self.month_cache.insert((year, month), entries.clone());
        entries
    }

    async fn fetch_month(&self, year: i32, month: u32) -> anyhow::Result<Vec<HolidayEntry>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("month", month.to_string()), ("year", year.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("holiday API error: {}", response.status());
        }

        Ok(response.json().await?)
    }

    /// Holiday info for the given day, or `None` (including on any failure).
    pub async fn holiday_for_date(&self, date: DateTime<Local>) -> Option<HolidayInfo> {
        let date_key = date.format("%Y-%m-%d").to_string();
        let holidays = self.month_holidays(date.year(), date.month()).await;

        holidays
            .iter()
            .find(|h| h.holiday_date == date_key)
            .map(|h| HolidayInfo {
                name: h.holiday_name.clone(),
                is_national: h.is_national_holiday,
            })
    }
}
