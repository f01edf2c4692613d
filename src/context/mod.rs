//! Date-derived context for prompt construction
//!
//! Part-of-day bucketing and the long-form Indonesian date label are pure
//! functions of the supplied time. Holiday lookup is best-effort over an
//! external API with a per-month cache; failures degrade to "no holiday".

pub mod holiday;

pub use holiday::{HolidayClient, HolidayInfo};

use chrono::{DateTime, Datelike, Local, Timelike};

/// Coarse bucket of the local day, used for the Indonesian salutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartOfDay {
    Pagi,
    Siang,
    Sore,
    Malam,
}

impl PartOfDay {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartOfDay::Pagi => "pagi",
            PartOfDay::Siang => "siang",
            PartOfDay::Sore => "sore",
            PartOfDay::Malam => "malam",
        }
    }

    fn from_hour(hour: u32) -> Self {
        match hour {
            4..=10 => PartOfDay::Pagi,
            11..=14 => PartOfDay::Siang,
            15..=18 => PartOfDay::Sore,
            _ => PartOfDay::Malam,
        }
    }
}

impl std::fmt::Display for PartOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-derived inputs to the prompt.
#[derive(Debug, Clone)]
pub struct TimeContext {
    pub part_of_day: PartOfDay,
    pub greeting: String,
    pub date_label: String,
    pub iso_date: String,
}

const WEEKDAYS_ID: [&str; 7] = [
    "Senin", "Selasa", "Rabu", "Kamis", "Jumat", "Sabtu", "Minggu",
];

const MONTHS_ID: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

fn format_date_label(now: DateTime<Local>) -> String {
    let weekday = WEEKDAYS_ID[now.weekday().num_days_from_monday() as usize];
    let month = MONTHS_ID[now.month0() as usize];
    format!("{weekday}, {} {month} {}", now.day(), now.year())
}

/// Build the time context for a given instant. Pure function of `now`.
pub fn time_context(now: DateTime<Local>) -> TimeContext {
    let part_of_day = PartOfDay::from_hour(now.hour());
    TimeContext {
        part_of_day,
        greeting: format!("Selamat {part_of_day}"),
        date_label: format_date_label(now),
        iso_date: now.format("%Y-%m-%d").to_string(),
    }
}
