// src/formatter.rs
//! Pure formatting helpers for attendance display and export.
//!
//! Durations are rendered as `H:MM` (hours unpadded, minutes zero-padded), dates as
//! `DD/MM/YYYY`. Nothing in here performs I/O or keeps state.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

use crate::model::Attendance;

/// Excel refuses sheet names longer than this.
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Italian fixed-date national holidays, as (month, day).
static FIXED_FESTIVI: Lazy<HashSet<(u32, u32)>> = Lazy::new(|| {
    [
        (1, 1),   // Capodanno
        (1, 6),   // Epifania
        (4, 25),  // Liberazione
        (5, 1),   // Festa dei lavoratori
        (6, 2),   // Festa della Repubblica
        (8, 15),  // Ferragosto
        (11, 1),  // Ognissanti
        (12, 8),  // Immacolata
        (12, 25), // Natale
        (12, 26), // Santo Stefano
    ]
    .into_iter()
    .collect()
});

static INVALID_SHEET_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\[\]:*?/\\]").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Static set of non-working calendar days, repeated every year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolidayCalendar {
    fixed: HashSet<(u32, u32)>,
}

impl Default for HolidayCalendar {
    fn default() -> Self {
        Self {
            fixed: FIXED_FESTIVI.clone(),
        }
    }
}

impl HolidayCalendar {
    /// A calendar with weekends only.
    pub fn empty() -> Self {
        Self {
            fixed: HashSet::new(),
        }
    }

    /// Adds holidays from a comma separated `DD-MM` list, e.g. `"19-03,29-06"`.
    pub fn with_extra_holidays(mut self, list: &str) -> Result<Self, String> {
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            // Leap year so that 29-02 is accepted
            let date = NaiveDate::parse_from_str(&format!("{}-2024", item), "%d-%m-%Y")
                .map_err(|e| format!("invalid holiday '{}' (expected DD-MM): {}", item, e))?;
            self.fixed.insert((date.month(), date.day()));
        }
        Ok(self)
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.fixed.contains(&(date.month(), date.day()))
    }

    pub fn len(&self) -> usize {
        self.fixed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixed.is_empty()
    }
}

/// One flat spreadsheet row per attendance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSheetRow {
    #[serde(rename = "Data")]
    pub date: String,
    #[serde(rename = "Entrata")]
    pub check_in: String,
    #[serde(rename = "Uscita")]
    pub check_out: String,
    #[serde(rename = "Ore lavorate")]
    pub worked_hours: String,
    #[serde(rename = "Ore decimali")]
    pub worked_hours_decimal: Decimal,
    #[serde(rename = "Weekend/Festivo")]
    pub weekend_or_festivo: bool,
}

impl AttendanceSheetRow {
    pub const HEADERS: [&'static str; 6] = [
        "Data",
        "Entrata",
        "Uscita",
        "Ore lavorate",
        "Ore decimali",
        "Weekend/Festivo",
    ];
}

pub fn format_duration(duration: Duration) -> String {
    let minutes = duration.num_minutes().max(0);
    format!("{}:{:02}", minutes / 60, minutes % 60)
}

pub fn duration_as_decimal_hours(duration: Duration) -> Decimal {
    let minutes = Decimal::from(duration.num_minutes().max(0));
    (minutes / dec!(60)).round_dp(2)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

pub fn format_time(timestamp: DateTime<Utc>, offset: &FixedOffset) -> String {
    timestamp.with_timezone(offset).format("%H:%M").to_string()
}

/// Calendar date of an instant as seen in `offset`.
pub fn local_date(timestamp: DateTime<Utc>, offset: &FixedOffset) -> NaiveDate {
    timestamp.with_timezone(offset).date_naive()
}

/// Elapsed time between two instants. A checkout before the checkin counts as zero.
pub fn difference(end: DateTime<Utc>, start: DateTime<Utc>) -> Duration {
    let elapsed = end - start;
    if elapsed < Duration::zero() {
        warn!(
            "Checkout {} precedes checkin {}, counting zero worked time",
            end, start
        );
        return Duration::zero();
    }
    elapsed
}

pub fn format_difference_hours(end: DateTime<Utc>, start: DateTime<Utc>) -> String {
    format_duration(difference(end, start))
}

/// Worked time of one attendance; zero while still checked in.
pub fn worked_duration(attendance: &Attendance) -> Duration {
    match attendance.check_out {
        Some(check_out) => difference(check_out, attendance.check_in),
        None => Duration::zero(),
    }
}

pub fn format_is_weekend_or_festivo(date: NaiveDate, calendar: &HolidayCalendar) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun) || calendar.is_holiday(date)
}

pub fn total_worked(attendances: &[Attendance]) -> Duration {
    attendances
        .iter()
        .map(worked_duration)
        .fold(Duration::zero(), |acc, d| acc + d)
}

pub fn format_total_worked_hours(attendances: &[Attendance]) -> String {
    format_duration(total_worked(attendances))
}

/// `"Name Surname"`, stripped of characters Excel rejects in sheet names.
pub fn format_full_name_excel_sheet(name: &str, surname: &str) -> String {
    let joined = format!("{} {}", name, surname);
    let cleaned = INVALID_SHEET_CHARS.replace_all(&joined, "");
    let collapsed = WHITESPACE_RUN.replace_all(&cleaned, " ");
    let truncated: String = trim_sheet_name(&collapsed)
        .chars()
        .take(MAX_SHEET_NAME_LEN)
        .collect();
    trim_sheet_name(&truncated).to_string()
}

/// Strips whitespace and apostrophes from both ends; Excel rejects a name that starts or
/// ends with `'`.
pub fn trim_sheet_name(name: &str) -> &str {
    let mut current = name;
    loop {
        let next = current.trim().trim_matches('\'');
        if next.len() == current.len() {
            return next;
        }
        current = next;
    }
}

pub fn format_attendances_excel_sheet(
    attendances: &[Attendance],
    calendar: &HolidayCalendar,
    offset: &FixedOffset,
) -> Vec<AttendanceSheetRow> {
    attendances
        .iter()
        .map(|attendance| {
            let worked = worked_duration(attendance);
            let day = local_date(attendance.check_in, offset);
            AttendanceSheetRow {
                date: format_date(day),
                check_in: format_time(attendance.check_in, offset),
                check_out: attendance
                    .check_out
                    .map(|t| format_time(t, offset))
                    .unwrap_or_default(),
                worked_hours: format_duration(worked),
                worked_hours_decimal: duration_as_decimal_hours(worked),
                weekend_or_festivo: format_is_weekend_or_festivo(day, calendar),
            }
        })
        .collect()
}
