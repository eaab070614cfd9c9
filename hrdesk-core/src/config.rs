// src/config.rs

use chrono::FixedOffset;
use serde::Deserialize;
use std::path::PathBuf;

use crate::formatter::HolidayCalendar;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_EXPORT_BASE_NAME: &str = "utenze";
pub const ENV_PREFIX: &str = "HRDESK_";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HrConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Offset used to turn instants into calendar dates, e.g. `+01:00`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
    /// Extra holidays on top of the national ones, `DD-MM` comma separated.
    #[serde(default)]
    pub extra_holidays: Option<String>,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
    #[serde(default = "default_export_base_name")]
    pub export_base_name: String,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_export_base_name() -> String {
    DEFAULT_EXPORT_BASE_NAME.to_string()
}

impl Default for HrConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            utc_offset: default_utc_offset(),
            extra_holidays: None,
            export_dir: default_export_dir(),
            export_base_name: default_export_base_name(),
        }
    }
}

impl HrConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        envy::prefixed(ENV_PREFIX).from_env::<HrConfig>()
    }

    pub fn offset(&self) -> Result<FixedOffset, String> {
        parse_utc_offset(&self.utc_offset)
    }

    pub fn holiday_calendar(&self) -> Result<HolidayCalendar, String> {
        match &self.extra_holidays {
            Some(list) => HolidayCalendar::default().with_extra_holidays(list),
            None => Ok(HolidayCalendar::default()),
        }
    }
}

/// Parses `Z`, `+01:00`, `-0530` or `+2`.
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset, String> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| "invalid offset".to_string());
    }

    let (sign, rest) = match value.chars().next() {
        Some('+') => (1, &value[1..]),
        Some('-') => (-1, &value[1..]),
        _ => return Err(format!("offset '{}' must start with + or -", value)),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("offset '{}' is not in +HH:MM form", value));
    }
    let (hours, minutes) = match digits.len() {
        1 | 2 => (digits.as_str(), "0"),
        4 => digits.split_at(2),
        _ => return Err(format!("offset '{}' is not in +HH:MM form", value)),
    };
    let hours: i32 = hours
        .parse()
        .map_err(|_| format!("invalid hours in offset '{}'", value))?;
    let minutes: i32 = minutes
        .parse()
        .map_err(|_| format!("invalid minutes in offset '{}'", value))?;
    if hours > 14 || minutes > 59 {
        return Err(format!("offset '{}' out of range", value));
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| format!("offset '{}' out of range", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets() {
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("+01:00").unwrap().local_minus_utc(), 3600);
        assert_eq!(parse_utc_offset("-0530").unwrap().local_minus_utc(), -19800);
        assert_eq!(parse_utc_offset("+2").unwrap().local_minus_utc(), 7200);
        assert!(parse_utc_offset("01:00").is_err());
        assert!(parse_utc_offset("+25:00").is_err());
        assert!(parse_utc_offset("+1:2:3").is_err());
        assert!(parse_utc_offset("+1é1").is_err());
        assert!(parse_utc_offset("+ab").is_err());
    }

    #[test]
    fn calendar_includes_extra_holidays() {
        let config = HrConfig {
            extra_holidays: Some("19-03".to_string()),
            ..HrConfig::default()
        };
        let calendar = config.holiday_calendar().unwrap();
        assert_eq!(calendar.len(), HolidayCalendar::default().len() + 1);
    }

    #[test]
    fn defaults() {
        let config = HrConfig::default();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.export_base_name, "utenze");
        assert_eq!(config.offset().unwrap().local_minus_utc(), 0);
    }
}
