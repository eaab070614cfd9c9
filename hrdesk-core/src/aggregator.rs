// src/aggregator.rs

use chrono::FixedOffset;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::formatter::{
    format_date, format_duration, format_is_weekend_or_festivo, local_date, total_worked,
    worked_duration, HolidayCalendar,
};
use crate::hr_client::{HrError, UserDirectory};
use crate::model::{Attendance, CompanyId, DisplayAttendance, DisplayUser, User};

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Month {0} is out of range, expected 0 (January) to 11 (December)")]
    InvalidMonth(u32),

    #[error("Failed to fetch users with attendances")]
    Fetch(#[from] HrError),
}

/// Derives display records from raw users. Never touches the source records.
#[derive(Debug, Clone)]
pub struct AttendanceAggregator {
    calendar: HolidayCalendar,
    offset: FixedOffset,
}

impl AttendanceAggregator {
    pub fn new(calendar: HolidayCalendar, offset: FixedOffset) -> Self {
        Self { calendar, offset }
    }

    pub fn calendar(&self) -> &HolidayCalendar {
        &self.calendar
    }

    pub fn offset(&self) -> &FixedOffset {
        &self.offset
    }

    /// Fetches the company's users for the period and derives their display records.
    pub async fn aggregate<D: UserDirectory + ?Sized>(
        &self,
        directory: &D,
        company_id: CompanyId,
        year: Option<i32>,
        month: Option<u32>,
    ) -> Result<Vec<DisplayUser>, AggregateError> {
        if let Some(month) = month {
            if month > 11 {
                return Err(AggregateError::InvalidMonth(month));
            }
        }

        info!(
            "Aggregating attendances for company {} (year={:?}, month={:?})",
            company_id, year, month
        );
        let users = directory
            .get_all_users_with_attendances(company_id, year, month)
            .await?;
        debug!("Fetched {} users for company {}", users.len(), company_id);

        Ok(self.present_users(&users))
    }

    pub fn present_users(&self, users: &[User]) -> Vec<DisplayUser> {
        users.iter().map(|user| self.present_user(user)).collect()
    }

    pub fn present_user(&self, user: &User) -> DisplayUser {
        let total = total_worked(&user.attendances);
        DisplayUser {
            id: user.id,
            name: user.name.clone(),
            surname: user.surname.clone(),
            full_name: format!("{} {}", user.name, user.surname).trim().to_string(),
            company: user.primary_company().map(|c| c.name.clone()),
            created_at: user.created_at,
            joined_on: format_date(local_date(user.created_at, &self.offset)),
            attendances: user
                .attendances
                .iter()
                .map(|a| self.present_attendance(a))
                .collect(),
            total,
            total_hours: format_duration(total),
        }
    }

    pub fn present_attendance(&self, attendance: &Attendance) -> DisplayAttendance {
        let worked = worked_duration(attendance);
        let day = local_date(attendance.check_in, &self.offset);
        DisplayAttendance {
            attendance: attendance.clone(),
            worked,
            worked_hours: format_duration(worked),
            check_is_weekend: format_is_weekend_or_festivo(day, &self.calendar),
        }
    }
}

/// Case-insensitive "contains" match over full name and company.
pub fn filter_users<'a>(users: &'a [DisplayUser], query: &str) -> Vec<&'a DisplayUser> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return users.iter().collect();
    }
    users
        .iter()
        .filter(|user| {
            user.full_name.to_lowercase().contains(&needle)
                || user
                    .company
                    .as_deref()
                    .map(|c| c.to_lowercase().contains(&needle))
                    .unwrap_or(false)
        })
        .collect()
}

/// Row keys for an "expand all" table toggle; users without a name are skipped.
pub fn expanded_rows(users: &[DisplayUser]) -> BTreeMap<String, bool> {
    users
        .iter()
        .filter(|user| !user.name.trim().is_empty())
        .map(|user| (user.name.clone(), true))
        .collect()
}
