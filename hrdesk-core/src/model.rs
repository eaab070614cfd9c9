// src/model.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

pub type UserId = i64;
pub type CompanyId = i64;
pub type AttendanceId = i64;

// --- HR API Data Structures ---

// The backend sends `null` as often as it omits the key
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: AttendanceId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub check_in: DateTime<Utc>,
    #[serde(default)]
    pub check_out: Option<DateTime<Utc>>,
    /// Photo records attached at check-in/check-out, kept as served by the backend.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub files: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub surname: String,
    pub created_at: DateTime<Utc>,
    // Omitted or null when the user has none
    #[serde(default, deserialize_with = "null_as_empty")]
    pub companies: Vec<Company>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub attendances: Vec<Attendance>,
}

impl User {
    /// The first associated company is the user's primary one.
    pub fn primary_company(&self) -> Option<&Company> {
        self.companies.first()
    }
}

/// Category of a leave/permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionTypology {
    #[serde(rename = "Malattia")]
    Malattia,
    #[serde(rename = "Permesso ROL")]
    PermessoRol,
    #[serde(rename = "Ferie")]
    Ferie,
}

impl PermissionTypology {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionTypology::Malattia => "Malattia",
            PermissionTypology::PermessoRol => "Permesso ROL",
            PermissionTypology::Ferie => "Ferie",
        }
    }
}

impl fmt::Display for PermissionTypology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for PermissionTypology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "malattia" => Ok(PermissionTypology::Malattia),
            "permesso rol" | "rol" => Ok(PermissionTypology::PermessoRol),
            "ferie" => Ok(PermissionTypology::Ferie),
            _ => Err(format!(
                "unknown typology '{}', expected one of: Malattia, Permesso ROL, Ferie",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(default)]
    pub id: Option<i64>,
    pub typology: PermissionTypology,
    /// Comma-joined `DD-MM-YYYY` dates.
    pub dates: String,
    pub user_id: UserId,
    pub company_id: CompanyId,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Permission {
    pub fn date_list(&self) -> Vec<&str> {
        self.dates
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .collect()
    }
}

/// Body of `POST /permissions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPermission {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub typology: PermissionTypology,
    pub dates: String,
}

// --- Display records (derived, read-only) ---

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayAttendance {
    #[serde(flatten)]
    pub attendance: Attendance,
    #[serde(skip)]
    pub worked: Duration,
    pub worked_hours: String,
    pub check_is_weekend: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayUser {
    pub id: UserId,
    pub name: String,
    pub surname: String,
    pub full_name: String,
    pub company: Option<String>,
    pub created_at: DateTime<Utc>,
    pub joined_on: String,
    pub attendances: Vec<DisplayAttendance>,
    #[serde(skip)]
    pub total: Duration,
    pub total_hours: String,
}
