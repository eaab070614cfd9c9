// src/permission.rs

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use crate::hr_client::{HrError, PermissionGateway, UserDirectory};
use crate::model::{Permission, PermissionTypology};
use crate::view::SessionContext;

pub const PERMISSION_DATE_FORMAT: &str = "%d-%m-%Y";

#[derive(Error, Debug)]
pub enum PermissionError {
    #[error("A typology is required")]
    MissingTypology,

    #[error("At least one date is required")]
    MissingDates,

    #[error("User {0} is not associated with any company")]
    NoCompany(i64),

    #[error("Invalid date '{0}', expected DD-MM-YYYY")]
    InvalidDate(String),

    #[error("HR API request failed")]
    Api(#[from] HrError),
}

/// Input of a leave/permission request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionForm {
    pub typology: Option<PermissionTypology>,
    pub dates: Vec<NaiveDate>,
}

impl PermissionForm {
    pub fn new(typology: PermissionTypology, dates: Vec<NaiveDate>) -> Self {
        Self {
            typology: Some(typology),
            dates,
        }
    }

    pub fn validate(&self) -> Result<PermissionTypology, PermissionError> {
        let typology = self.typology.ok_or(PermissionError::MissingTypology)?;
        if self.dates.is_empty() {
            return Err(PermissionError::MissingDates);
        }
        Ok(typology)
    }
}

/// `DD-MM-YYYY` dates joined with commas, in the order given.
pub fn format_permission_dates(dates: &[NaiveDate]) -> String {
    dates
        .iter()
        .map(|d| d.format(PERMISSION_DATE_FORMAT).to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn parse_permission_date(value: &str) -> Result<NaiveDate, PermissionError> {
    NaiveDate::parse_from_str(value.trim(), PERMISSION_DATE_FORMAT)
        .map_err(|_| PermissionError::InvalidDate(value.to_string()))
}

/// Lists and files permission requests on behalf of the signed-in user.
pub struct PermissionDesk<'a, U: ?Sized, P: ?Sized> {
    users: &'a U,
    permissions: &'a P,
}

impl<'a, U, P> PermissionDesk<'a, U, P>
where
    U: UserDirectory + ?Sized,
    P: PermissionGateway + ?Sized,
{
    pub fn new(users: &'a U, permissions: &'a P) -> Self {
        Self { users, permissions }
    }

    pub async fn list(&self, session: &SessionContext) -> Result<Vec<Permission>, PermissionError> {
        let permissions = self
            .permissions
            .get_permission_by_user(session.user_id)
            .await?;
        info!(
            "Loaded {} permissions for user {}",
            permissions.len(),
            session.user_id
        );
        Ok(permissions)
    }

    /// Validates the form, resolves the user's primary company and files the request.
    pub async fn submit(
        &self,
        session: &SessionContext,
        form: &PermissionForm,
    ) -> Result<Permission, PermissionError> {
        let typology = form.validate()?;
        let user = self.users.get_user(session.user_id).await?;
        let company = match user.primary_company() {
            Some(company) => company,
            None => {
                warn!("User {} has no company, permission not sent", user.id);
                return Err(PermissionError::NoCompany(user.id));
            }
        };

        let dates = format_permission_dates(&form.dates);
        let created = self
            .permissions
            .create_permission(user.id, company.id, typology, &dates)
            .await?;
        info!(
            "Permission '{}' requested by user {} for {}",
            typology, user.id, dates
        );
        Ok(created)
    }
}
