// src/test_support.rs
// In-memory stand-ins for the HR backend, shared by the test modules.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use tokio::sync::{oneshot, Mutex};

use crate::hr_client::{HrError, PermissionGateway, UserDirectory};
use crate::model::{
    Attendance, Company, CompanyId, Permission, PermissionTypology, User, UserId,
};

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn company(id: CompanyId, name: &str) -> Company {
    Company {
        id,
        name: name.to_string(),
    }
}

pub fn attendance(
    id: i64,
    check_in: DateTime<Utc>,
    check_out: Option<DateTime<Utc>>,
) -> Attendance {
    Attendance {
        id,
        user_id: None,
        check_in,
        check_out,
        files: Vec::new(),
    }
}

pub fn user(id: UserId, name: &str, surname: &str, attendances: Vec<Attendance>) -> User {
    User {
        id,
        name: name.to_string(),
        surname: surname.to_string(),
        created_at: at(2023, 3, 15, 10, 0),
        companies: vec![company(1, "Acme Srl")],
        attendances,
    }
}

/// Serves fixed users and records every query.
#[derive(Default)]
pub struct StaticDirectory {
    pub users: Vec<User>,
    pub calls: StdMutex<Vec<(CompanyId, Option<i32>, Option<u32>)>>,
    pub fail_with_status: Option<u16>,
}

impl StaticDirectory {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users,
            ..Self::default()
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            fail_with_status: Some(status),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(CompanyId, Option<i32>, Option<u32>)> {
        self.calls.lock().unwrap().clone()
    }
}

fn api_error(status: u16) -> HrError {
    HrError::ApiError {
        status: reqwest::StatusCode::from_u16(status).unwrap(),
        message: "test failure".to_string(),
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn get_all_users_with_attendances(
        &self,
        company_id: CompanyId,
        year: Option<i32>,
        month: Option<u32>,
    ) -> Result<Vec<User>, HrError> {
        self.calls.lock().unwrap().push((company_id, year, month));
        if let Some(status) = self.fail_with_status {
            return Err(api_error(status));
        }
        Ok(self.users.clone())
    }

    async fn get_user(&self, user_id: UserId) -> Result<User, HrError> {
        if let Some(status) = self.fail_with_status {
            return Err(api_error(status));
        }
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| api_error(404))
    }
}

/// Holds each company's response until the test releases it.
#[derive(Default)]
pub struct GatedDirectory {
    gates: Mutex<HashMap<CompanyId, oneshot::Receiver<Vec<User>>>>,
}

impl GatedDirectory {
    pub async fn gate(&self, company_id: CompanyId) -> oneshot::Sender<Vec<User>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().await.insert(company_id, rx);
        tx
    }
}

#[async_trait]
impl UserDirectory for GatedDirectory {
    async fn get_all_users_with_attendances(
        &self,
        company_id: CompanyId,
        _year: Option<i32>,
        _month: Option<u32>,
    ) -> Result<Vec<User>, HrError> {
        let gate = self.gates.lock().await.remove(&company_id);
        match gate {
            Some(rx) => Ok(rx.await.unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }

    async fn get_user(&self, _user_id: UserId) -> Result<User, HrError> {
        Err(api_error(404))
    }
}

/// Remembers created permissions and serves them back per user.
#[derive(Default)]
pub struct RecordingGateway {
    pub created: StdMutex<Vec<Permission>>,
}

#[async_trait]
impl PermissionGateway for RecordingGateway {
    async fn get_permission_by_user(&self, user_id: UserId) -> Result<Vec<Permission>, HrError> {
        Ok(self
            .created
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_permission(
        &self,
        user_id: UserId,
        company_id: CompanyId,
        typology: PermissionTypology,
        dates: &str,
    ) -> Result<Permission, HrError> {
        let mut created = self.created.lock().unwrap();
        let permission = Permission {
            id: Some(created.len() as i64 + 1),
            typology,
            dates: dates.to_string(),
            user_id,
            company_id,
            created_at: None,
        };
        created.push(permission.clone());
        Ok(permission)
    }
}
