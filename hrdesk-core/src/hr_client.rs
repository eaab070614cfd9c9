// src/hr_client.rs

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::HrConfig;
use crate::model::{Company, CompanyId, NewPermission, Permission, PermissionTypology, User, UserId};

// --- Specific HR API Error Type ---
#[derive(Error, Debug)]
pub enum HrError {
    #[error("HTTP request failed")]
    Request(#[from] reqwest::Error),

    #[error("JSON processing error")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error")]
    UrlParse(#[from] url::ParseError),

    #[error("Not authorized (Status 401), check HRDESK_API_TOKEN")]
    Unauthorized,

    #[error("Rate limit exceeded (Status 429)")]
    RateLimitExceeded,

    // Use this for non-401/429 API errors
    #[error("HR API error: Status={status}, Message='{message}'")]
    ApiError { status: StatusCode, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

// Error bodies look like {"statusCode":404,"message":"User not found"}
#[derive(Debug, Clone, Deserialize)]
struct HrErrorPayload {
    message: Option<serde_json::Value>,
}

impl HrErrorPayload {
    fn into_message(self) -> Option<String> {
        match self.message? {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Array(items) => Some(
                items
                    .iter()
                    .map(|v| v.as_str().map(String::from).unwrap_or_else(|| v.to_string()))
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            other => Some(other.to_string()),
        }
    }
}

/// Source of users with their attendances for a company and period.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `month` is zero-based; `None` for year or month widens the window.
    async fn get_all_users_with_attendances(
        &self,
        company_id: CompanyId,
        year: Option<i32>,
        month: Option<u32>,
    ) -> Result<Vec<User>, HrError>;

    async fn get_user(&self, user_id: UserId) -> Result<User, HrError>;
}

/// Leave/permission requests.
#[async_trait]
pub trait PermissionGateway: Send + Sync {
    async fn get_permission_by_user(&self, user_id: UserId) -> Result<Vec<Permission>, HrError>;

    async fn create_permission(
        &self,
        user_id: UserId,
        company_id: CompanyId,
        typology: PermissionTypology,
        dates: &str,
    ) -> Result<Permission, HrError>;
}

#[async_trait]
impl<T: UserDirectory + ?Sized> UserDirectory for Arc<T> {
    async fn get_all_users_with_attendances(
        &self,
        company_id: CompanyId,
        year: Option<i32>,
        month: Option<u32>,
    ) -> Result<Vec<User>, HrError> {
        (**self)
            .get_all_users_with_attendances(company_id, year, month)
            .await
    }

    async fn get_user(&self, user_id: UserId) -> Result<User, HrError> {
        (**self).get_user(user_id).await
    }
}

#[async_trait]
impl<T: PermissionGateway + ?Sized> PermissionGateway for Arc<T> {
    async fn get_permission_by_user(&self, user_id: UserId) -> Result<Vec<Permission>, HrError> {
        (**self).get_permission_by_user(user_id).await
    }

    async fn create_permission(
        &self,
        user_id: UserId,
        company_id: CompanyId,
        typology: PermissionTypology,
        dates: &str,
    ) -> Result<Permission, HrError> {
        (**self)
            .create_permission(user_id, company_id, typology, dates)
            .await
    }
}

// HR REST API Client Implementation
#[derive(Clone)]
pub struct HrClient {
    base_url: Url,
    api_token: Option<String>,
    http_client: Client,
}

impl HrClient {
    pub fn new(config: &HrConfig) -> Result<Self, HrError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?; // Maps to HrError::Request

        let base_url = Url::parse(config.api_base_url.trim_end_matches('/'))?;
        if base_url.cannot_be_a_base() {
            return Err(HrError::ConfigError(format!(
                "API base URL '{}' cannot be used as a base",
                config.api_base_url
            )));
        }

        Ok(Self {
            base_url,
            api_token: config.api_token.clone().filter(|t| !t.trim().is_empty()),
            http_client,
        })
    }

    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, HrError> {
        let url = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        Ok(Url::parse(&url)?)
    }

    pub fn build_request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder, HrError> {
        let url = self.endpoint_url(endpoint)?;
        let mut request = self
            .http_client
            .request(method, url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = &self.api_token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        Ok(request)
    }

    pub async fn send_and_deserialize<T: DeserializeOwned>(
        &self,
        request_builder: RequestBuilder,
        context_msg: &str,
    ) -> Result<T, HrError> {
        let request = request_builder.build().map_err(|e| {
            error!("Request build failed for '{}': {}", context_msg, e);
            HrError::Request(e)
        })?;
        let request_url = request.url().to_string();
        debug!("Sending request for '{}' to URL: {}", context_msg, request_url);

        let resp = self.http_client.execute(request).await.map_err(|e| {
            // Network, DNS, timeout etc.
            error!(
                "HTTP execution failed before receiving response for '{}' (URL: {}): {}",
                context_msg, request_url, e
            );
            HrError::Request(e)
        })?;

        let status = resp.status();
        info!(
            "Received response for '{}' (URL: {}): Status={}",
            context_msg, request_url, status
        );

        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
            return Err(Self::error_from_status(status, error_body, context_msg, &request_url));
        }

        let bytes = resp.bytes().await.map_err(|e| {
            error!("Failed to read response body bytes for '{}': {}", context_msg, e);
            HrError::Request(e)
        })?;
        match std::str::from_utf8(&bytes) {
            Ok(text) => debug!("Raw Success Response Body for '{}': {}", context_msg, text),
            Err(_) => {
                warn!("Response body for '{}' is not valid UTF-8. Logging hex.", context_msg);
                debug!(
                    "Raw Success Response Body (Hex) for '{}': {}",
                    context_msg,
                    hex::encode(&bytes)
                );
            }
        }

        serde_json::from_slice::<T>(&bytes).map_err(|e| {
            error!(
                "JSON deserialization failed for '{}' (URL: {}): {}",
                context_msg, request_url, e
            );
            HrError::Json(e)
        })
    }

    fn error_from_status(
        status: StatusCode,
        error_body: String,
        context_msg: &str,
        request_url: &str,
    ) -> HrError {
        error!(
            "API Error Response: Status={}, Body='{}' for URL: {}",
            status, error_body, request_url
        );
        match status {
            StatusCode::UNAUTHORIZED => HrError::Unauthorized,
            StatusCode::TOO_MANY_REQUESTS => {
                warn!("Rate limit exceeded for '{}' (URL: {})", context_msg, request_url);
                HrError::RateLimitExceeded
            }
            _ => {
                let message = serde_json::from_str::<HrErrorPayload>(&error_body)
                    .ok()
                    .and_then(HrErrorPayload::into_message)
                    .unwrap_or(error_body);
                HrError::ApiError { status, message }
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        context_msg: &str,
    ) -> Result<T, HrError> {
        let request = self.build_request(Method::GET, endpoint)?;
        self.send_and_deserialize(request, context_msg).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
        context_msg: &str,
    ) -> Result<T, HrError> {
        let request = self.build_request(Method::POST, endpoint)?.json(body);
        self.send_and_deserialize(request, context_msg).await
    }

    // --- API Methods ---

    pub fn users_with_attendances_query(
        company_id: CompanyId,
        year: Option<i32>,
        month: Option<u32>,
    ) -> Vec<(&'static str, String)> {
        let mut query = vec![("companyId", company_id.to_string())];
        if let Some(year) = year {
            query.push(("year", year.to_string()));
        }
        if let Some(month) = month {
            query.push(("month", month.to_string()));
        }
        query
    }

    pub async fn get_companies(&self) -> Result<Vec<Company>, HrError> {
        self.get("/companies", "Get Companies").await
    }

    pub async fn delete_company(&self, company_id: CompanyId) -> Result<(), HrError> {
        let endpoint = format!("/companies/{}", company_id);
        let request = self.build_request(Method::DELETE, &endpoint)?;
        // The backend answers with the deleted entity or an empty body; only the status matters
        let _: serde_json::Value = match self.send_and_deserialize(request, "Delete Company").await
        {
            Err(HrError::Json(_)) => serde_json::Value::Null,
            other => other?,
        };
        info!("Company {} deleted", company_id);
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for HrClient {
    async fn get_all_users_with_attendances(
        &self,
        company_id: CompanyId,
        year: Option<i32>,
        month: Option<u32>,
    ) -> Result<Vec<User>, HrError> {
        let query = Self::users_with_attendances_query(company_id, year, month);
        let request = self
            .build_request(Method::GET, "/users/attendances")?
            .query(&query);
        self.send_and_deserialize(request, "Get All Users With Attendances")
            .await
    }

    async fn get_user(&self, user_id: UserId) -> Result<User, HrError> {
        let endpoint = format!("/users/{}", user_id);
        self.get(&endpoint, "Get User by ID").await
    }
}

#[async_trait]
impl PermissionGateway for HrClient {
    async fn get_permission_by_user(&self, user_id: UserId) -> Result<Vec<Permission>, HrError> {
        let endpoint = format!("/permissions/user/{}", user_id);
        self.get(&endpoint, "Get Permissions by User").await
    }

    async fn create_permission(
        &self,
        user_id: UserId,
        company_id: CompanyId,
        typology: PermissionTypology,
        dates: &str,
    ) -> Result<Permission, HrError> {
        let body = NewPermission {
            user_id,
            company_id,
            typology,
            dates: dates.to_string(),
        };
        self.post("/permissions", &body, "Create Permission").await
    }
}
