// src/lib.rs
//! Attendance aggregation, export and permission requests against the HR REST backend.

pub mod aggregator;
pub mod config;
pub mod export;
pub mod formatter;
pub mod hr_client;
pub mod model;
pub mod permission;
pub mod view;

#[cfg(test)]
mod test_support;

mod view_tests;

pub use aggregator::{filter_users, AggregateError, AttendanceAggregator};
pub use config::HrConfig;
pub use export::{build_workbook_sheets, export_file_name, ExportError, UserSheet};
pub use formatter::HolidayCalendar;
pub use hr_client::{HrClient, HrError, PermissionGateway, UserDirectory};
pub use model::{
    Attendance, Company, DisplayAttendance, DisplayUser, Permission, PermissionTypology, User,
};
pub use permission::{PermissionDesk, PermissionError, PermissionForm};
pub use view::{AttendanceView, CompanyContext, Period, SessionContext, ViewScope};
