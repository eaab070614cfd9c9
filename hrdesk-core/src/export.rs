// src/export.rs
//! Workbook export: one sheet per user, one row per attendance.

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::prelude::*;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::formatter::{
    format_attendances_excel_sheet, format_full_name_excel_sheet, trim_sheet_name,
    AttendanceSheetRow, HolidayCalendar, MAX_SHEET_NAME_LEN,
};
use crate::model::{Attendance, DisplayUser};

pub const EXCEL_EXTENSION: &str = ".xlsx";
pub const SHEET_COLUMN: &str = "Foglio";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No users to export")]
    NothingToExport,

    #[error("Excel writer error: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserSheet {
    pub name: String,
    pub rows: Vec<AttendanceSheetRow>,
}

/// CSV shape of a sheet row, prefixed by the sheet it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CsvRecord {
    #[serde(rename = "Foglio")]
    sheet: String,
    #[serde(rename = "Data")]
    date: String,
    #[serde(rename = "Entrata")]
    check_in: String,
    #[serde(rename = "Uscita")]
    check_out: String,
    #[serde(rename = "Ore lavorate")]
    worked_hours: String,
    #[serde(rename = "Ore decimali", with = "rust_decimal::serde::str")]
    worked_hours_decimal: Decimal,
    #[serde(rename = "Weekend/Festivo")]
    weekend_or_festivo: bool,
}

impl CsvRecord {
    fn new(sheet: &str, row: &AttendanceSheetRow) -> Self {
        Self {
            sheet: sheet.to_string(),
            date: row.date.clone(),
            check_in: row.check_in.clone(),
            check_out: row.check_out.clone(),
            worked_hours: row.worked_hours.clone(),
            worked_hours_decimal: row.worked_hours_decimal,
            weekend_or_festivo: row.weekend_or_festivo,
        }
    }

    fn into_parts(self) -> (String, AttendanceSheetRow) {
        (
            self.sheet,
            AttendanceSheetRow {
                date: self.date,
                check_in: self.check_in,
                check_out: self.check_out,
                worked_hours: self.worked_hours,
                worked_hours_decimal: self.worked_hours_decimal,
                weekend_or_festivo: self.weekend_or_festivo,
            },
        )
    }
}

/// `<base>_export_<epoch-millis>.xlsx`
pub fn export_file_name(base: &str, now: DateTime<Utc>) -> String {
    format!("{}_export_{}{}", base, now.timestamp_millis(), EXCEL_EXTENSION)
}

/// Picks a sheet name not yet in `used` (Excel compares names case-insensitively).
fn unique_sheet_name(base: &str, index: usize, used: &mut HashSet<String>) -> String {
    let base = if base.is_empty() {
        format!("Sheet{}", index + 1)
    } else {
        base.to_string()
    };

    let mut candidate = base.clone();
    let mut n = 2;
    while used.contains(&candidate.to_lowercase()) {
        let suffix = format!(" ({})", n);
        let keep = MAX_SHEET_NAME_LEN - suffix.chars().count();
        let prefix: String = base.chars().take(keep).collect();
        candidate = format!("{}{}", trim_sheet_name(&prefix), suffix);
        n += 1;
    }
    used.insert(candidate.to_lowercase());
    candidate
}

pub fn build_workbook_sheets(
    users: &[DisplayUser],
    calendar: &HolidayCalendar,
    offset: &FixedOffset,
) -> Vec<UserSheet> {
    let mut used = HashSet::new();
    users
        .iter()
        .enumerate()
        .map(|(index, user)| {
            let label = format_full_name_excel_sheet(&user.name, &user.surname);
            let name = unique_sheet_name(&label, index, &mut used);
            let attendances: Vec<Attendance> =
                user.attendances.iter().map(|d| d.attendance.clone()).collect();
            UserSheet {
                name,
                rows: format_attendances_excel_sheet(&attendances, calendar, offset),
            }
        })
        .collect()
}

pub fn write_xlsx(sheets: &[UserSheet], path: &Path) -> Result<(), ExportError> {
    if sheets.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        for (col, header) in AttendanceSheetRow::HEADERS.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
        }
        worksheet.set_column_width(0, 12)?; // Data
        worksheet.set_column_width(3, 14)?; // Ore lavorate
        worksheet.set_column_width(5, 16)?; // Weekend/Festivo

        for (idx, row) in sheet.rows.iter().enumerate() {
            let r = (idx + 1) as u32;
            worksheet.write_string(r, 0, &row.date)?;
            worksheet.write_string(r, 1, &row.check_in)?;
            worksheet.write_string(r, 2, &row.check_out)?;
            worksheet.write_string(r, 3, &row.worked_hours)?;
            worksheet.write_number(r, 4, row.worked_hours_decimal.to_f64().unwrap_or(0.0))?;
            worksheet.write_boolean(r, 5, row.weekend_or_festivo)?;
        }
        debug!("Sheet '{}' written with {} rows", sheet.name, sheet.rows.len());
    }

    workbook.save(path)?;
    info!("Workbook with {} sheets saved to {:?}", sheets.len(), path);
    Ok(())
}

/// Same rows as the workbook, as one CSV table with a leading sheet column.
pub fn write_csv<W: Write>(sheets: &[UserSheet], writer: W) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut wrote_any = false;
    for sheet in sheets {
        for row in &sheet.rows {
            csv_writer.serialize(CsvRecord::new(&sheet.name, row))?;
            wrote_any = true;
        }
    }
    if !wrote_any {
        // serialize() only emits headers with the first record
        let mut header = vec![SHEET_COLUMN];
        header.extend(AttendanceSheetRow::HEADERS);
        csv_writer.write_record(&header)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Reads back what `write_csv` produced, grouping rows by sheet in file order.
/// Sheets without rows do not appear in the CSV and are not returned.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<UserSheet>, ExportError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut sheets: Vec<UserSheet> = Vec::new();
    for record in csv_reader.deserialize::<CsvRecord>() {
        let (sheet, row) = record?.into_parts();
        match sheets.last_mut() {
            Some(last) if last.name == sheet => last.rows.push(row),
            _ => sheets.push(UserSheet {
                name: sheet,
                rows: vec![row],
            }),
        }
    }
    Ok(sheets)
}

/// Writes `<dir>/<base>_export_<millis>.xlsx` (or `.csv`) and returns its path.
pub fn export_users(
    sheets: &[UserSheet],
    dir: &Path,
    base: &str,
    now: DateTime<Utc>,
    as_csv: bool,
) -> Result<PathBuf, ExportError> {
    if sheets.is_empty() {
        return Err(ExportError::NothingToExport);
    }
    std::fs::create_dir_all(dir)?;
    let file_name = export_file_name(base, now);
    if as_csv {
        let path = dir.join(file_name.replace(EXCEL_EXTENSION, ".csv"));
        let file = std::fs::File::create(&path)?;
        write_csv(sheets, file)?;
        info!("CSV export saved to {:?}", path);
        Ok(path)
    } else {
        let path = dir.join(file_name);
        write_xlsx(sheets, &path)?;
        Ok(path)
    }
}
