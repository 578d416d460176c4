// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Check-in roster extraction from spreadsheet exports.
//!
//! Exports carry a title in the first row, column headers in the second and
//! one check-in per row after that. The nickname column (and, if present,
//! the submission time column) are located by header keywords.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::LazyLock;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Header keywords for the nickname column, in priority order.
pub const NICKNAME_KEYWORDS: &[&str] = &[
    "昵称", "姓名", "用户名", "名字", "用户", "name", "nickname", "微信昵称", "群昵称", "参与者",
    "打卡人", "用户昵称",
];

/// Header keywords for the submission time column, in priority order.
pub const TIME_KEYWORDS: &[&str] = &[
    "提交时间", "时间", "打卡时间", "参与时间", "上传时间", "time", "submit_time", "timestamp",
    "日期时间",
];

pub const SUPPORTED_EXTENSIONS: &[&str] = &[".xlsx", ".xls"];

/// Zero-based index of the header row in an export.
const HEADER_ROW: u32 = 1;
/// Values sampled when guessing whether the first column holds names.
const TEXT_SAMPLE_SIZE: usize = 10;
const TEXT_RATIO_THRESHOLD: f64 = 0.7;
const UNNAMED_PREFIX: &str = "Unnamed: ";

static INVALID_NICKNAME_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\w\x{4e00}-\x{9fff}\x{3400}-\x{4dbf}\s]").expect("valid regex")
});
static WHITESPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// One spreadsheet cell rendered to text.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    /// A string cell
    Text(String),
    /// Numbers, booleans and dates, rendered
    Value(String),
}

impl Cell {
    pub fn as_str(&self) -> &str {
        match self {
            Cell::Empty => "",
            Cell::Text(s) | Cell::Value(s) => s,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

/// First worksheet of an export: header names plus non-blank data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Sheet {
    /// Build a sheet from a header row and data rows. Unnamed and repeated
    /// headers are renamed; rows are padded to the header width and blank
    /// rows dropped.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = rows
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(headers.len());

        let mut columns: Vec<String> = Vec::with_capacity(width);
        for i in 0..width {
            let raw = headers.get(i).map(|h| h.trim()).unwrap_or("");
            let base = if raw.is_empty() {
                format!("{UNNAMED_PREFIX}{i}")
            } else {
                raw.to_string()
            };
            let mut name = base.clone();
            let mut n = 1;
            while columns.contains(&name) {
                name = format!("{base}.{n}");
                n += 1;
            }
            columns.push(name);
        }

        let rows = rows
            .into_iter()
            .filter(|row| row.iter().any(|c| !c.is_empty()))
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn column_cells(&self, index: usize) -> impl Iterator<Item = &Cell> {
        self.rows.iter().map(move |row| &row[index])
    }
}

/// Cleaned nicknames with their raw submission times ("" when unknown).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    pub nicknames: Vec<String>,
    pub times: Vec<String>,
}

/// Shape of an uploaded export.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SheetInfo {
    pub file_name: String,
    pub total_rows: u32,
    pub total_columns: u32,
    pub columns: Vec<String>,
    pub nickname_column: Option<String>,
    pub time_column: Option<String>,
}

/// Whether the file name has a supported spreadsheet extension.
pub fn is_supported(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    SUPPORTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Read the first worksheet of a workbook.
pub fn read_sheet(bytes: &[u8], file_name: &str) -> Result<Sheet, RosterError> {
    if !is_supported(file_name) {
        return Err(RosterError::UnsupportedFormat(file_name.to_string()));
    }

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| RosterError::Unreadable(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(RosterError::NoWorksheet)?
        .map_err(|e| RosterError::Unreadable(e.to_string()))?;

    // The range starts at the first used cell; locate the header relative to it.
    let start_row = range.start().map(|(row, _)| row).unwrap_or(0);
    let header_offset = HEADER_ROW.saturating_sub(start_row) as usize;

    let mut rows = range.rows().skip(header_offset);
    let headers = match rows.next() {
        Some(row) => row.iter().map(|c| render_cell(c).as_str().to_string()).collect(),
        None => return Err(RosterError::EmptySheet),
    };
    let data = rows
        .map(|row| row.iter().map(render_cell).collect())
        .collect();

    Ok(Sheet::new(headers, data))
}

fn render_cell(cell: &Data) -> Cell {
    match cell {
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Value(i.to_string()),
        Data::Float(f) => Cell::Value(format_float(*f)),
        Data::Bool(b) => Cell::Value(b.to_string()),
        Data::DateTime(dt) => Cell::Value(
            dt.as_datetime()
                .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| format_float(dt.as_f64())),
        ),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Value(s.clone()),
        _ => Cell::Empty,
    }
}

fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Locate a column by keyword: exact header match first, then substring,
/// both in keyword priority order. ASCII keywords match case-insensitively.
fn find_column_by_keywords(sheet: &Sheet, keywords: &[&str]) -> Option<usize> {
    let headers: Vec<(usize, String)> = sheet
        .columns
        .iter()
        .enumerate()
        .filter(|(_, name)| !name.starts_with(UNNAMED_PREFIX))
        .map(|(i, name)| (i, name.trim().to_lowercase()))
        .collect();

    for keyword in keywords {
        if let Some((i, _)) = headers.iter().find(|(_, h)| h.as_str() == *keyword) {
            return Some(*i);
        }
    }
    for keyword in keywords {
        if let Some((i, _)) = headers.iter().find(|(_, h)| h.contains(*keyword)) {
            return Some(*i);
        }
    }
    None
}

/// Find the nickname column, falling back to the first column when it is
/// mostly text.
pub fn find_nickname_column(sheet: &Sheet) -> Option<usize> {
    if let Some(index) = find_column_by_keywords(sheet, NICKNAME_KEYWORDS) {
        return Some(index);
    }

    if sheet.columns.is_empty() {
        return None;
    }
    let sample: Vec<&Cell> = sheet
        .column_cells(0)
        .filter(|c| !c.is_empty())
        .take(TEXT_SAMPLE_SIZE)
        .collect();
    if sample.is_empty() {
        return None;
    }
    let text_count = sample
        .iter()
        .filter(|c| matches!(c, Cell::Text(s) if !s.trim().is_empty()))
        .count();
    (text_count as f64 / sample.len() as f64 > TEXT_RATIO_THRESHOLD).then_some(0)
}

pub fn find_time_column(sheet: &Sheet) -> Option<usize> {
    find_column_by_keywords(sheet, TIME_KEYWORDS)
}

/// Strip emoji and punctuation from a nickname and normalize whitespace.
pub fn clean_nickname(raw: &str) -> String {
    let stripped = INVALID_NICKNAME_CHARS.replace_all(raw.trim(), "");
    WHITESPACE_RUNS
        .replace_all(&stripped, " ")
        .trim()
        .to_string()
}

/// Pull de-duplicated nicknames (first occurrence wins) and their
/// submission times out of a sheet.
pub fn roster_from_sheet(sheet: &Sheet) -> Result<Roster, RosterError> {
    if sheet.row_count() == 0 {
        return Err(RosterError::EmptySheet);
    }

    let nickname_col = find_nickname_column(sheet)
        .ok_or_else(|| RosterError::NoNicknameColumn(sheet.columns.join(", ")))?;
    let time_col = find_time_column(sheet);

    let mut roster = Roster::default();
    let mut seen = HashSet::new();
    for row in &sheet.rows {
        let nickname = clean_nickname(row[nickname_col].as_str());
        if nickname.is_empty() || !seen.insert(nickname.clone()) {
            continue;
        }
        let time = time_col
            .map(|i| row[i].as_str().trim().to_string())
            .unwrap_or_default();
        roster.nicknames.push(nickname);
        roster.times.push(time);
    }

    Ok(roster)
}

/// Extract the roster from an uploaded workbook.
pub fn extract(bytes: &[u8], file_name: &str) -> Result<Roster, RosterError> {
    let sheet = read_sheet(bytes, file_name)?;
    let roster = roster_from_sheet(&sheet)?;
    tracing::debug!(
        file = file_name,
        nicknames = roster.nicknames.len(),
        "Extracted roster"
    );
    Ok(roster)
}

/// Describe an uploaded workbook without extracting it.
pub fn inspect(bytes: &[u8], file_name: &str) -> Result<SheetInfo, RosterError> {
    let sheet = read_sheet(bytes, file_name)?;
    let column_name = |i: usize| sheet.columns[i].clone();

    Ok(SheetInfo {
        file_name: file_name.to_string(),
        total_rows: sheet.row_count() as u32,
        total_columns: sheet.columns.len() as u32,
        columns: sheet.columns.clone(),
        nickname_column: find_nickname_column(&sheet).map(column_name),
        time_column: find_time_column(&sheet).map(column_name),
    })
}

/// Errors from roster extraction.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("Unsupported file format: {0} (expected .xlsx or .xls)")]
    UnsupportedFormat(String),

    #[error("Failed to read workbook: {0}")]
    Unreadable(String),

    #[error("Workbook has no worksheets")]
    NoWorksheet,

    #[error("Sheet has no data rows")]
    EmptySheet,

    #[error("No nickname column found; available columns: {0}")]
    NoNicknameColumn(String),
}
