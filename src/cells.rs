use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Affirmative token used by the enrollment lists in the flag columns.
pub const YES_TOKEN: &str = "да";

/// A single spreadsheet cell, reduced to the shapes the extraction cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Flag(bool),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    /// String form of the cell, `None` for empty cells.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Number(n) => Some(n.to_string()),
            CellValue::Flag(b) => Some(b.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(s) => write!(f, "{}", s),
            None => Ok(()),
        }
    }
}

/// Read access to a worksheet using 1-based row and column numbers,
/// the way the cells are labelled in the spreadsheet itself.
pub trait CellGrid {
    fn cell(&self, row: u32, column: u32) -> Option<CellValue>;
}

impl CellGrid for BTreeMap<(u32, u32), CellValue> {
    fn cell(&self, row: u32, column: u32) -> Option<CellValue> {
        self.get(&(row, column))
            .filter(|value| !value.is_empty())
            .cloned()
    }
}

/// True only for the affirmative token, compared case- and whitespace-insensitively.
pub fn coerce_yes_flag(value: Option<&CellValue>) -> bool {
    value
        .and_then(CellValue::as_text)
        .map(|s| s.trim().to_lowercase() == YES_TOKEN)
        .unwrap_or(false)
}

/// Splits an identifier cell into its trimmed raw form and its canonical
/// digits-only form. Only a missing cell yields `(None, None)`; a cell holding
/// nothing but whitespace keeps an empty raw form.
pub fn coerce_identifier(value: Option<&CellValue>) -> (Option<String>, Option<String>) {
    let raw = match value.and_then(CellValue::as_text) {
        Some(s) => s.trim().to_string(),
        None => return (None, None),
    };

    let canonical = canonical_identifier(&raw);
    (Some(raw), canonical)
}

/// Digits of `value` with leading zeros stripped; `"0"` when every digit was
/// a zero and `None` when there were no digits at all.
pub fn canonical_identifier(value: &str) -> Option<String> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    let stripped = digits.trim_start_matches('0');
    if stripped.is_empty() {
        Some("0".to_string())
    } else {
        Some(stripped.to_string())
    }
}

/// Numeric score of a cell. Text tolerates a comma decimal separator and
/// embedded (including non-breaking) spaces.
pub fn coerce_score(value: Option<&CellValue>) -> Option<f64> {
    match value? {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => parse_decimal(s),
        CellValue::Empty | CellValue::Flag(_) => None,
    }
}

fn parse_decimal(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}
