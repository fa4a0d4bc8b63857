use crate::cells::CellValue;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

pub const DEFAULT_SOURCE_URL: &str =
    "https://priem44.hse.ru/ABITREPORTS/MAGREPORTS/EnrollmentList/28367398628_Commercial.xlsx";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source_url: String,
    pub data_source_mode: DataSourceMode,
    pub data_file: Option<String>,
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub target_identifiers: Vec<String>,
    pub output_directory: Option<String>,
    pub log_level: String,
    #[serde(default)]
    pub layout: LayoutConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSourceMode {
    #[serde(rename = "internet")]
    Internet,
    #[serde(rename = "local")]
    Local,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            data_source_mode: DataSourceMode::Internet,
            data_file: Some("data-source/enrollment.xlsx".to_string()),
            refresh_interval_secs: 60 * 60,
            request_timeout_secs: 60,
            target_identifiers: Vec::new(),
            output_directory: Some("output".to_string()),
            log_level: "info".to_string(),
            layout: LayoutConfig::default(),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }
}

/// Sheet layout as written in the configuration file, in spreadsheet notation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub report_date_cell: String,
    pub header_row: u32,
    pub first_data_row: u32,
    pub last_data_row: u32,
    pub contract_column: String,
    pub paid_column: String,
    pub header_scan_columns: u32,
    pub identifier_label: String,
    pub score_label: String,
    pub identifier_fallback_column: String,
    pub score_fallback_column: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            report_date_cell: "A20".to_string(),
            header_row: 21,
            first_data_row: 22,
            last_data_row: 500,
            contract_column: "H".to_string(),
            paid_column: "I".to_string(),
            header_scan_columns: 40,
            identifier_label: "Регистрационный номер".to_string(),
            score_label: "Сумма конкурсных баллов".to_string(),
            identifier_fallback_column: "B".to_string(),
            score_fallback_column: "E".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("invalid column reference '{0}': expected letters such as \"H\"")]
    InvalidColumn(String),
    #[error("invalid cell reference '{0}': expected a reference such as \"A20\"")]
    InvalidCell(String),
    #[error("data rows {first}..={last} do not form a non-empty window")]
    EmptyRowWindow { first: u32, last: u32 },
    #[error("row numbers start at 1")]
    ZeroRow,
}

/// Resolved sheet layout with 1-based numeric rows and columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    pub report_date_cell: (u32, u32),
    pub header_row: u32,
    pub first_data_row: u32,
    pub last_data_row: u32,
    pub contract_column: u32,
    pub paid_column: u32,
    pub header_scan_columns: u32,
    pub identifier_label: String,
    pub score_label: String,
    pub identifier_fallback_column: u32,
    pub score_fallback_column: u32,
}

impl TryFrom<&LayoutConfig> for SheetLayout {
    type Error = LayoutError;

    fn try_from(config: &LayoutConfig) -> Result<Self, Self::Error> {
        if config.header_row == 0 || config.first_data_row == 0 {
            return Err(LayoutError::ZeroRow);
        }
        if config.first_data_row > config.last_data_row {
            return Err(LayoutError::EmptyRowWindow {
                first: config.first_data_row,
                last: config.last_data_row,
            });
        }

        Ok(Self {
            report_date_cell: parse_cell_reference(&config.report_date_cell)?,
            header_row: config.header_row,
            first_data_row: config.first_data_row,
            last_data_row: config.last_data_row,
            contract_column: parse_column(&config.contract_column)?,
            paid_column: parse_column(&config.paid_column)?,
            header_scan_columns: config.header_scan_columns,
            identifier_label: normalize_label(&config.identifier_label),
            score_label: normalize_label(&config.score_label),
            identifier_fallback_column: parse_column(&config.identifier_fallback_column)?,
            score_fallback_column: parse_column(&config.score_fallback_column)?,
        })
    }
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            report_date_cell: (20, 1),
            header_row: 21,
            first_data_row: 22,
            last_data_row: 500,
            contract_column: 8,
            paid_column: 9,
            header_scan_columns: 40,
            identifier_label: "регистрационный номер".to_string(),
            score_label: "сумма конкурсных баллов".to_string(),
            identifier_fallback_column: 2,
            score_fallback_column: 5,
        }
    }
}

/// Header labels are compared trimmed and lower-cased.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

fn column_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z]{1,3}$").expect("valid column pattern"))
}

fn cell_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z]{1,3})([1-9][0-9]{0,6})$").expect("valid cell reference pattern")
    })
}

// Letters are already validated as 1-3 ASCII letters.
fn column_number(letters: &str) -> u32 {
    letters
        .to_ascii_uppercase()
        .bytes()
        .fold(0, |acc, b| acc * 26 + u32::from(b - b'A' + 1))
}

/// Converts column letters ("A", "H", "AB") into a 1-based column number.
pub fn parse_column(letters: &str) -> Result<u32, LayoutError> {
    let letters = letters.trim();
    if !column_pattern().is_match(letters) {
        return Err(LayoutError::InvalidColumn(letters.to_string()));
    }
    Ok(column_number(letters))
}

/// Converts an A1-style reference into a 1-based `(row, column)` pair.
pub fn parse_cell_reference(reference: &str) -> Result<(u32, u32), LayoutError> {
    let reference = reference.trim();
    let caps = cell_pattern()
        .captures(reference)
        .ok_or_else(|| LayoutError::InvalidCell(reference.to_string()))?;

    let row = caps[2]
        .parse::<u32>()
        .map_err(|_| LayoutError::InvalidCell(reference.to_string()))?;
    Ok((row, column_number(&caps[1])))
}

/// One scanned data row of the enrollment list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub row_position: u32,
    pub identifier_raw: Option<String>,
    pub identifier_canonical: Option<String>,
    pub has_contract: bool,
    pub has_paid: bool,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CohortKind {
    #[serde(rename = "contract")]
    Contract,
    #[serde(rename = "paid")]
    Paid,
}

impl CohortKind {
    pub fn admits(self, record: &CandidateRecord) -> bool {
        match self {
            CohortKind::Contract => record.has_contract,
            CohortKind::Paid => record.has_paid,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CohortKind::Contract => "Contracts",
            CohortKind::Paid => "Paid",
        }
    }
}

/// Ordered view over the records admitted by one cohort predicate.
/// Member indices point into `ExtractionReport::all_records`, ascending, and
/// can only be built from the records they index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cohort {
    pub kind: CohortKind,
    members: Vec<usize>,
}

impl Cohort {
    /// Selects, in row order, the indices of the records `kind` admits.
    pub fn index(kind: CohortKind, all_records: &[CandidateRecord]) -> Self {
        let members = all_records
            .iter()
            .enumerate()
            .filter(|(_, record)| kind.admits(record))
            .map(|(i, _)| i)
            .collect();
        Self { kind, members }
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn records<'a>(
        &'a self,
        all_records: &'a [CandidateRecord],
    ) -> impl Iterator<Item = &'a CandidateRecord> + 'a {
        self.members.iter().map(move |&i| &all_records[i])
    }

    /// Number of members placed strictly before `row_position`, plus one.
    pub fn insertion_rank(&self, row_position: u32, all_records: &[CandidateRecord]) -> usize {
        self.members
            .partition_point(|&i| all_records[i].row_position < row_position)
            + 1
    }

    /// 1-based rank of the record at `row_position`, if it is a member.
    pub fn membership_rank(
        &self,
        row_position: u32,
        all_records: &[CandidateRecord],
    ) -> Option<usize> {
        let rank = self.insertion_rank(row_position, all_records);
        self.members
            .get(rank - 1)
            .filter(|&&i| all_records[i].row_position == row_position)
            .map(|_| rank)
    }
}

/// Everything extracted from one retrieval of the enrollment list.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub source: String,
    pub header_note: Option<CellValue>,
    pub all_records: Vec<CandidateRecord>,
    pub contract_cohort: Cohort,
    pub paid_cohort: Cohort,
    pub contract_count: usize,
    pub paid_count: usize,
    pub fetched_at_epoch_seconds: i64,
}

impl ExtractionReport {
    pub fn cohort(&self, kind: CohortKind) -> &Cohort {
        match kind {
            CohortKind::Contract => &self.contract_cohort,
            CohortKind::Paid => &self.paid_cohort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_column_letters() {
        assert_eq!(parse_column("A").expect("A parses"), 1);
        assert_eq!(parse_column("h").expect("h parses"), 8);
        assert_eq!(parse_column("Z").expect("Z parses"), 26);
        assert_eq!(parse_column("AA").expect("AA parses"), 27);
        assert_eq!(parse_column("AN").expect("AN parses"), 40);
    }

    #[test]
    fn rejects_bad_columns() {
        assert!(matches!(parse_column("H1"), Err(LayoutError::InvalidColumn(_))));
        assert!(matches!(parse_column(""), Err(LayoutError::InvalidColumn(_))));
    }

    #[test]
    fn parses_cell_reference() {
        assert_eq!(parse_cell_reference("A20").expect("A20 parses"), (20, 1));
        assert_eq!(parse_cell_reference(" i22 ").expect("i22 parses"), (22, 9));
        assert!(matches!(
            parse_cell_reference("A0"),
            Err(LayoutError::InvalidCell(_))
        ));
        assert!(matches!(
            parse_cell_reference("20A"),
            Err(LayoutError::InvalidCell(_))
        ));
    }

    #[test]
    fn reference_patterns_compile_once() {
        assert!(std::ptr::eq(column_pattern(), column_pattern()));
        assert!(std::ptr::eq(cell_pattern(), cell_pattern()));
        assert_eq!(parse_cell_reference("AB7").expect("AB7 parses"), (7, 28));
        assert!(matches!(
            parse_cell_reference("ABCD7"),
            Err(LayoutError::InvalidCell(_))
        ));
    }

    fn flagged(row: u32, has_contract: bool, has_paid: bool) -> CandidateRecord {
        CandidateRecord {
            row_position: row,
            identifier_raw: None,
            identifier_canonical: None,
            has_contract,
            has_paid,
            score: None,
        }
    }

    #[test]
    fn cohort_indexes_only_admitted_records() {
        let records = vec![
            flagged(3, true, false),
            flagged(4, false, true),
            flagged(5, true, true),
        ];

        let contract = Cohort::index(CohortKind::Contract, &records);
        assert_eq!(contract.members(), &[0, 2]);
        assert_eq!(contract.membership_rank(5, &records), Some(2));
        assert_eq!(contract.membership_rank(4, &records), None);
        assert_eq!(contract.insertion_rank(4, &records), 2);

        let paid = Cohort::index(CohortKind::Paid, &records);
        assert_eq!(paid.len(), 2);
        assert!(paid.records(&records).all(|r| r.has_paid));
    }

    #[test]
    fn default_layout_config_resolves_to_default_layout() {
        let layout = SheetLayout::try_from(&LayoutConfig::default()).expect("default layout");
        assert_eq!(layout, SheetLayout::default());
    }

    #[test]
    fn inverted_row_window_is_rejected() {
        let config = LayoutConfig {
            first_data_row: 30,
            last_data_row: 22,
            ..LayoutConfig::default()
        };
        assert!(matches!(
            SheetLayout::try_from(&config),
            Err(LayoutError::EmptyRowWindow { first: 30, last: 22 })
        ));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");
        let path = path.to_str().expect("utf-8 path");

        let mut config = Config::default();
        config.target_identifiers = vec!["0012345".to_string()];
        config.save_to_file(path).expect("config saves");

        let loaded = Config::load_from_file(path).expect("config loads");
        assert_eq!(loaded.source_url, DEFAULT_SOURCE_URL);
        assert_eq!(loaded.target_identifiers, vec!["0012345".to_string()]);
        assert_eq!(loaded.layout.report_date_cell, "A20");
        assert_eq!(loaded.data_source_mode, DataSourceMode::Internet);
    }

    #[test]
    fn partial_layout_table_falls_back_to_defaults() {
        let content = r#"
source_url = "https://example.com/list.xlsx"
data_source_mode = "internet"
refresh_interval_secs = 600
request_timeout_secs = 30
target_identifiers = []
log_level = "debug"

[layout]
contract_column = "J"
"#;
        let config: Config = toml::from_str(content).expect("config parses");
        let layout = SheetLayout::try_from(&config.layout).expect("layout resolves");
        assert_eq!(layout.contract_column, 10);
        assert_eq!(layout.paid_column, 9);
        assert_eq!(config.data_file, None);
    }
}
