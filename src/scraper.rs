use crate::cells::{CellGrid, CellValue};
use crate::extractor::extract_report;
use crate::models::{Config, DataSourceMode, ExtractionReport, SheetLayout};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to fetch {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} failed with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open workbook: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("workbook contains no worksheets")]
    NoWorksheet,
    #[error("no source configured for local mode (set data_file)")]
    MissingDataFile,
}

/// Where the enrollment list comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListSource {
    Url(String),
    File(PathBuf),
}

impl ListSource {
    pub fn from_config(config: &Config) -> Result<Self, ScrapeError> {
        match config.data_source_mode {
            DataSourceMode::Internet => Ok(ListSource::Url(config.source_url.clone())),
            DataSourceMode::Local => config
                .data_file
                .as_ref()
                .map(|path| ListSource::File(PathBuf::from(path)))
                .ok_or(ScrapeError::MissingDataFile),
        }
    }

    /// Identifier used to key cached reports.
    pub fn key(&self) -> String {
        match self {
            ListSource::Url(url) => url.clone(),
            ListSource::File(path) => path.display().to_string(),
        }
    }
}

impl fmt::Display for ListSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// First worksheet of a workbook, addressed with 1-based rows and columns.
pub struct SheetGrid {
    range: Range<Data>,
}

impl SheetGrid {
    pub fn new(range: Range<Data>) -> Self {
        Self { range }
    }
}

impl CellGrid for SheetGrid {
    fn cell(&self, row: u32, column: u32) -> Option<CellValue> {
        if row == 0 || column == 0 {
            return None;
        }
        let value = convert_cell(self.range.get_value((row - 1, column - 1))?);
        (!value.is_empty()).then_some(value)
    }
}

fn convert_cell(data: &Data) -> CellValue {
    match data {
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Flag(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => CellValue::Text(value.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) | Data::Empty => CellValue::Empty,
    }
}

/// Opens a workbook held in memory and returns its first worksheet.
pub fn open_sheet(bytes: Vec<u8>) -> Result<SheetGrid, ScrapeError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ScrapeError::NoWorksheet)??;
    debug!(
        rows = range.height(),
        columns = range.width(),
        "opened first worksheet"
    );
    Ok(SheetGrid::new(range))
}

pub struct ListScraper {
    client: reqwest::Client,
    timeout: Duration,
}

impl ListScraper {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub async fn fetch_url(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
        info!(url, "fetching enrollment list");

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| ScrapeError::Http {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let body = response.bytes().await.map_err(|source| ScrapeError::Http {
            url: url.to_string(),
            source,
        })?;
        debug!(url, bytes = body.len(), "download finished");
        Ok(body.to_vec())
    }

    pub fn read_file(&self, path: &std::path::Path) -> Result<Vec<u8>, ScrapeError> {
        info!(path = %path.display(), "reading enrollment list");
        std::fs::read(path).map_err(|source| ScrapeError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Retrieves the list and extracts a complete report from it.
    pub async fn load(
        &self,
        source: &ListSource,
        layout: &SheetLayout,
    ) -> Result<ExtractionReport, ScrapeError> {
        let bytes = match source {
            ListSource::Url(url) => self.fetch_url(url).await?,
            ListSource::File(path) => self.read_file(path)?,
        };

        let grid = open_sheet(bytes)?;
        let fetched_at = chrono::Utc::now().timestamp();
        Ok(extract_report(&grid, layout, &source.key(), fetched_at))
    }
}
