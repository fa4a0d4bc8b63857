//! Extraction and ranking over an admission enrollment spreadsheet.
//!
//! The spreadsheet is reduced to one [`models::CandidateRecord`] per data
//! row, grouped into the contracted and paid cohorts, and queried for a
//! candidate's rank within each cohort.

pub mod analyzer;
pub mod cache;
pub mod cells;
pub mod extractor;
pub mod models;
pub mod report;
pub mod scraper;
pub mod telemetry;

pub use analyzer::{
    resolve_rank, CohortPosition, CohortStanding, NotFound, RankResolver, RankResult,
};
pub use cache::{RefreshOutcome, ReportCache};
pub use cells::{CellGrid, CellValue};
pub use extractor::{extract_report, locate_schema, SchemaDescriptor};
pub use models::{CandidateRecord, Cohort, CohortKind, Config, ExtractionReport, SheetLayout};
pub use scraper::{ListScraper, ListSource, ScrapeError};
