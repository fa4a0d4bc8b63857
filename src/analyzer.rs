use crate::cells::canonical_identifier;
use crate::models::{CandidateRecord, CohortKind, ExtractionReport};
use serde::Serialize;
use thiserror::Error;

/// Where a candidate stands relative to one cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CohortStanding {
    /// The candidate belongs to the cohort at this 1-based rank.
    Member { rank: usize },
    /// The candidate is not in the cohort. `positional_estimate` is the rank
    /// it would take if it joined while keeping row order.
    Absent { positional_estimate: usize },
}

impl CohortStanding {
    pub fn membership_rank(&self) -> Option<usize> {
        match self {
            CohortStanding::Member { rank } => Some(*rank),
            CohortStanding::Absent { .. } => None,
        }
    }

    pub fn positional_estimate(&self) -> Option<usize> {
        match self {
            CohortStanding::Member { .. } => None,
            CohortStanding::Absent {
                positional_estimate,
            } => Some(*positional_estimate),
        }
    }

    pub fn is_member(&self) -> bool {
        matches!(self, CohortStanding::Member { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortPosition {
    pub kind: CohortKind,
    pub cohort_size: usize,
    pub standing: CohortStanding,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankResult {
    pub row_position: u32,
    pub identifier_raw: Option<String>,
    pub score: Option<f64>,
    pub contract: CohortPosition,
    pub paid: CohortPosition,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("candidate '{query}' not found in the enrollment list")]
pub struct NotFound {
    pub query: String,
}

pub struct RankResolver<'a> {
    report: &'a ExtractionReport,
}

impl<'a> RankResolver<'a> {
    pub fn new(report: &'a ExtractionReport) -> Self {
        Self { report }
    }

    /// Finds the candidate and computes its standing in both cohorts.
    pub fn resolve(&self, query: &str) -> Result<RankResult, NotFound> {
        let record = self.find_record(query).ok_or_else(|| NotFound {
            query: query.trim().to_string(),
        })?;

        Ok(RankResult {
            row_position: record.row_position,
            identifier_raw: record.identifier_raw.clone(),
            score: record.score,
            contract: self.position_in(CohortKind::Contract, record),
            paid: self.position_in(CohortKind::Paid, record),
        })
    }

    /// Exact raw matches are tried across the whole list before any
    /// canonical match; within each pass the earliest row wins. An empty
    /// query matches nothing.
    pub fn find_record(&self, query: &str) -> Option<&'a CandidateRecord> {
        let report: &'a ExtractionReport = self.report;
        let records = &report.all_records;
        let query = query.trim();
        if query.is_empty() {
            return None;
        }

        // First pass: identifier exactly as written in the sheet
        if let Some(record) = records
            .iter()
            .find(|r| r.identifier_raw.as_deref() == Some(query))
        {
            return Some(record);
        }

        // Second pass: digits only, leading zeros dropped
        let canonical = canonical_identifier(query)?;
        records
            .iter()
            .find(|r| r.identifier_canonical.as_deref() == Some(canonical.as_str()))
    }

    fn position_in(&self, kind: CohortKind, record: &CandidateRecord) -> CohortPosition {
        let cohort = self.report.cohort(kind);
        let all = &self.report.all_records;

        let standing = match cohort.membership_rank(record.row_position, all) {
            Some(rank) => CohortStanding::Member { rank },
            None => CohortStanding::Absent {
                positional_estimate: cohort.insertion_rank(record.row_position, all),
            },
        };

        CohortPosition {
            kind,
            cohort_size: cohort.len(),
            standing,
        }
    }
}

/// Convenience wrapper over [`RankResolver::resolve`].
pub fn resolve_rank(report: &ExtractionReport, query: &str) -> Result<RankResult, NotFound> {
    RankResolver::new(report).resolve(query)
}
