use crate::cells::{coerce_identifier, coerce_score, coerce_yes_flag, CellGrid};
use crate::models::{
    normalize_label, CandidateRecord, Cohort, CohortKind, ExtractionReport, SheetLayout,
};
use tracing::debug;

/// Columns resolved from the header row, reused for every data row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaDescriptor {
    pub identifier_column: u32,
    pub score_column: u32,
}

/// Scans the header row for the identifier and score labels. The first
/// matching column wins; a missing label falls back to its fixed column.
pub fn locate_schema<G: CellGrid>(grid: &G, layout: &SheetLayout) -> SchemaDescriptor {
    let mut identifier_column = None;
    let mut score_column = None;

    for column in 1..=layout.header_scan_columns {
        let label = match grid.cell(layout.header_row, column).and_then(|c| c.as_text()) {
            Some(text) => normalize_label(&text),
            None => continue,
        };

        if identifier_column.is_none() && label == layout.identifier_label {
            identifier_column = Some(column);
        } else if score_column.is_none() && label == layout.score_label {
            score_column = Some(column);
        }

        if identifier_column.is_some() && score_column.is_some() {
            break;
        }
    }

    if identifier_column.is_none() {
        debug!(
            column = layout.identifier_fallback_column,
            "identifier header not found, using fallback column"
        );
    }
    if score_column.is_none() {
        debug!(
            column = layout.score_fallback_column,
            "score header not found, using fallback column"
        );
    }

    SchemaDescriptor {
        identifier_column: identifier_column.unwrap_or(layout.identifier_fallback_column),
        score_column: score_column.unwrap_or(layout.score_fallback_column),
    }
}

/// Builds one record per row of the configured data window, blank rows included.
pub fn extract_records<G: CellGrid>(
    grid: &G,
    layout: &SheetLayout,
    schema: SchemaDescriptor,
) -> Vec<CandidateRecord> {
    // Every row in the window yields a record, even when all its cells are empty
    (layout.first_data_row..=layout.last_data_row)
        .map(|row| {
            // Identifier comes from the column found in the header row
            let (identifier_raw, identifier_canonical) =
                coerce_identifier(grid.cell(row, schema.identifier_column).as_ref());

            // Status flags sit in fixed columns
            let has_contract = coerce_yes_flag(grid.cell(row, layout.contract_column).as_ref());
            let has_paid = coerce_yes_flag(grid.cell(row, layout.paid_column).as_ref());

            // Unparseable scores become None instead of failing the row
            let score = coerce_score(grid.cell(row, schema.score_column).as_ref());

            CandidateRecord {
                row_position: row,
                identifier_raw,
                identifier_canonical,
                has_contract,
                has_paid,
                score,
            }
        })
        .collect()
}

/// Collects the members of one cohort, keeping row order.
pub fn index_cohort(kind: CohortKind, records: &[CandidateRecord]) -> Cohort {
    Cohort::index(kind, records)
}

impl ExtractionReport {
    /// Assembles a report from already extracted records.
    pub fn assemble(
        source: impl Into<String>,
        header_note: Option<crate::cells::CellValue>,
        all_records: Vec<CandidateRecord>,
        fetched_at_epoch_seconds: i64,
    ) -> Self {
        let contract_cohort = index_cohort(CohortKind::Contract, &all_records);
        let paid_cohort = index_cohort(CohortKind::Paid, &all_records);

        Self {
            source: source.into(),
            header_note,
            contract_count: contract_cohort.len(),
            paid_count: paid_cohort.len(),
            all_records,
            contract_cohort,
            paid_cohort,
            fetched_at_epoch_seconds,
        }
    }
}

/// Runs the full extraction over a worksheet: schema first, then rows, then cohorts.
pub fn extract_report<G: CellGrid>(
    grid: &G,
    layout: &SheetLayout,
    source: &str,
    fetched_at_epoch_seconds: i64,
) -> ExtractionReport {
    let schema = locate_schema(grid, layout);
    let records = extract_records(grid, layout, schema);
    let (note_row, note_column) = layout.report_date_cell;
    let header_note = grid.cell(note_row, note_column);

    let report = ExtractionReport::assemble(source, header_note, records, fetched_at_epoch_seconds);
    debug!(
        source,
        rows = report.all_records.len(),
        contracts = report.contract_count,
        paid = report.paid_count,
        "extraction finished"
    );
    report
}
