use crate::analyzer::{CohortPosition, CohortStanding, NotFound, RankResolver, RankResult};
use crate::models::{CandidateRecord, Cohort, CohortKind, ExtractionReport};
use anyhow::Result;
use chrono::DateTime;
use csv::Writer;
use std::fs;
use std::path::Path;

pub fn format_timestamp(epoch_seconds: i64) -> String {
    DateTime::from_timestamp(epoch_seconds, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| epoch_seconds.to_string())
}

fn format_score(score: Option<f64>) -> String {
    score.map(|s| format!("{:.2}", s)).unwrap_or_else(|| "—".to_string())
}

pub fn format_standing(position: &CohortPosition) -> String {
    match position.standing {
        CohortStanding::Member { rank } => format!("#{} of {}", rank, position.cohort_size),
        CohortStanding::Absent {
            positional_estimate,
        } => format!(
            "not in cohort (would be #{} of {})",
            positional_estimate,
            position.cohort_size + 1
        ),
    }
}

/// Console summary of a report plus the standing of each queried candidate.
pub fn render_summary(
    report: &ExtractionReport,
    ranks: &[(String, Result<RankResult, NotFound>)],
) -> String {
    let mut content = String::new();
    content.push_str("📊 ENROLLMENT LIST\n");
    content.push_str("==================\n");
    content.push_str(&format!("   Contracts: {}\n", report.contract_count));
    content.push_str(&format!("   Paid: {}\n", report.paid_count));
    content.push_str(&format!(
        "   Last check (UTC): {}\n",
        format_timestamp(report.fetched_at_epoch_seconds)
    ));
    content.push_str(&format!(
        "   Report note: {}\n",
        report
            .header_note
            .as_ref()
            .and_then(|note| note.as_text())
            .unwrap_or_else(|| "—".to_string())
    ));

    for (query, outcome) in ranks {
        content.push('\n');
        match outcome {
            Ok(result) => {
                content.push_str(&format!(
                    "🎯 Candidate {} (row {})\n",
                    result.identifier_raw.as_deref().unwrap_or(query),
                    result.row_position
                ));
                content.push_str(&format!("   Score: {}\n", format_score(result.score)));
                content.push_str(&format!(
                    "   {}: {}\n",
                    CohortKind::Contract.label(),
                    format_standing(&result.contract)
                ));
                content.push_str(&format!(
                    "   {}: {}\n",
                    CohortKind::Paid.label(),
                    format_standing(&result.paid)
                ));
            }
            Err(err) => {
                content.push_str(&format!("❓ {}\n", err));
            }
        }
    }

    content
}

pub fn render_debug(report: &ExtractionReport) -> String {
    format!(
        "URL: {}\nReport note: {}\nContracts: {}\nPaid: {}\nFetched at: {}\n",
        report.source,
        report
            .header_note
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        report.contract_count,
        report.paid_count,
        report.fetched_at_epoch_seconds
    )
}

fn rank_cell(cohort: &Cohort, record: &CandidateRecord, all: &[CandidateRecord]) -> String {
    cohort
        .membership_rank(record.row_position, all)
        .map(|rank| rank.to_string())
        .unwrap_or_default()
}

fn bool_cell(value: bool) -> &'static str {
    if value {
        "Да"
    } else {
        "Нет"
    }
}

/// Writes `all_records.csv`, `contract_cohort.csv` and `paid_cohort.csv`.
pub fn export_csv(report: &ExtractionReport, output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)?;
    let all = &report.all_records;

    let mut writer = Writer::from_path(output_dir.join("all_records.csv"))?;
    writer.write_record([
        "Row",
        "Identifier",
        "Canonical_Identifier",
        "Contract",
        "Paid",
        "Score",
        "Contract_Rank",
        "Paid_Rank",
    ])?;
    for record in all {
        writer.write_record([
            record.row_position.to_string(),
            record.identifier_raw.clone().unwrap_or_default(),
            record.identifier_canonical.clone().unwrap_or_default(),
            bool_cell(record.has_contract).to_string(),
            bool_cell(record.has_paid).to_string(),
            record.score.map(|s| s.to_string()).unwrap_or_default(),
            rank_cell(&report.contract_cohort, record, all),
            rank_cell(&report.paid_cohort, record, all),
        ])?;
    }
    writer.flush()?;

    for cohort in [&report.contract_cohort, &report.paid_cohort] {
        let file_name = match cohort.kind {
            CohortKind::Contract => "contract_cohort.csv",
            CohortKind::Paid => "paid_cohort.csv",
        };
        let mut writer = Writer::from_path(output_dir.join(file_name))?;
        writer.write_record(["Rank", "Row", "Identifier", "Score"])?;
        for (i, record) in cohort.records(all).enumerate() {
            writer.write_record([
                (i + 1).to_string(),
                record.row_position.to_string(),
                record.identifier_raw.clone().unwrap_or_default(),
                record.score.map(|s| s.to_string()).unwrap_or_default(),
            ])?;
        }
        writer.flush()?;
    }

    Ok(())
}

/// Resolves every query against the report, keeping the query text for display.
pub fn resolve_all(
    report: &ExtractionReport,
    queries: &[String],
) -> Vec<(String, Result<RankResult, NotFound>)> {
    let resolver = RankResolver::new(report);
    queries
        .iter()
        .map(|query| (query.clone(), resolver.resolve(query)))
        .collect()
}
