use hse_list_monitor::{
    extract_report, resolve_rank, CellValue, CohortStanding, NotFound, SheetLayout,
};
use std::collections::BTreeMap;

type Grid = BTreeMap<(u32, u32), CellValue>;

const CONTRACT: u32 = 8;
const PAID: u32 = 9;

fn header_row(grid: &mut Grid) {
    grid.insert(
        (20, 1),
        CellValue::text("Дата формирования списка: 01.08.2025 12:00"),
    );
    grid.insert((21, 3), CellValue::text("Регистрационный номер"));
    grid.insert((21, 6), CellValue::text("Сумма конкурсных баллов"));
}

fn candidate(
    grid: &mut Grid,
    row: u32,
    id: &str,
    contract: bool,
    paid: bool,
    score: Option<CellValue>,
) {
    let flag = |yes: bool| CellValue::text(if yes { "Да" } else { "Нет" });
    grid.insert((row, 3), CellValue::text(id));
    grid.insert((row, CONTRACT), flag(contract));
    grid.insert((row, PAID), flag(paid));
    if let Some(score) = score {
        grid.insert((row, 6), score);
    }
}

fn three_candidates() -> Grid {
    let mut grid = Grid::new();
    header_row(&mut grid);
    candidate(&mut grid, 22, "100", true, false, Some(CellValue::text("90,5")));
    candidate(&mut grid, 23, "200", true, true, Some(CellValue::text("85")));
    candidate(&mut grid, 24, "300", false, true, None);
    grid
}

#[test]
fn three_row_list_builds_both_cohorts() {
    let report = extract_report(&three_candidates(), &SheetLayout::default(), "fixture", 42);

    let contract_ids: Vec<&str> = report
        .contract_cohort
        .records(&report.all_records)
        .filter_map(|r| r.identifier_raw.as_deref())
        .collect();
    let paid_ids: Vec<&str> = report
        .paid_cohort
        .records(&report.all_records)
        .filter_map(|r| r.identifier_raw.as_deref())
        .collect();

    assert_eq!(contract_ids, vec!["100", "200"]);
    assert_eq!(paid_ids, vec!["200", "300"]);
    assert_eq!(report.contract_count, 2);
    assert_eq!(report.paid_count, 2);
    assert_eq!(report.all_records.len(), 479);
    assert_eq!(report.all_records[0].score, Some(90.5));
    assert_eq!(
        report.header_note,
        Some(CellValue::text("Дата формирования списка: 01.08.2025 12:00"))
    );
}

#[test]
fn three_row_list_ranks_paid_only_candidate() {
    let report = extract_report(&three_candidates(), &SheetLayout::default(), "fixture", 42);
    let result = resolve_rank(&report, "300").expect("candidate 300 present");

    assert_eq!(result.score, None);
    assert_eq!(
        result.contract.standing,
        CohortStanding::Absent {
            positional_estimate: 3
        }
    );
    assert_eq!(result.paid.standing, CohortStanding::Member { rank: 2 });
}

#[test]
fn three_row_list_ranks_members_of_both_cohorts() {
    let report = extract_report(&three_candidates(), &SheetLayout::default(), "fixture", 42);
    let first = resolve_rank(&report, "100").expect("candidate 100 present");
    let second = resolve_rank(&report, "200").expect("candidate 200 present");

    assert_eq!(first.score, Some(90.5));
    assert_eq!(first.contract.standing.membership_rank(), Some(1));
    assert_eq!(first.paid.standing.positional_estimate(), Some(1));
    assert_eq!(second.score, Some(85.0));
    assert_eq!(second.contract.standing.membership_rank(), Some(2));
    assert_eq!(second.paid.standing.membership_rank(), Some(1));
}

#[test]
fn unknown_candidate_is_not_found_and_counts_are_untouched() {
    let report = extract_report(&three_candidates(), &SheetLayout::default(), "fixture", 42);

    assert_eq!(
        resolve_rank(&report, "4242"),
        Err(NotFound {
            query: "4242".to_string()
        })
    );
    assert_eq!(report.contract_count, 2);
    assert_eq!(report.paid_count, 2);
}

#[test]
fn membership_ranks_are_contiguous_in_row_order() {
    let mut grid = Grid::new();
    header_row(&mut grid);
    for i in 0..60u32 {
        let row = 22 + i * 7;
        candidate(&mut grid, row, &format!("{:05}", i + 1), i % 3 != 0, i % 2 == 0, None);
    }

    let report = extract_report(&grid, &SheetLayout::default(), "fixture", 0);
    let mut ranks = Vec::new();
    let mut last_row = 0;
    for record in report.contract_cohort.records(&report.all_records) {
        assert!(record.row_position > last_row);
        last_row = record.row_position;

        let id = record.identifier_raw.as_deref().expect("member has an id");
        let result = resolve_rank(&report, id).expect("member resolves");
        ranks.push(result.contract.standing.membership_rank().expect("member rank"));
    }

    let expected: Vec<usize> = (1..=report.contract_count).collect();
    assert_eq!(ranks, expected);
    assert_eq!(report.contract_count, 40);
}

#[test]
fn identifiers_match_by_canonical_form() {
    let mut grid = Grid::new();
    header_row(&mut grid);
    candidate(&mut grid, 22, "0012345", true, false, Some(CellValue::Number(77.25)));

    let report = extract_report(&grid, &SheetLayout::default(), "fixture", 0);
    let result = resolve_rank(&report, "12345").expect("canonical match");
    assert_eq!(result.identifier_raw.as_deref(), Some("0012345"));
    assert_eq!(result.score, Some(77.25));
}

#[test]
fn missing_headers_use_fallback_columns() {
    let mut grid = Grid::new();
    grid.insert((22, 2), CellValue::text("555"));
    grid.insert((22, 5), CellValue::text("1\u{a0}234,5"));
    grid.insert((22, CONTRACT), CellValue::text(" да "));

    let report = extract_report(&grid, &SheetLayout::default(), "fixture", 0);
    let result = resolve_rank(&report, "555").expect("fallback identifier column");
    assert_eq!(result.score, Some(1234.5));
    assert_eq!(result.contract.standing, CohortStanding::Member { rank: 1 });
    assert_eq!(report.header_note, None);
}

#[test]
fn rows_outside_window_are_ignored() {
    let mut grid = three_candidates();
    candidate(&mut grid, 501, "901", true, true, None);

    let report = extract_report(&grid, &SheetLayout::default(), "fixture", 0);
    assert_eq!(report.contract_count, 2);
    assert!(resolve_rank(&report, "901").is_err());
    assert_eq!(report.all_records.first().map(|r| r.row_position), Some(22));
    assert_eq!(report.all_records.last().map(|r| r.row_position), Some(500));
}
