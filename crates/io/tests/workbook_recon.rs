use rust_xlsxwriter::Workbook;
use tally_io::{export, ingest};
use tally_recon::{run, ReconInput, RunConfig};

/// Two tabs: a summary, then the detail table under a banner row.
fn payments_workbook() -> Vec<u8> {
    let mut wb = Workbook::new();

    let ws = wb.add_worksheet();
    ws.set_name("요약").unwrap();
    ws.write_string(0, 0, "전화번호").unwrap();
    ws.write_string(0, 1, "결제금액").unwrap();
    ws.write_string(1, 0, "합계").unwrap();
    ws.write_number(1, 1, 80000.0).unwrap();

    let ws = wb.add_worksheet();
    ws.set_name("상세").unwrap();
    ws.write_string(0, 0, "3월 결제 내역").unwrap();
    for (col, h) in ["구매자", "전화번호", "결제금액", "결제일"].iter().enumerate() {
        ws.write_string(2, col as u16, *h).unwrap();
    }
    // Phone stored as a number: leading zero lost.
    ws.write_string(3, 0, "김철수").unwrap();
    ws.write_number(3, 1, 1011112222.0).unwrap();
    ws.write_number(3, 2, 50000.0).unwrap();
    ws.write_number(3, 3, 45353.0).unwrap();
    ws.write_string(4, 0, "이영희").unwrap();
    ws.write_string(4, 1, "010-3333-4444").unwrap();
    ws.write_number(4, 2, 30000.0).unwrap();
    ws.write_number(4, 3, 45354.0).unwrap();

    wb.save_to_buffer().unwrap()
}

const CONFIG: &str = r#"
name = "workbook"
[[sources]]
file = "tracking.csv"
[target]
file = "payments.xlsx"
select_table = true
"#;

#[test]
fn test_selects_detail_sheet_and_matches() {
    let config = RunConfig::from_toml(CONFIG).unwrap();
    let tracking = "이름,연락처,유입경로\nkim,010-1111-2222,메타\nlee,010-3333-4444,지인추천\n";

    let input = ReconInput {
        sources: vec![ingest(tracking.as_bytes(), "tracking.csv").unwrap()],
        target: ingest(&payments_workbook(), "payments.xlsx").unwrap(),
    };
    let outcome = run(&config, &input).unwrap();

    let target = outcome.tables.last().unwrap();
    assert_eq!(target.sheet, "상세");
    assert_eq!(target.header_row, 1);

    let rows = &outcome.result.rows;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].category, "메타");
    assert_eq!(rows[0].phone, "1011112222");
    assert_eq!(rows[1].category, "지인추천");
    assert_eq!(outcome.result.total_revenue, 80000);
    assert!(outcome.report.is_conserved());

    // Exported phone keeps the source display and is marked as text.
    let csv = String::from_utf8(export::csv_bytes(rows).unwrap()).unwrap();
    assert!(csv.contains("'1011112222"));
}
