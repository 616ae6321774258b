//! End-to-end screening runs with a mocked quote source

use assert_matches::assert_matches;
use fundamentals_screener::analysis::{EnrichmentSettings, QuoteEnricher, ScreeningBounds};
use fundamentals_screener::data::ColumnScheme;
use fundamentals_screener::export::{ExportFormat, ExportOutcome, EXPORT_COLUMNS, SHEET_NAME};
use fundamentals_screener::models::QuoteOutcome;
use fundamentals_screener::pipeline::Uploaded;
use fundamentals_screener::ScreenerError;
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::Arc;
use test_log::test;

use crate::common::logging;
use crate::common::quote_mock::MockQuoteClient;
use crate::common::test_data::{as_of, closes, csv_table, row_with_history, scenario_bounds, xlsx_table, REFERENCE_YEAR};

fn enricher(client: MockQuoteClient) -> QuoteEnricher {
    let settings = EnrichmentSettings {
        retry_attempts: 1,
        retry_backoff: std::time::Duration::from_millis(1),
        ..EnrichmentSettings::default()
    };
    QuoteEnricher::new(Arc::new(client), settings)
}

#[test]
fn test_scenario_a_complete_history_passes() {
    logging::log_test_step("Scenario A");
    let row = row_with_history("1101", [Some(4.0); 5], [Some(2.0); 5]);

    let computed = Uploaded::new(vec![row]).compute_metrics(REFERENCE_YEAR).unwrap();
    let metrics = computed.stocks()[0].metrics;
    assert_eq!(metrics.avg_eps, Some(4.0));
    assert_eq!(metrics.eps_std_dev, Some(0.0));
    assert_eq!(metrics.avg_dividend, Some(2.0));
    assert_eq!(metrics.payout_ratio, Some(0.5));

    let filtered = computed.screen(&scenario_bounds()).unwrap();
    assert_eq!(filtered.stocks().len(), 1);
}

#[test]
fn test_scenario_b_missing_year_is_excluded() {
    let row = row_with_history("1102", [Some(4.0), Some(4.0), None, Some(4.0), Some(4.0)], [Some(2.0); 5]);

    let computed = Uploaded::new(vec![row]).compute_metrics(REFERENCE_YEAR).unwrap();
    assert_eq!(computed.stocks()[0].metrics.eps_std_dev, None);

    let filtered = computed.screen(&scenario_bounds()).unwrap();
    assert!(filtered.is_empty());
}

#[test(tokio::test)]
async fn test_scenario_c_enrichment_of_passing_row() {
    let mut client = MockQuoteClient::new();
    client
        .expect_get_daily_closes()
        .withf(|id, _, end| id == "1101" && *end == as_of())
        .times(1)
        .returning(|_, _, _| Ok(closes(&[100.0, 105.0])));

    let row = row_with_history("1101", [Some(4.0); 5], [Some(2.0); 5]);
    let enriched = Uploaded::new(vec![row])
        .compute_metrics(REFERENCE_YEAR)
        .unwrap()
        .screen(&scenario_bounds())
        .unwrap()
        .enrich(&enricher(client), as_of())
        .await;

    let quote = *enriched.stocks()[0].quote.metrics().unwrap();
    assert_eq!(quote.current_price, 105.0);
    // 105 / 100 - 1, the same convention as [10.0, 10.5] -> 0.05
    assert!((quote.price_change_pct - 0.05).abs() < 1e-12);
    assert_eq!(quote.pe_ratio, Some(105.0 / 4.0));
}

#[test(tokio::test)]
async fn test_only_survivors_are_fetched_and_failures_stay_isolated() {
    let mut client = MockQuoteClient::new();
    client
        .expect_get_daily_closes()
        .withf(|id, _, _| id == "1101")
        .times(1)
        .returning(|_, _, _| Err(anyhow::anyhow!("503 Service Unavailable")));
    client
        .expect_get_daily_closes()
        .withf(|id, _, _| id == "1216")
        .times(1)
        .returning(|_, _, _| Ok(closes(&[50.0, 51.0])));
    client
        .expect_get_daily_closes()
        .withf(|id, _, _| id == "2412")
        .times(1)
        .returning(|_, _, _| Ok(closes(&[120.0])));

    let rows = vec![
        row_with_history("1101", [Some(4.0); 5], [Some(2.0); 5]),
        row_with_history("2330", [Some(30.0), Some(20.0), Some(15.0), Some(12.0), Some(10.0)], [Some(2.0); 5]),
        row_with_history("1216", [Some(3.0); 5], [Some(1.5); 5]),
        row_with_history("2412", [Some(5.0); 5], [Some(2.0); 5]),
    ];
    let enriched = Uploaded::new(rows)
        .compute_metrics(REFERENCE_YEAR)
        .unwrap()
        .screen(&scenario_bounds())
        .unwrap()
        .enrich(&enricher(client), as_of())
        .await;

    let outcomes: Vec<_> = enriched
        .stocks()
        .iter()
        .map(|e| (e.stock.row.id.as_str(), e.quote.is_available()))
        .collect();
    assert_eq!(outcomes, vec![("1101", false), ("1216", true), ("2412", false)]);
    assert_matches!(enriched.stocks()[2].quote, QuoteOutcome::Unavailable);
}

#[test(tokio::test)]
async fn test_empty_screen_fetches_nothing_and_exports_no_rows() {
    let client = MockQuoteClient::new(); // any call would panic

    let row = row_with_history("2330", [Some(30.0), Some(20.0), Some(15.0), Some(12.0), Some(10.0)], [Some(2.0); 5]);
    let filtered = Uploaded::new(vec![row])
        .compute_metrics(REFERENCE_YEAR)
        .unwrap()
        .screen(&scenario_bounds())
        .unwrap();
    assert!(filtered.is_empty());
    assert_eq!(filtered.export().unwrap(), ExportOutcome::NoRows);

    let enriched = filtered.enrich(&enricher(client), as_of()).await;
    assert!(enriched.is_empty());
    assert_eq!(enriched.export().unwrap(), ExportOutcome::NoRows);
}

#[test(tokio::test)]
async fn test_uploaded_file_to_exported_bytes() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(csv_table().as_bytes()).unwrap();

    let mut client = MockQuoteClient::new();
    client
        .expect_get_daily_closes()
        .times(1)
        .returning(|_, _, _| Ok(closes(&[100.0, 105.0])));

    let enriched = Uploaded::from_path(file.path(), &ColumnScheme::default())
        .unwrap()
        .compute_metrics(REFERENCE_YEAR)
        .unwrap()
        .screen(&scenario_bounds())
        .unwrap()
        .enrich(&enricher(client), as_of())
        .await;

    let ExportOutcome::Written(bytes) = enriched.export().unwrap() else {
        panic!("expected exported bytes");
    };
    let text = String::from_utf8(bytes).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[1],
        format!("1101,Taiwan Cement,105.0,{},26.25,0.0,4.0,2.0,0.5", 105.0 / 100.0 - 1.0)
    );
}

#[test(tokio::test)]
async fn test_workbook_upload_to_workbook_export() {
    use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};

    let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
    file.write_all(&xlsx_table()).unwrap();

    let uploaded = Uploaded::from_path(file.path(), &ColumnScheme::default()).unwrap();
    assert_eq!(uploaded.rows().len(), 3);
    assert_eq!(uploaded.rows()[1].eps_by_year.get(&(REFERENCE_YEAR - 2)), Some(&None));

    let mut client = MockQuoteClient::new();
    client
        .expect_get_daily_closes()
        .times(1)
        .returning(|_, _, _| Ok(closes(&[100.0, 105.0])));

    let enriched = uploaded
        .compute_metrics(REFERENCE_YEAR)
        .unwrap()
        .screen(&scenario_bounds())
        .unwrap()
        .enrich(&enricher(client), as_of())
        .await;

    let ExportOutcome::Written(bytes) = enriched.export_as(ExportFormat::Xlsx).unwrap() else {
        panic!("expected exported bytes");
    };
    let mut workbook: Xlsx<_> = open_workbook_from_rs(std::io::Cursor::new(bytes)).unwrap();
    let range = workbook.worksheet_range(SHEET_NAME).unwrap();
    let rows: Vec<&[Data]> = range.rows().collect();

    assert_eq!(rows.len(), 2);
    let headers: Vec<String> = rows[0].iter().map(|c| c.to_string()).collect();
    assert_eq!(headers, EXPORT_COLUMNS.to_vec());
    assert_eq!(rows[1][0], Data::String("1101".to_string()));
    assert_eq!(rows[1][2], Data::Float(105.0));
    assert_eq!(rows[1][4], Data::Float(26.25));
    assert_eq!(rows[1][8], Data::Float(0.5));
}

#[test]
fn test_malformed_upload_stops_before_metrics() {
    let err = Uploaded::from_reader("symbol,2022 EPS\n1101,4\n".as_bytes(), &ColumnScheme::default()).unwrap_err();
    assert_matches!(err, ScreenerError::MissingColumn(column) if column == "id");
}

#[test]
fn test_inverted_bounds_are_rejected() {
    let computed = Uploaded::new(vec![]).compute_metrics(REFERENCE_YEAR).unwrap();
    let bounds = ScreeningBounds {
        eps_min: 10.0,
        eps_max: 1.0,
        ..ScreeningBounds::default()
    };
    assert_matches!(computed.screen(&bounds), Err(ScreenerError::InvalidBounds { field: "eps", .. }));
}
