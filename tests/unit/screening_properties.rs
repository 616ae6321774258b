//! Range screen properties

use fundamentals_screener::analysis::screening_filter::apply;
use fundamentals_screener::analysis::ScreeningBounds;
use fundamentals_screener::models::{AnalyzedStock, DerivedMetrics, FundamentalsRow};
use pretty_assertions::assert_eq;
use test_log::test;

fn stock(id: &str, eps: f64, dividend: f64, std_dev: f64) -> AnalyzedStock {
    AnalyzedStock {
        row: FundamentalsRow::new(id, id),
        metrics: DerivedMetrics {
            eps_std_dev: Some(std_dev),
            avg_eps: Some(eps),
            avg_dividend: Some(dividend),
            payout_ratio: Some(dividend / eps),
        },
    }
}

fn universe() -> Vec<AnalyzedStock> {
    vec![
        stock("2412", 4.5, 4.2, 0.1),
        stock("2330", 21.3, 9.9, 9.6),
        stock("1216", 3.0, 2.4, 0.4),
        stock("2881", 6.0, 2.0, 0.9),
        stock("2002", 1.5, 1.4, 1.3),
    ]
}

fn ids(stocks: &[AnalyzedStock]) -> Vec<&str> {
    stocks.iter().map(|s| s.row.id.as_str()).collect()
}

#[test]
fn test_default_screen_preserves_input_order() {
    let passed = apply(universe(), &ScreeningBounds::default());
    assert_eq!(ids(&passed), vec!["2412", "1216"]);
}

#[test]
fn test_screen_is_idempotent() {
    let bounds = ScreeningBounds {
        payout_min: 0.3,
        ..ScreeningBounds::default()
    };
    let once = apply(universe(), &bounds);
    let twice = apply(once.clone(), &bounds);
    assert_eq!(once, twice);
}

#[test]
fn test_any_missing_metric_is_excluded_for_every_bounds() {
    let bound_sets = [
        ScreeningBounds::default(),
        ScreeningBounds {
            eps_min: f64::MIN,
            eps_max: f64::MAX,
            dividend_min: f64::MIN,
            dividend_max: f64::MAX,
            std_dev_min: f64::MIN,
            std_dev_max: f64::MAX,
            payout_min: f64::MIN,
            payout_max: f64::MAX,
        },
        ScreeningBounds {
            payout_min: 0.0,
            payout_max: 10.0,
            std_dev_max: 100.0,
            ..ScreeningBounds::default()
        },
    ];

    for bounds in &bound_sets {
        for field in 0..4 {
            let mut gap = stock("9999", 4.5, 4.2, 0.1);
            match field {
                0 => gap.metrics.avg_eps = None,
                1 => gap.metrics.avg_dividend = None,
                2 => gap.metrics.eps_std_dev = None,
                _ => gap.metrics.payout_ratio = None,
            }
            assert!(apply(vec![gap], bounds).is_empty(), "field {} bounds {:?}", field, bounds);
        }
    }
}

#[test]
fn test_empty_input_is_empty_output() {
    assert!(apply(Vec::new(), &ScreeningBounds::default()).is_empty());
}
