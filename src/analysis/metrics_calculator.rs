use tracing::debug;

use crate::models::{AnalyzedStock, DerivedMetrics, FundamentalsRow, YearSeries};

/// Compute trailing statistics for one row against `reference_year`.
///
/// Uses years `reference_year - 1` back to `reference_year - 5`.
pub fn compute(row: &FundamentalsRow, reference_year: i32) -> DerivedMetrics {
    let eps = YearSeries::collect(reference_year, |year| row.eps_for(year));
    let dividends = YearSeries::collect(reference_year, |year| row.dividend_for(year));

    let avg_eps = eps.mean_present();
    let avg_dividend = dividends.mean_present();

    let metrics = DerivedMetrics {
        eps_std_dev: eps.population_std_dev(),
        avg_eps,
        avg_dividend,
        payout_ratio: payout_ratio(avg_dividend, avg_eps),
    };

    if !eps.is_complete() {
        debug!("{}: incomplete EPS history for {}, std-dev unavailable", row.id, reference_year);
    }
    metrics
}

/// Average dividend over average EPS. No clamping: negative EPS gives a negative ratio.
pub fn payout_ratio(avg_dividend: Option<f64>, avg_eps: Option<f64>) -> Option<f64> {
    match (avg_dividend, avg_eps) {
        (Some(dividend), Some(eps)) if eps != 0.0 => Some(dividend / eps),
        _ => None,
    }
}

/// Attach metrics to every row, keeping table order.
pub fn compute_all(rows: Vec<FundamentalsRow>, reference_year: i32) -> Vec<AnalyzedStock> {
    rows.into_iter()
        .map(|row| {
            let metrics = compute(&row, reference_year);
            AnalyzedStock { row, metrics }
        })
        .collect()
}
