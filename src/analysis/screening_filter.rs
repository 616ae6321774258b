use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ScreenerError};
use crate::models::{AnalyzedStock, DerivedMetrics};

/// Closed-interval bounds for the four screened metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreeningBounds {
    pub eps_min: f64,
    pub eps_max: f64,
    pub dividend_min: f64,
    pub dividend_max: f64,
    pub std_dev_min: f64,
    pub std_dev_max: f64,
    pub payout_min: f64,
    pub payout_max: f64,
}

impl Default for ScreeningBounds {
    fn default() -> Self {
        Self {
            eps_min: 1.0,
            eps_max: 1000.0,
            dividend_min: 1.0,
            dividend_max: 1000.0,
            std_dev_min: 0.0,
            std_dev_max: 1.0,
            payout_min: 0.7,
            payout_max: 1.0,
        }
    }
}

impl ScreeningBounds {
    /// Reject pairs whose min exceeds their max.
    pub fn validate(&self) -> Result<()> {
        let pairs = [
            ("eps", self.eps_min, self.eps_max),
            ("dividend", self.dividend_min, self.dividend_max),
            ("std-dev", self.std_dev_min, self.std_dev_max),
            ("payout", self.payout_min, self.payout_max),
        ];
        for (field, min, max) in pairs {
            if min > max {
                return Err(ScreenerError::InvalidBounds { field, min, max });
            }
        }
        Ok(())
    }

    /// True iff every metric is present and inside its interval.
    pub fn admits(&self, metrics: &DerivedMetrics) -> bool {
        within(metrics.avg_eps, self.eps_min, self.eps_max)
            && within(metrics.avg_dividend, self.dividend_min, self.dividend_max)
            && within(metrics.eps_std_dev, self.std_dev_min, self.std_dev_max)
            && within(metrics.payout_ratio, self.payout_min, self.payout_max)
    }
}

fn within(value: Option<f64>, min: f64, max: f64) -> bool {
    value.map_or(false, |v| v >= min && v <= max)
}

/// Keep the stocks admitted by `bounds`, in input order.
pub fn apply(stocks: Vec<AnalyzedStock>, bounds: &ScreeningBounds) -> Vec<AnalyzedStock> {
    let total = stocks.len();
    let passed: Vec<AnalyzedStock> = stocks
        .into_iter()
        .filter(|stock| bounds.admits(&stock.metrics))
        .collect();
    info!("🎯 {} of {} stocks passed screening", passed.len(), total);
    passed
}

/// Stocks whose identifier starts with `prefix`. An empty prefix matches nothing.
pub fn lookup_by_prefix<'a>(stocks: &'a [AnalyzedStock], prefix: &str) -> Vec<&'a AnalyzedStock> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return Vec::new();
    }
    stocks
        .iter()
        .filter(|stock| stock.row.id.starts_with(prefix))
        .collect()
}
