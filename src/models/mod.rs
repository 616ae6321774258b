use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of trailing fiscal years every metric is computed over.
pub const TRAILING_YEARS: usize = 5;

/// One stock from the uploaded fundamentals table.
///
/// Year maps are keyed by calendar year exactly as found in the column headers, so
/// the same table can be analysed against any reference year. A `None` value means
/// the column existed but the cell was empty or unreadable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsRow {
    pub id: String,
    pub name: String,
    pub eps_by_year: BTreeMap<i32, Option<f64>>,
    pub dividend_by_year: BTreeMap<i32, Option<f64>>,
}

impl FundamentalsRow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            eps_by_year: BTreeMap::new(),
            dividend_by_year: BTreeMap::new(),
        }
    }

    /// Value recorded for `year`, flattening "no column" and "empty cell" into absence.
    pub fn eps_for(&self, year: i32) -> Option<f64> {
        self.eps_by_year.get(&year).copied().flatten()
    }

    pub fn dividend_for(&self, year: i32) -> Option<f64> {
        self.dividend_by_year.get(&year).copied().flatten()
    }
}

/// Five trailing slots, most recent year first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearSeries(pub [Option<f64>; TRAILING_YEARS]);

impl YearSeries {
    /// Build the series for `reference_year - 1 ..= reference_year - 5`.
    ///
    /// Years saturate at `i32::MIN`, so out-of-range reference years read no real data.
    pub fn collect(reference_year: i32, lookup: impl Fn(i32) -> Option<f64>) -> Self {
        let mut slots = [None; TRAILING_YEARS];
        for (offset, slot) in slots.iter_mut().enumerate() {
            *slot = lookup(reference_year.saturating_sub(1).saturating_sub(offset as i32));
        }
        Self(slots)
    }

    pub fn present(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().filter_map(|v| *v)
    }

    pub fn is_complete(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    /// Mean over present slots only; missing years drop out of both sum and count.
    pub fn mean_present(&self) -> Option<f64> {
        let (sum, count) = self
            .present()
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    /// Population (divide-by-N) standard deviation. All five slots must be present.
    pub fn population_std_dev(&self) -> Option<f64> {
        if !self.is_complete() {
            return None;
        }
        let n = TRAILING_YEARS as f64;
        let mean = self.present().sum::<f64>() / n;
        let variance = self.present().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(variance.sqrt())
    }
}

/// Statistics derived from a row's trailing history.
///
/// Two policies for missing years coexist on purpose:
/// - `eps_std_dev` is all-or-nothing: one absent year makes it `None`.
/// - `avg_eps` and `avg_dividend` skip absent years and average what is left.
///
/// A row with a gap therefore still has averages but can never pass a screen,
/// because the screen requires all four metrics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub eps_std_dev: Option<f64>,
    pub avg_eps: Option<f64>,
    pub avg_dividend: Option<f64>,
    pub payout_ratio: Option<f64>,
}

/// A fundamentals row with its metrics attached.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedStock {
    pub row: FundamentalsRow,
    pub metrics: DerivedMetrics,
}

/// One daily closing price from the market-data source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

/// Live-quote figures for a stock that passed screening.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuoteMetrics {
    pub current_price: f64,
    /// Fraction, not percent: 0.05 means +5%.
    pub price_change_pct: f64,
    pub pe_ratio: Option<f64>,
}

/// Result of enriching one row. `Unavailable` covers too few observations,
/// fetch errors and timeouts alike.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuoteOutcome {
    Available(QuoteMetrics),
    Unavailable,
}

impl QuoteOutcome {
    pub fn metrics(&self) -> Option<&QuoteMetrics> {
        match self {
            QuoteOutcome::Available(metrics) => Some(metrics),
            QuoteOutcome::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, QuoteOutcome::Available(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedStock {
    pub stock: AnalyzedStock,
    pub quote: QuoteOutcome,
}

/// Configuration for the binary shell
#[derive(Debug, Clone)]
pub struct Config {
    pub quote_base_url: String,
    pub exchange_suffix: String,
    pub rate_limit_per_minute: u32,
    pub fetch_timeout_secs: u64,
    pub retry_attempts: u32,
    pub max_concurrent_fetches: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quote_base_url: "https://query1.finance.yahoo.com".to_string(),
            exchange_suffix: ".TW".to_string(),
            rate_limit_per_minute: 120,
            fetch_timeout_secs: 10,
            retry_attempts: 2,
            max_concurrent_fetches: 4,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok(); // Load .env file if it exists
        let defaults = Self::default();

        Config {
            quote_base_url: std::env::var("QUOTE_BASE_URL").unwrap_or(defaults.quote_base_url),
            exchange_suffix: std::env::var("EXCHANGE_SUFFIX").unwrap_or(defaults.exchange_suffix),
            rate_limit_per_minute: env_parse("RATE_LIMIT_PER_MINUTE", defaults.rate_limit_per_minute),
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS", defaults.fetch_timeout_secs),
            retry_attempts: env_parse("RETRY_ATTEMPTS", defaults.retry_attempts),
            max_concurrent_fetches: env_parse("MAX_CONCURRENT_FETCHES", defaults.max_concurrent_fetches),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
