//! Live-quote enrichment for screened stocks.
//!
//! Every row gets its own fetch; a failure, timeout or thin response only
//! marks that row `Unavailable`.

use chrono::{Duration, NaiveDate};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::MarketQuoteClient;
use crate::models::{AnalyzedStock, Config, DailyClose, EnrichedStock, QuoteMetrics, QuoteOutcome};

/// Calendar days of closes requested per stock.
pub const LOOKBACK_DAYS: i64 = 7;

/// Observations needed to compute a day-over-day change.
pub const MIN_OBSERVATIONS: usize = 2;

#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    pub fetch_timeout: std::time::Duration,
    pub retry_attempts: u32,
    pub retry_backoff: std::time::Duration,
    pub max_concurrent_fetches: usize,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: std::time::Duration::from_secs(10),
            retry_attempts: 2,
            retry_backoff: std::time::Duration::from_millis(500),
            max_concurrent_fetches: 4,
        }
    }
}

impl From<&Config> for EnrichmentSettings {
    fn from(config: &Config) -> Self {
        Self {
            fetch_timeout: std::time::Duration::from_secs(config.fetch_timeout_secs),
            retry_attempts: config.retry_attempts,
            max_concurrent_fetches: config.max_concurrent_fetches,
            ..Self::default()
        }
    }
}

/// Derive quote metrics from a close series. Needs at least two observations.
pub fn quote_metrics(closes: &[DailyClose], avg_eps: Option<f64>) -> QuoteOutcome {
    if closes.len() < MIN_OBSERVATIONS {
        return QuoteOutcome::Unavailable;
    }
    let mut ordered = closes.to_vec();
    ordered.sort_by_key(|bar| bar.date);

    let current_price = ordered[ordered.len() - 1].close;
    let previous_close = ordered[ordered.len() - 2].close;

    QuoteOutcome::Available(QuoteMetrics {
        current_price,
        price_change_pct: current_price / previous_close - 1.0,
        pe_ratio: avg_eps.filter(|eps| *eps != 0.0).map(|eps| current_price / eps),
    })
}

pub struct QuoteEnricher {
    client: Arc<dyn MarketQuoteClient>,
    settings: EnrichmentSettings,
}

impl QuoteEnricher {
    pub fn new(client: Arc<dyn MarketQuoteClient>, settings: EnrichmentSettings) -> Self {
        Self { client, settings }
    }

    /// Fetch `[as_of - 7 days, as_of]` for one stock and derive its quote metrics.
    pub async fn enrich(&self, stock: &AnalyzedStock, as_of: NaiveDate) -> QuoteOutcome {
        let start = as_of - Duration::days(LOOKBACK_DAYS);
        match self.fetch_with_retry(&stock.row.id, start, as_of).await {
            Some(closes) => {
                let outcome = quote_metrics(&closes, stock.metrics.avg_eps);
                if !outcome.is_available() {
                    debug!("{}: only {} closes since {}", stock.row.id, closes.len(), start);
                }
                outcome
            }
            None => QuoteOutcome::Unavailable,
        }
    }

    /// Enrich every stock with bounded concurrency, keeping input order.
    pub async fn enrich_all(&self, stocks: Vec<AnalyzedStock>, as_of: NaiveDate) -> Vec<EnrichedStock> {
        if stocks.is_empty() {
            return Vec::new();
        }
        let total = stocks.len();
        info!("🔄 Fetching quotes for {} stocks ({} at a time)", total, self.settings.max_concurrent_fetches.max(1));

        let enriched: Vec<EnrichedStock> = stream::iter(stocks)
            .map(|stock| async move {
                let quote = self.enrich(&stock, as_of).await;
                EnrichedStock { stock, quote }
            })
            .buffered(self.settings.max_concurrent_fetches.max(1))
            .collect()
            .await;

        let available = enriched.iter().filter(|e| e.quote.is_available()).count();
        info!("✅ Quotes available for {} of {} stocks", available, total);
        enriched
    }

    /// `None` once every attempt has errored or timed out.
    async fn fetch_with_retry(&self, identifier: &str, start: NaiveDate, end: NaiveDate) -> Option<Vec<DailyClose>> {
        let attempts = self.settings.retry_attempts.max(1);
        for attempt in 1..=attempts {
            let fetch = self.client.get_daily_closes(identifier, start, end);
            match tokio::time::timeout(self.settings.fetch_timeout, fetch).await {
                Ok(Ok(closes)) => return Some(closes),
                Ok(Err(e)) => warn!("Attempt {} failed for {}: {}", attempt, identifier, e),
                Err(_) => warn!("Attempt {} timed out for {} after {:?}", attempt, identifier, self.settings.fetch_timeout),
            }
            if attempt < attempts {
                tokio::time::sleep(self.settings.retry_backoff).await;
            }
        }
        warn!("Quote unavailable for {} after {} attempts", identifier, attempts);
        None
    }
}
