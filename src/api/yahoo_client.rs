use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{ApiRateLimiter, MarketQuoteClient};
use crate::models::{Config, DailyClose};

/// Chart endpoint payload
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

impl ChartResult {
    /// Pair timestamps with closes, dropping bars with no close.
    fn into_closes(self) -> Vec<DailyClose> {
        let offset = self.meta.map_or(0, |meta| meta.gmtoffset);
        let closes = self
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|series| series.close)
            .unwrap_or_default();

        let mut daily: Vec<DailyClose> = self
            .timestamp
            .into_iter()
            .zip(closes)
            .filter_map(|(timestamp, close)| {
                let close = close.filter(|c| c.is_finite())?;
                let date = DateTime::from_timestamp(timestamp + offset, 0)?.date_naive();
                Some(DailyClose { date, close })
            })
            .collect();
        daily.sort_by_key(|bar| bar.date);
        daily
    }
}

/// Yahoo Finance daily chart client
pub struct YahooQuoteClient {
    client: Client,
    base_url: String,
    exchange_suffix: String,
    rate_limiter: ApiRateLimiter,
}

impl YahooQuoteClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.fetch_timeout_secs.max(1)))
            .user_agent("fundamentals-screener/0.1")
            .build()?;

        Ok(Self {
            client,
            base_url: config.quote_base_url.trim_end_matches('/').to_string(),
            exchange_suffix: config.exchange_suffix.clone(),
            rate_limiter: ApiRateLimiter::new(config.rate_limit_per_minute),
        })
    }

    pub fn symbol_for(&self, identifier: &str) -> String {
        format!("{}{}", identifier.trim(), self.exchange_suffix)
    }

    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("quote base url {} cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        // period2 is exclusive, so extend it to the start of the following day
        let period1 = start.and_hms_opt(0, 0, 0).ok_or_else(|| anyhow!("invalid start date {}", start))?;
        let period2 = (end + Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("invalid end date {}", end))?;
        url.query_pairs_mut()
            .append_pair("period1", &period1.and_utc().timestamp().to_string())
            .append_pair("period2", &period2.and_utc().timestamp().to_string())
            .append_pair("interval", "1d");
        Ok(url)
    }
}

#[async_trait::async_trait]
impl MarketQuoteClient for YahooQuoteClient {
    async fn get_daily_closes(
        &self,
        identifier: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>> {
        let symbol = self.symbol_for(identifier);
        let url = self.chart_url(&symbol, start, end)?;

        self.rate_limiter.wait().await;
        debug!("Making request to: {}", url);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Chart request for {} failed with status {}: {}", symbol, status, error_text));
        }

        let payload: ChartResponse = response.json().await?;
        if let Some(error) = payload.chart.error {
            return Err(anyhow!(
                "Chart error for {}: {} {}",
                symbol,
                error.code,
                error.description.unwrap_or_default()
            ));
        }

        let closes = match payload.chart.result.and_then(|results| results.into_iter().next()) {
            Some(result) => result.into_closes(),
            None => {
                warn!("[{}] chart response carried no result; treating as no data", symbol);
                Vec::new()
            }
        };

        debug!("Retrieved {} closes for {} from {} to {}", closes.len(), symbol, start, end);
        Ok(closes)
    }
}
