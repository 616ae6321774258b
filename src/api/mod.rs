use anyhow::Result;
use chrono::NaiveDate;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;

use crate::models::DailyClose;

pub mod yahoo_client;
pub use yahoo_client::YahooQuoteClient;

/// Rate limiter shared by every request a client makes
pub struct ApiRateLimiter {
    limiter: DefaultDirectRateLimiter,
}

impl ApiRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        }
    }

    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

/// Source of daily closing prices.
///
/// Symbol formatting such as exchange suffixes is the implementor's concern;
/// callers pass the identifier exactly as it appears in the fundamentals table.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MarketQuoteClient: Send + Sync {
    /// Closes between `start` and `end` inclusive, oldest first.
    async fn get_daily_closes(
        &self,
        identifier: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>>;
}
