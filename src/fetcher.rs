//! Backward pagination: walks the cursor from `end` towards `start`, one page
//! at a time, and stitches the pages into a single [`PriceSeries`].

use crate::errors::FetchError;
use crate::price_series::{PricePoint, PriceSeries};
use crate::storage_utils::FetchConfig;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::time::Duration as StdDuration;
use tracing::{info, warn};

/// A source of history pages ending at (and including) `cursor`.
#[async_trait]
pub trait PageSource {
    async fn fetch_page(&self, cursor: DateTime<Utc>) -> Result<Vec<PricePoint>, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: StdDuration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: config.initial_backoff(),
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling each time.
    fn backoff(&self, attempt: u32) -> StdDuration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Result of a pagination run. `halted_by` is set when a page failed for good;
/// `series` still holds everything stitched before that point.
#[derive(Debug)]
pub struct FetchOutcome {
    pub series: PriceSeries,
    pub pages: usize,
    pub halted_by: Option<FetchError>,
}

async fn fetch_page_with_retry<S: PageSource + ?Sized>(
    source: &S,
    cursor: DateTime<Utc>,
    policy: &RetryPolicy,
) -> Result<Vec<PricePoint>, FetchError> {
    let mut attempt = 1;
    loop {
        match source.fetch_page(cursor).await {
            Ok(page) => return Ok(page),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let wait = policy.backoff(attempt);
                warn!(
                    attempt,
                    error = %e,
                    wait_ms = wait.as_millis() as u64,
                    "page request failed, retrying"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

pub async fn fetch_history<S: PageSource + ?Sized>(
    source: &S,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    policy: &RetryPolicy,
) -> FetchOutcome {
    let mut series = PriceSeries::default();
    let mut pages = 0;
    let mut cursor = end;

    while cursor > start {
        let page = match fetch_page_with_retry(source, cursor, policy).await {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    error = %e,
                    points = series.len(),
                    "error fetching data, keeping partial history"
                );
                return FetchOutcome {
                    series,
                    pages,
                    halted_by: Some(e),
                };
            }
        };

        let Some(earliest) = page.iter().map(|p| p.timestamp).min() else {
            info!(cursor = %cursor, "provider returned an empty page, history exhausted");
            break;
        };

        let added = series.prepend_page(page);
        pages += 1;
        info!(page = pages, added, earliest = %earliest, "stitched page");

        let next = earliest - Duration::hours(1);
        if next >= cursor {
            warn!(
                cursor = %cursor,
                earliest = %earliest,
                "page did not move the cursor back, stopping"
            );
            break;
        }
        cursor = next;
    }

    FetchOutcome {
        series,
        pages,
        halted_by: None,
    }
}
