//! Background summary sweep.
//!
//! [`SummarySweep`] runs once at startup and then every UTC midnight,
//! queueing a session-less Summarize job for every stored article that
//! has no summary yet.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, Utc};
use maple_backend::{ArticleStore, BackendError};
use maple_core::{Credential, JobPayload};
use tokio_util::sync::CancellationToken;

use crate::broker::{Broker, Submission};

pub struct SummarySweep {
    store: Arc<dyn ArticleStore>,
    broker: Arc<Broker>,
    credential: Credential,
    page_size: u32,
}

impl SummarySweep {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        broker: Arc<Broker>,
        credential: Credential,
        page_size: u32,
    ) -> Self {
        Self {
            store,
            broker,
            credential,
            page_size,
        }
    }

    /// Sweep now, then again at each UTC midnight until `cancel` fires.
    ///
    /// A failed sweep is logged and retried on the next cycle.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            match self.sweep_once().await {
                Ok(queued) => tracing::info!(queued, "Summary sweep finished"),
                Err(e) => tracing::error!(error = %e, "Summary sweep failed"),
            }

            let wait = until_next_utc_midnight(Utc::now());
            tracing::info!(
                hours = wait.as_secs_f64() / 3600.0,
                "Next summary sweep scheduled",
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Summary sweep cancelled");
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Page through every article once. Returns how many jobs were queued.
    ///
    /// Stops at the first short page, or at a page that brings no article
    /// not already seen in this sweep.
    pub async fn sweep_once(&self) -> Result<usize, BackendError> {
        tracing::info!("Fetching articles without chat summary");
        let mut seen = HashSet::new();
        let mut queued = 0;
        let mut page = 0;

        loop {
            let articles = self.store.articles_page(self.page_size, page).await?;
            let last_page = articles.len() < self.page_size as usize;

            let fresh: Vec<_> = articles
                .into_iter()
                .filter(|article| seen.insert(article.uuid.clone()))
                .collect();
            if fresh.is_empty() {
                if !last_page {
                    tracing::warn!(page, "Article page repeats earlier pages, ending sweep");
                }
                return Ok(queued);
            }

            for article in fresh.iter().filter(|a| !a.has_summary()) {
                let payload = JobPayload::Summarize {
                    request_id: article.uuid.as_str().into(),
                    text: None,
                };
                if self.broker.submit_background(self.credential.clone(), payload) == Submission::Queued {
                    queued += 1;
                }
            }

            if last_page {
                return Ok(queued);
            }
            page += 1;
        }
    }
}

/// Time left until the next 00:00 UTC.
pub fn until_next_utc_midnight(now: DateTime<Utc>) -> Duration {
    let midnight = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc());

    match midnight {
        Some(midnight) => (midnight - now).to_std().unwrap_or(Duration::ZERO),
        None => Duration::from_secs(24 * 3600),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn midnight_wait_from_late_evening() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 22, 30, 0).unwrap();
        assert_eq!(until_next_utc_midnight(now), Duration::from_secs(90 * 60));
    }

    #[test]
    fn midnight_wait_at_midnight_is_a_full_day() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap();
        assert_eq!(until_next_utc_midnight(now), Duration::from_secs(24 * 3600));
    }
}
