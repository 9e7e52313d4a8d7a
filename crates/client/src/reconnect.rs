//! Reconnection to the broker after a dropped connection.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::transport::{WsConnector, WsStream};

/// Exponential backoff: 1 s, doubling, capped at 30 s.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub first: Duration,
    pub cap: Duration,
    pub factor: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            factor: 2,
        }
    }
}

impl BackoffPolicy {
    /// The endless sequence of waits between attempts.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let policy = *self;
        std::iter::successors(Some(policy.first.min(policy.cap)), move |prev| {
            Some(prev.saturating_mul(policy.factor).min(policy.cap))
        })
    }
}

/// Keep dialing the broker until it answers or `cancel` fires.
///
/// Every attempt, the first included, is preceded by the next backoff
/// delay.
pub async fn reconnect_loop(
    connector: &WsConnector,
    policy: &BackoffPolicy,
    cancel: &CancellationToken,
) -> Option<WsStream> {
    for (attempt, delay) in (1u32..).zip(policy.delays()) {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(url = %connector.url(), "Stopped reconnecting");
                return None;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => return None,
            result = connector.connect() => result,
        };

        match result {
            Ok(ws_stream) => {
                tracing::info!(url = %connector.url(), attempt, "Broker connection restored");
                return Some(ws_stream);
            }
            Err(e) => tracing::warn!(
                attempt,
                next_delay_ms = delay.as_millis() as u64,
                error = %e,
                "Broker still unreachable",
            ),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(delays: impl Iterator<Item = Duration>, n: usize) -> Vec<u64> {
        delays.take(n).map(|d| d.as_secs()).collect()
    }

    #[test]
    fn delays_double_until_the_cap() {
        let policy = BackoffPolicy::default();
        assert_eq!(secs(policy.delays(), 8), vec![1, 2, 4, 8, 16, 30, 30, 30]);
    }

    #[test]
    fn custom_policy_is_respected() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(2),
            cap: Duration::from_secs(10),
            factor: 3,
        };
        assert_eq!(secs(policy.delays(), 4), vec![2, 6, 10, 10]);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_dialing() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let connector = WsConnector::new("ws://127.0.0.1:9/ws".into(), None);
        let stream = reconnect_loop(&connector, &BackoffPolicy::default(), &cancel).await;

        assert!(stream.is_none());
    }
}
