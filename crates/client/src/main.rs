//! `maple-submit` -- submit a batch of jobs to the broker and wait for
//! every result.
//!
//! Usage: `maple-submit <jobs.json> [max-wait-secs]`
//!
//! The jobs file is a JSON array of payloads, e.g.
//! `[{"kind": "name_topic", "request_id": "t-1", "keywords": ["fare", "bus"]}]`.
//! Results are printed to stdout as JSON.
//!
//! # Environment variables
//!
//! | Variable                | Required | Default                  |
//! |-------------------------|----------|--------------------------|
//! | `MAPLE_CHAT_WS_URL`     | no       | `ws://localhost:5002/ws` |
//! | `MAPLE_CHAT_SOCKET_KEY` | no       | --                       |
//! | `LLM_API_KEY`           | yes      | --                       |

use std::sync::Arc;
use std::time::Duration;

use maple_core::JobPayload;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use maple_client::config::ClientConfig;
use maple_client::{DrainOutcome, ReliableClient, WsConnector, WsTransport};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "maple_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args().skip(1);
    let Some(jobs_path) = args.next() else {
        eprintln!("usage: maple-submit <jobs.json> [max-wait-secs]");
        std::process::exit(2);
    };
    let max_wait = args.next().map(|raw| {
        raw.parse::<u64>().map(Duration::from_secs).unwrap_or_else(|_| {
            tracing::error!(value = %raw, "max-wait-secs must be a whole number of seconds");
            std::process::exit(2);
        })
    });

    let config = ClientConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid client configuration");
        std::process::exit(1);
    });

    let jobs: Vec<JobPayload> = std::fs::read_to_string(&jobs_path)
        .map_err(|e| e.to_string())
        .and_then(|raw| serde_json::from_str(&raw).map_err(|e| e.to_string()))
        .unwrap_or_else(|e| {
            tracing::error!(path = %jobs_path, error = %e, "Failed to read jobs file");
            std::process::exit(1);
        });
    tracing::info!(count = jobs.len(), url = %config.ws_url, "Submitting jobs");

    let cancel = CancellationToken::new();
    let connector = WsConnector::new(config.ws_url.clone(), config.socket_key.clone());
    let (transport, inbound) = WsTransport::start(connector, cancel.child_token());
    let transport = Arc::new(transport);
    transport.wait_connected().await;

    let client = Arc::new(ReliableClient::new(transport.clone(), config.credential));
    let acknowledger = client.spawn_acknowledger(inbound);

    for payload in jobs {
        let identity = payload.identity();
        if let Err(e) = client.submit(payload, true).await {
            tracing::error!(job = %identity, error = %e, "Skipping job");
        }
    }

    let outcome = client.drive_until_drained(max_wait).await;
    if let DrainOutcome::TimedOut { outstanding } = outcome {
        tracing::warn!(
            outstanding,
            connected = transport.is_connected(),
            "Stopped waiting for job results",
        );
    }
    let results = client.results();
    let output = serde_json::json!({
        "summaries": results.summaries(),
        "topic_names": results.topic_names(),
        "bullet_summaries": results.bullet_summaries(),
    });
    println!("{output:#}");

    client.cleanup();
    cancel.cancel();
    acknowledger.abort();

    if let DrainOutcome::TimedOut { outstanding } = outcome {
        tracing::error!(outstanding, "Some jobs never returned a result");
        std::process::exit(1);
    }
}
