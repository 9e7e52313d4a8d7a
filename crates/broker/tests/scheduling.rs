//! Scheduler loop scenarios: per-credential exclusion, priority, and
//! credential release after failures.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{bullets, summary, topic, wait_until, GatedLlm, MemoryStore};
use maple_broker::broker::Submission;
use maple_core::Credential;
use tokio_util::sync::CancellationToken;

fn k1() -> Credential {
    Credential::new("sk-key-one")
}

fn k2() -> Credential {
    Credential::new("sk-key-two")
}

// ---------------------------------------------------------------------------
// Test: jobs on different credentials run concurrently; a second job on a
// busy credential waits for its release
// ---------------------------------------------------------------------------

#[tokio::test]
async fn credentials_run_in_parallel_but_each_runs_one_job() {
    let llm = Arc::new(GatedLlm::gated());
    let broker = common::broker(Arc::clone(&llm), Arc::new(MemoryStore::default()));
    let cancel = CancellationToken::new();
    let handle = broker.start(cancel.clone());

    broker.submit_background(k1(), topic("a"));
    broker.submit_background(k2(), topic("b"));
    broker.submit_background(k1(), topic("c"));

    wait_until("both credentials busy", || llm.started().len() == 2).await;
    let mut started = llm.started();
    started.sort();
    assert_eq!(started, vec!["a", "b"]);
    assert_eq!(broker.scheduler().queued(), 1);

    // Freeing K2 does not help the job waiting on K1.
    llm.finish("b");
    wait_until("K2 released", || !broker.scheduler().is_reserved(&k2())).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(llm.started().len(), 2);

    llm.finish("a");
    wait_until("second K1 job started", || llm.started().len() == 3).await;
    assert_eq!(llm.started()[2], "c");

    llm.finish("c");
    wait_until("all credentials released", || broker.scheduler().in_flight() == 0).await;
    assert!(!llm.overlapped());

    cancel.cancel();
    handle.await.unwrap();
}

// ---------------------------------------------------------------------------
// Test: on a single credential, jobs dispatch Summarize > NameTopic >
// BulletSummarize regardless of submission order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dispatch_follows_kind_priority() {
    let llm = Arc::new(GatedLlm::gated());
    let broker = common::broker(Arc::clone(&llm), Arc::new(MemoryStore::default()));

    broker.submit_background(k1(), bullets("bullet"));
    broker.submit_background(k1(), topic("topic"));
    broker.submit_background(k1(), summary("a-1", "article text"));

    let cancel = CancellationToken::new();
    let handle = broker.start(cancel.clone());

    for (i, label) in ["article text", "topic", "bullet"].into_iter().enumerate() {
        wait_until("next job", || llm.started().len() == i + 1).await;
        assert_eq!(llm.started()[i], label);
        llm.finish(label);
    }
    wait_until("queue drained", || broker.scheduler().in_flight() == 0).await;

    cancel.cancel();
    handle.await.unwrap();
}

// ---------------------------------------------------------------------------
// Test: a panicking execution task still releases its credential
// ---------------------------------------------------------------------------

#[tokio::test]
async fn panicking_job_releases_credential() {
    let llm = Arc::new(GatedLlm::gated());
    let broker = common::broker(Arc::clone(&llm), Arc::new(MemoryStore::default()));
    let cancel = CancellationToken::new();
    let handle = broker.start(cancel.clone());

    broker.submit_background(k1(), topic("panic-1"));
    broker.submit_background(k1(), topic("after"));

    wait_until("job after panic started", || llm.started().len() == 2).await;
    assert_eq!(llm.started(), vec!["panic-1", "after"]);

    llm.finish("after");
    wait_until("credential released", || broker.scheduler().in_flight() == 0).await;

    cancel.cancel();
    handle.await.unwrap();
}

// ---------------------------------------------------------------------------
// Test: a failed job is dropped and its credential released
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_job_releases_credential() {
    let llm = Arc::new(GatedLlm::gated());
    let broker = common::broker(Arc::clone(&llm), Arc::new(MemoryStore::default()));
    let cancel = CancellationToken::new();
    let handle = broker.start(cancel.clone());

    broker.submit_background(k1(), topic("fail-1"));
    broker.submit_background(k1(), topic("after"));

    wait_until("failing job started", || llm.started().len() == 1).await;
    llm.finish("fail-1");
    wait_until("next job started", || llm.started().len() == 2).await;
    llm.finish("after");
    wait_until("credential released", || broker.scheduler().in_flight() == 0).await;

    cancel.cancel();
    handle.await.unwrap();
}

// ---------------------------------------------------------------------------
// Test: re-submitting a queued identity is a no-op
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_identity_is_queued_once() {
    let broker = common::broker(Arc::new(GatedLlm::gated()), Arc::new(MemoryStore::default()));

    assert_eq!(broker.submit_background(k1(), topic("t-1")), Submission::Queued);
    assert_eq!(broker.submit_background(k2(), topic("t-1")), Submission::Duplicate);
    // Same request id, different kind: a distinct job.
    assert_eq!(broker.submit_background(k1(), bullets("t-1")), Submission::Queued);

    assert_eq!(broker.scheduler().queued(), 2);
}

// ---------------------------------------------------------------------------
// Test: the loop stops when cancelled while idle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn idle_loop_stops_on_cancel() {
    let broker = common::broker(Arc::new(GatedLlm::gated()), Arc::new(MemoryStore::default()));
    let cancel = CancellationToken::new();
    let handle = broker.start(cancel.clone());

    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("scheduler loop should stop")
        .unwrap();
}
