//! Shared fakes for broker integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use maple_backend::{Article, ArticleStore, BackendError, LlmBackend};
use maple_broker::broker::Broker;
use maple_broker::executor::JobExecutor;
use maple_core::{Credential, JobPayload};
use tokio::sync::Semaphore;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// GatedLlm
// ---------------------------------------------------------------------------

/// Fake LLM whose calls are identified by a label (the text, first
/// keyword or first document) and, when gated, block until the test
/// calls [`finish`](GatedLlm::finish) for that label.
///
/// Labels starting with `panic` panic; labels starting with `fail`
/// return an error once released.
pub struct GatedLlm {
    gated: AtomicBool,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    started: Mutex<Vec<String>>,
    running: Mutex<HashMap<Credential, usize>>,
    overlapped: AtomicBool,
}

impl GatedLlm {
    pub fn gated() -> Self {
        Self::new(true)
    }

    /// Every call returns immediately.
    pub fn open() -> Self {
        Self::new(false)
    }

    fn new(gated: bool) -> Self {
        Self {
            gated: AtomicBool::new(gated),
            gates: Mutex::new(HashMap::new()),
            started: Mutex::new(Vec::new()),
            running: Mutex::new(HashMap::new()),
            overlapped: AtomicBool::new(false),
        }
    }

    fn gate(&self, label: &str) -> Arc<Semaphore> {
        let mut gates = self.gates.lock().unwrap();
        Arc::clone(
            gates
                .entry(label.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(0))),
        )
    }

    /// Stop gating calls that start from now on.
    pub fn ungate(&self) {
        self.gated.store(false, Ordering::SeqCst);
    }

    /// Let the call labelled `label` return.
    pub fn finish(&self, label: &str) {
        self.gate(label).add_permits(1);
    }

    /// Labels of every call that has started, in start order.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    /// Whether two calls ever ran at once under the same credential.
    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }

    async fn call(&self, label: &str, credential: &Credential) -> Result<(), BackendError> {
        self.started.lock().unwrap().push(label.to_string());
        {
            let mut running = self.running.lock().unwrap();
            let count = running.entry(credential.clone()).or_insert(0);
            *count += 1;
            if *count > 1 {
                self.overlapped.store(true, Ordering::SeqCst);
            }
        }

        if label.starts_with("panic") {
            self.leave(credential);
            panic!("LLM call {label} panicked");
        }

        if self.gated.load(Ordering::SeqCst) {
            let gate = self.gate(label);
            gate.acquire().await.expect("gate closed").forget();
        }
        self.leave(credential);

        if label.starts_with("fail") {
            return Err(BackendError::EmptyResponse(format!("LLM call {label} failed")));
        }
        Ok(())
    }

    fn leave(&self, credential: &Credential) {
        if let Some(count) = self.running.lock().unwrap().get_mut(credential) {
            *count -= 1;
        }
    }
}

#[async_trait]
impl LlmBackend for GatedLlm {
    async fn summarize(&self, text: &str, credential: &Credential) -> Result<String, BackendError> {
        self.call(text, credential).await?;
        Ok(format!("summary of {text}"))
    }

    async fn name_topic(
        &self,
        keywords: &[String],
        credential: &Credential,
    ) -> Result<String, BackendError> {
        let label = keywords.first().cloned().unwrap_or_default();
        self.call(&label, credential).await?;
        Ok(format!("name for {label}"))
    }

    async fn bullet_summarize(
        &self,
        documents: &[String],
        credential: &Credential,
    ) -> Result<Vec<String>, BackendError> {
        let label = documents.first().cloned().unwrap_or_default();
        self.call(&label, credential).await?;
        Ok(vec![format!("bullet for {label}")])
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory article store.
#[derive(Default)]
pub struct MemoryStore {
    articles: Mutex<HashMap<String, Article>>,
    puts: AtomicUsize,
}

impl MemoryStore {
    pub fn with_articles(articles: Vec<Article>) -> Self {
        let store = Self::default();
        {
            let mut map = store.articles.lock().unwrap();
            for article in articles {
                map.insert(article.uuid.clone(), article);
            }
        }
        store
    }

    pub fn stored(&self, uuid: &str) -> Option<Article> {
        self.articles.lock().unwrap().get(uuid).cloned()
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn article(&self, uuid: &str) -> Result<Option<Article>, BackendError> {
        Ok(self.stored(uuid))
    }

    async fn put_article(&self, article: &Article) -> Result<(), BackendError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.articles
            .lock()
            .unwrap()
            .insert(article.uuid.clone(), article.clone());
        Ok(())
    }

    async fn articles_page(&self, limit: u32, page: u32) -> Result<Vec<Article>, BackendError> {
        let mut articles: Vec<Article> = self.articles.lock().unwrap().values().cloned().collect();
        articles.sort_by(|a, b| a.uuid.cmp(&b.uuid));
        Ok(articles
            .into_iter()
            .skip((limit * page) as usize)
            .take(limit as usize)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn article(uuid: &str, content: &str, chat_summary: Option<&str>) -> Article {
    Article {
        uuid: uuid.to_string(),
        title: format!("Article {uuid}"),
        url: format!("https://news.example/{uuid}"),
        content: content.to_string(),
        chat_summary: chat_summary.map(String::from),
        extra: serde_json::Map::new(),
    }
}

pub fn broker(llm: Arc<GatedLlm>, store: Arc<MemoryStore>) -> Arc<Broker> {
    Arc::new(Broker::new(JobExecutor::new(llm, store)))
}

pub fn topic(label: &str) -> JobPayload {
    JobPayload::NameTopic {
        request_id: label.into(),
        keywords: vec![label.to_string()],
    }
}

pub fn bullets(label: &str) -> JobPayload {
    JobPayload::BulletSummarize {
        request_id: label.into(),
        documents: vec![label.to_string()],
    }
}

pub fn summary(request_id: &str, text: &str) -> JobPayload {
    JobPayload::Summarize {
        request_id: request_id.into(),
        text: Some(text.to_string()),
    }
}

/// Poll `condition` until it holds, failing the test after 5 s.
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
