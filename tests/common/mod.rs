//! Test helpers for pipeline and web API tests.
//!
//! Provides in-process fakes for the fetcher, AI provider and publisher, and
//! helpers to build RSS documents and orchestrators over an in-memory
//! database.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;

use feedrelay::config::PipelineConfig;
use feedrelay::feed::{FeedRepository, NewFeedSource};
use feedrelay::fetcher::{FeedFetcher, FetchError, FetchResponse};
use feedrelay::pipeline::{CancelHandle, Orchestrator};
use feedrelay::publish::{PublishError, PublishErrorKind, Publisher};
use feedrelay::transform::{
    AiProvider, Completion, Pricing, ProviderError, ProviderErrorKind, Template, Transformer,
};
use feedrelay::Database;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Marker that makes [`FakeProvider`] fail on an entry.
pub const FAIL_MARKER: &str = "[fail]";

/// An RSS item for [`rss_document`].
pub struct Item<'a> {
    pub title: &'a str,
    pub link: &'a str,
    pub pub_date: &'a str,
    pub description: &'a str,
}

/// Shorthand for an item with a standard date and description.
pub fn item<'a>(title: &'a str, link: &'a str) -> Item<'a> {
    Item {
        title,
        link,
        pub_date: "Mon, 06 May 2024 10:00:00 GMT",
        description: "Entry body",
    }
}

/// Build an RSS 2.0 document.
pub fn rss_document(items: &[Item<'_>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
<channel>
<title>Test Feed</title>
<link>https://example.com/</link>
<description>Test</description>
"#,
    );
    for item in items {
        xml.push_str(&format!(
            "<item><title>{}</title><link>{}</link><pubDate>{}</pubDate><description>{}</description></item>\n",
            item.title, item.link, item.pub_date, item.description
        ));
    }
    xml.push_str("</channel>\n</rss>\n");
    xml
}

/// Fetcher returning a fixed body or a fixed error.
pub struct FakeFetcher {
    response: Mutex<Result<String, FetchError>>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            response: Mutex::new(Ok(body.into())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: FetchError) -> Self {
        Self {
            response: Mutex::new(Err(error)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_body(&self, body: impl Into<String>) {
        *self.response.lock().unwrap() = Ok(body.into());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedFetcher for FakeFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &*self.response.lock().unwrap() {
            Ok(body) => Ok(FetchResponse {
                body: body.as_bytes().to_vec(),
                status: 200,
            }),
            Err(e) => Err(e.clone()),
        }
    }
}

/// Provider that upper-cases content and fails on [`FAIL_MARKER`].
pub struct FakeProvider {
    name: String,
    network_failures: AtomicU32,
    calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            network_failures: AtomicU32::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` calls with a network error.
    pub fn with_network_failures(self, n: u32) -> Self {
        self.network_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "fake-model"
    }

    fn pricing(&self) -> Pricing {
        Pricing {
            input_per_mtok: 1.0,
            output_per_mtok: 2.0,
        }
    }

    async fn complete(&self, _instruction: &str, content: &str) -> Result<Completion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.network_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.network_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ProviderError::new(
                &self.name,
                ProviderErrorKind::Network,
                "connection reset",
            ));
        }

        if content.contains(FAIL_MARKER) {
            return Err(ProviderError::new(
                &self.name,
                ProviderErrorKind::Response,
                "model refused",
            ));
        }

        Ok(Completion {
            text: content.to_uppercase(),
            input_tokens: 1000,
            output_tokens: 500,
        })
    }
}

/// A post received by [`FakePublisher`].
#[derive(Debug, Clone)]
pub struct PublishedPost {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// Publisher recording posts in memory.
#[derive(Default)]
pub struct FakePublisher {
    posts: Mutex<Vec<PublishedPost>>,
    fail_titles: Vec<String>,
    cancel_after_first: Mutex<Option<CancelHandle>>,
}

impl FakePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject posts with the given title.
    pub fn failing_on(title: &str) -> Self {
        Self {
            fail_titles: vec![title.to_string()],
            ..Self::default()
        }
    }

    /// Fire `handle` once the first post has been created.
    pub fn cancel_after_first(self, handle: CancelHandle) -> Self {
        *self.cancel_after_first.lock().unwrap() = Some(handle);
        self
    }

    pub fn posts(&self) -> Vec<PublishedPost> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn publish(
        &self,
        title: &str,
        content: &str,
        template: &Template,
    ) -> Result<String, PublishError> {
        if self.fail_titles.iter().any(|t| t == title) {
            return Err(PublishError::new(
                PublishErrorKind::Network,
                "connection refused",
            ));
        }

        let mut posts = self.posts.lock().unwrap();
        posts.push(PublishedPost {
            title: title.to_string(),
            content: content.to_string(),
            tags: template.tags.iter().map(|t| t.to_string()).collect(),
        });
        let id = format!("post-{}", posts.len());

        if let Some(handle) = self.cancel_after_first.lock().unwrap().take() {
            handle.cancel();
        }

        Ok(id)
    }
}

/// Everything a pipeline test needs.
pub struct Harness {
    pub db: Database,
    pub feed_id: i64,
    pub fetcher: Arc<FakeFetcher>,
    pub provider: Arc<FakeProvider>,
    pub publisher: Arc<FakePublisher>,
    pub orchestrator: Arc<Orchestrator>,
}

/// Build an orchestrator over an in-memory database with one feed.
pub async fn harness(fetcher: FakeFetcher, provider: FakeProvider, publisher: FakePublisher) -> Harness {
    harness_with(fetcher, provider, publisher, PipelineConfig::default(), |o| o).await
}

/// Like [`harness`], with a pipeline config and an orchestrator hook.
pub async fn harness_with(
    fetcher: FakeFetcher,
    provider: FakeProvider,
    publisher: FakePublisher,
    config: PipelineConfig,
    customize: impl FnOnce(Orchestrator) -> Orchestrator,
) -> Harness {
    let db = Database::open_in_memory().await.unwrap();
    let feed = FeedRepository::new(db.pool())
        .create(
            &NewFeedSource::new("test-feed", "https://example.com/feed")
                .with_provider("openai")
                .with_template("newsletter"),
        )
        .await
        .unwrap();

    let fetcher = Arc::new(fetcher);
    let provider = Arc::new(provider);
    let publisher = Arc::new(publisher);
    let transformer = Transformer::new().with_provider(provider.clone());

    let orchestrator = customize(Orchestrator::new(
        db.clone(),
        fetcher.clone(),
        transformer,
        publisher.clone(),
        config,
    ));

    Harness {
        db,
        feed_id: feed.id,
        fetcher,
        provider,
        publisher,
        orchestrator: Arc::new(orchestrator),
    }
}
