//! End-to-end pipeline tests with in-process collaborators: hash embeddings,
//! the local arithmetic evaluator, a scripted chat model and a static
//! crawler.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use docqa::answer::{answer, expand_query, QueryOptions};
use docqa::chunk::chunk;
use docqa::completion::{ChatMessage, CompletionService};
use docqa::config::Config;
use docqa::crawl::{scrape_url, Crawler};
use docqa::embedding::{EmbeddingProvider, HashEmbedder};
use docqa::error::DocQaError;
use docqa::extract::extract;
use docqa::indexer::{index, FolderIndex};
use docqa::math::ArithmeticEvaluator;
use docqa::models::{Document, FileKind};
use docqa::progress::NoProgress;
use docqa::report::{write_report, ReportOutline};
use docqa::retrieve::{search, search_scored};
use docqa::services::Services;

/// Returns a fixed reply and records every prompt it receives.
struct ScriptedCompletion {
    reply: String,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedCompletion {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatMessage], _temperature: f32) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(messages.to_vec());
        Ok(self.reply.clone())
    }
}

struct StaticCrawler(BTreeMap<String, String>);

#[async_trait]
impl Crawler for StaticCrawler {
    async fn crawl(&self, _url: &str) -> Result<BTreeMap<String, String>> {
        Ok(self.0.clone())
    }
}

/// Hash embeddings that answer the next call with a rate limit when armed.
struct RateLimitedOnce {
    inner: HashEmbedder,
    armed: AtomicBool,
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for RateLimitedOnce {
    fn model_name(&self) -> &str {
        "rate-limited-once"
    }

    fn dims(&self) -> usize {
        self.inner.dims()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.armed.swap(false, Ordering::SeqCst) {
            return Err(DocQaError::embedding(true, "429 Too Many Requests").into());
        }
        self.inner.embed_batch(texts).await
    }
}

fn services_with(completion: Arc<ScriptedCompletion>) -> Services {
    let mut config = Config::default();
    config.chunking.chunk_size_tokens = 40;
    config.chunking.overlap_tokens = 5;
    config.retrieval.top_k = 2;
    config.report.context_k = 2;
    Services::new(
        config,
        completion,
        Arc::new(HashEmbedder::new(512)),
        Arc::new(ArithmeticEvaluator),
        Arc::new(StaticCrawler(BTreeMap::new())),
    )
}

fn txt(name: &str, text: &str, services: &Services) -> Document {
    let doc = extract(text.as_bytes(), name, FileKind::Txt).unwrap();
    chunk(
        doc,
        services.config.chunking.chunk_size_tokens,
        services.config.chunking.overlap_tokens,
    )
}

async fn folder(services: &Services) -> FolderIndex {
    let docs = vec![
        txt(
            "finance.txt",
            "Revenue in the current period was 1000 and revenue in the last period was 2000.",
            services,
        ),
        txt(
            "people.txt",
            "The company employs forty engineers across three offices in Europe.",
            services,
        ),
        txt(
            "product.txt",
            "The flagship product is a scheduling assistant sold per seat.",
            services,
        ),
    ];
    let (folder_index, stats) = index(services, docs, &NoProgress).await.unwrap();
    assert_eq!(stats.embedded, 3);
    assert_eq!(stats.failed_batches, 0);
    folder_index
}

#[tokio::test]
async fn retrieval_finds_the_matching_passage() {
    let services = services_with(ScriptedCompletion::new(""));
    let folder_index = folder(&services).await;

    let hits = search_scored(&services, &folder_index, "revenue last period", 3)
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].passage.source_id, "finance.txt-0");
    assert_eq!(hits[0].document_name, "finance.txt");
    assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);

    let expected = &folder_index.documents[0].passages[0];
    assert_eq!(hits[0].passage.text, expected.text);
    assert_eq!(hits[0].passage.document_id, expected.document_id);
}

#[tokio::test]
async fn each_passage_is_its_own_nearest_neighbour() {
    let services = services_with(ScriptedCompletion::new(""));
    let long = (1..=12)
        .map(|n| {
            format!(
                "Section {n} covers topic number {n} with figures {} and {}.",
                n * 17,
                n * 31
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    let docs = vec![
        txt("long.txt", &long, &services),
        txt(
            "people.txt",
            "The company employs forty engineers across three offices in Europe.",
            &services,
        ),
    ];
    assert!(docs[0].passages.len() > 2);
    let (folder_index, _) = index(&services, docs, &NoProgress).await.unwrap();

    for passage in folder_index.passages() {
        let hits = search_scored(&services, &folder_index, &passage.text, 1)
            .await
            .unwrap();
        assert_eq!(hits[0].passage.source_id, passage.source_id);
        assert_eq!(hits[0].passage.text, passage.text);
        assert!((hits[0].score - 1.0).abs() < 1e-4, "score {}", hits[0].score);
    }
}

#[tokio::test]
async fn query_embedding_is_retried_after_rate_limit() {
    let mut config = Config::default();
    config.embedding.retry_delay_secs = 0;
    config.embedding.max_retry_secs = 5;
    let provider = Arc::new(RateLimitedOnce {
        inner: HashEmbedder::new(512),
        armed: AtomicBool::new(false),
        calls: AtomicUsize::new(0),
    });
    let services = Services::new(
        config,
        ScriptedCompletion::new(""),
        provider.clone(),
        Arc::new(ArithmeticEvaluator),
        Arc::new(StaticCrawler(BTreeMap::new())),
    );
    let folder_index = folder(&services).await;

    provider.armed.store(true, Ordering::SeqCst);
    let before = provider.calls.load(Ordering::SeqCst);
    let hits = search(&services, &folder_index, "revenue", 3).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(provider.calls.load(Ordering::SeqCst), before + 2);
}

#[tokio::test]
async fn empty_query_returns_nothing() {
    let services = services_with(ScriptedCompletion::new(""));
    let folder_index = folder(&services).await;
    assert!(search(&services, &folder_index, "   ", 4)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn answer_resolves_computation_and_cites_sources() {
    let completion = ScriptedCompletion::new(
        "Year on year growth was {(1000-2000)/2000*100}%.\nSOURCES: finance.txt-0, unknown-7",
    );
    let services = services_with(completion.clone());
    let folder_index = folder(&services).await;

    let result = answer(
        &services,
        "What is the year on year revenue growth?",
        &folder_index,
        &QueryOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(result.answer, "Year on year growth was -50%.");
    assert_eq!(result.sources.len(), 1);
    assert_eq!(result.sources[0].source_id, "finance.txt-0");
    assert_eq!(completion.calls.load(Ordering::SeqCst), 1);

    let prompts = completion.prompts.lock().unwrap();
    let user = &prompts[0][1].content;
    assert!(user.contains("QUESTION: What is the year on year revenue growth?"));
    assert!(user.contains("Source: finance.txt-0"));
}

#[tokio::test]
async fn return_all_yields_every_retrieved_passage() {
    let completion = ScriptedCompletion::new("I don't know.");
    let services = services_with(completion);
    let folder_index = folder(&services).await;

    let result = answer(
        &services,
        "revenue",
        &folder_index,
        &QueryOptions {
            return_all: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(result.answer, "I don't know.");
    assert_eq!(result.sources.len(), 2);
}

#[tokio::test]
async fn search_query_overrides_retrieval_text() {
    let completion = ScriptedCompletion::new("Forty.\nSOURCES: people.txt-0");
    let services = services_with(completion.clone());
    let folder_index = folder(&services).await;

    let result = answer(
        &services,
        "How big is the team?",
        &folder_index,
        &QueryOptions {
            search_query: Some("engineers offices employs".to_string()),
            top_k: Some(1),
            return_all: false,
        },
    )
    .await
    .unwrap();
    assert_eq!(result.sources[0].source_id, "people.txt-0");

    let prompts = completion.prompts.lock().unwrap();
    let user = &prompts[0][1].content;
    assert!(user.contains("QUESTION: How big is the team?"));
    assert!(user.contains("Source: people.txt-0"));
    assert!(!user.contains("Source: finance.txt-0"));
}

#[tokio::test]
async fn report_makes_one_call_per_topic_in_order() {
    let completion = ScriptedCompletion::new("  Section body.  ");
    let services = services_with(completion.clone());
    let folder_index = folder(&services).await;

    let outline = ReportOutline::new(vec![
        ("Overview".to_string(), "the company overview".to_string()),
        ("Pricing".to_string(), "the pricing of products".to_string()),
        ("Team".to_string(), "the engineers".to_string()),
    ]);
    let report = write_report(&services, &folder_index, &outline, &NoProgress)
        .await
        .unwrap();

    assert_eq!(completion.calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        report,
        "\n\nOverview:\n\nSection body.\n\nPricing:\n\nSection body.\n\nTeam:\n\nSection body."
    );
    let prompts = completion.prompts.lock().unwrap();
    assert!(prompts[1][1]
        .content
        .starts_with("Write a detailed report on the following topic: Pricing"));
}

#[tokio::test]
async fn expand_query_returns_keywords() {
    let completion = ScriptedCompletion::new(" revenue, growth, net sales \n");
    let services = services_with(completion.clone());
    let keywords = expand_query(&services, "How did sales develop?", "A finance deck")
        .await
        .unwrap();
    assert_eq!(keywords, "revenue, growth, net sales");

    let prompts = completion.prompts.lock().unwrap();
    assert!(prompts[0][0].content.contains("Context: A finance deck"));
    assert_eq!(prompts[0][1].content, "question: How did sales develop?");
}

#[tokio::test]
async fn crawled_pages_are_indexed_and_answerable() {
    let pages = BTreeMap::from([
        (
            "https://example.com/about".to_string(),
            "We build solar panels for rooftops.".to_string(),
        ),
        (
            "https://example.com/jobs".to_string(),
            "We are hiring welders.".to_string(),
        ),
    ]);
    let completion = ScriptedCompletion::new("Solar panels.\nSOURCES: https://example.com/about-0");
    let mut services = services_with(completion);
    services.crawler = Arc::new(StaticCrawler(pages));

    let docs: Vec<Document> = scrape_url(services.crawler.as_ref(), "https://example.com")
        .await
        .unwrap()
        .into_iter()
        .map(|d| chunk(d, 40, 5))
        .collect();
    assert_eq!(docs.len(), 2);
    let (folder_index, _) = index(&services, docs, &NoProgress).await.unwrap();

    let result = answer(
        &services,
        "What do they build?",
        &folder_index,
        &QueryOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(result.answer, "Solar panels.");
    assert_eq!(result.sources.len(), 1);
    assert_eq!(result.sources[0].source_id, "https://example.com/about-0");
}
