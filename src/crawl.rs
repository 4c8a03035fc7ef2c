//! Web page crawling.
//!
//! A [`Crawler`] turns a start URL into `{url: visible text}`. [`scrape_url`]
//! wraps each page as a single-unit web page [`Document`] with a random
//! identifier, since page content is not stable between fetches.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use scraper::{Html, Selector};

use crate::config::CrawlConfig;
use crate::extract::{html_to_text, normalize_text};
use crate::models::{Document, FileKind, TextUnit};

#[async_trait]
pub trait Crawler: Send + Sync {
    /// Visible text of every reachable page, keyed (and so ordered) by URL.
    async fn crawl(&self, url: &str) -> Result<BTreeMap<String, String>>;
}

/// Crawl `url` and convert each page to a [`Document`].
pub async fn scrape_url(crawler: &dyn Crawler, url: &str) -> Result<Vec<Document>> {
    let pages = crawler.crawl(url).await?;
    tracing::info!("crawled {} page(s) from {}", pages.len(), url);
    Ok(documents_from_pages(pages))
}

pub fn documents_from_pages(pages: BTreeMap<String, String>) -> Vec<Document> {
    pages
        .into_iter()
        .map(|(url, text)| {
            let text = normalize_text(&text);
            let units = if text.is_empty() {
                Vec::new()
            } else {
                vec![TextUnit::new(text, None)]
            };
            Document::new(
                uuid::Uuid::new_v4().to_string(),
                url,
                FileKind::WebPage,
                units,
            )
        })
        .collect()
}

/// Breadth-first crawler restricted to the start URL's host.
pub struct HttpCrawler {
    client: reqwest::Client,
    max_pages: usize,
}

impl HttpCrawler {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            max_pages: config.max_pages,
        })
    }

    /// Fetch one page. `Ok(None)` for non-HTML responses.
    async fn fetch_html(&self, url: &Url) -> Result<Option<String>> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {}", status);
        }
        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("html"))
            .unwrap_or(true);
        if !is_html {
            return Ok(None);
        }
        Ok(Some(response.text().await?))
    }
}

#[async_trait]
impl Crawler for HttpCrawler {
    async fn crawl(&self, url: &str) -> Result<BTreeMap<String, String>> {
        let start = Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
        let host = start.host_str().map(str::to_string);

        let mut pages = BTreeMap::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(start.to_string());
        queue.push_back(start);

        while let Some(page_url) = queue.pop_front() {
            if pages.len() >= self.max_pages {
                break;
            }
            let html = match self.fetch_html(&page_url).await {
                Ok(Some(html)) => html,
                Ok(None) => {
                    tracing::debug!("skipping non-HTML page {}", page_url);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("failed to fetch {}: {}", page_url, e);
                    continue;
                }
            };

            for link in page_links(&page_url, &html) {
                if link.host_str().map(str::to_string) == host && seen.insert(link.to_string()) {
                    queue.push_back(link);
                }
            }
            pages.insert(page_url.to_string(), html_to_text(&html));
        }
        Ok(pages)
    }
}

/// Absolute http(s) links in `html`, resolved against `base`, fragments removed.
fn page_links(base: &Url, html: &str) -> Vec<Url> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|mut u| {
            u.set_fragment(None);
            u
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_are_resolved_and_defragmented() {
        let base = Url::parse("https://example.com/docs/index.html").unwrap();
        let html = r##"
            <a href="intro.html#top">Intro</a>
            <a href="/about">About</a>
            <a href="mailto:team@example.com">Mail</a>
            <a href="https://other.org/x">Other</a>
        "##;
        let links: Vec<String> = page_links(&base, html)
            .into_iter()
            .map(|u| u.to_string())
            .collect();
        assert_eq!(
            links,
            vec![
                "https://example.com/docs/intro.html",
                "https://example.com/about",
                "https://other.org/x",
            ]
        );
    }

    #[test]
    fn pages_become_web_documents_ordered_by_url() {
        let mut pages = BTreeMap::new();
        pages.insert("https://b.example/".to_string(), "Second\n\n\npage".to_string());
        pages.insert("https://a.example/".to_string(), "First page".to_string());
        pages.insert("https://c.example/".to_string(), "   ".to_string());

        let docs = documents_from_pages(pages);
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].name, "https://a.example/");
        assert_eq!(docs[1].units[0].content, "Second\npage");
        assert!(docs[2].units.is_empty());
        assert!(docs.iter().all(|d| d.kind == FileKind::WebPage));
        assert_ne!(docs[0].identifier, docs[1].identifier);
    }

    struct StaticCrawler;

    #[async_trait]
    impl Crawler for StaticCrawler {
        async fn crawl(&self, url: &str) -> Result<BTreeMap<String, String>> {
            Ok(BTreeMap::from([(url.to_string(), "Hello from the web".to_string())]))
        }
    }

    #[tokio::test]
    async fn scrape_url_wraps_crawler_output() {
        let docs = scrape_url(&StaticCrawler, "https://example.com").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].units[0].content, "Hello from the web");
        assert_eq!(docs[0].units[0].unit_index, None);
    }

    #[tokio::test]
    async fn invalid_start_url_is_an_error() {
        let crawler = HttpCrawler::new(&CrawlConfig::default()).unwrap();
        assert!(crawler.crawl("not a url").await.is_err());
    }
}
