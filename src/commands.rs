//! Command implementations behind the `docqa` binary.
//!
//! Results go to stdout (JSON for `extract`, `chunk` and `crawl`); logs and
//! progress go to stderr.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::answer::{answer, QueryOptions};
use crate::chunk::chunk;
use crate::config::Config;
use crate::crawl::{scrape_url, Crawler, HttpCrawler};
use crate::extract::{collect_paths, extract_with_ocr};
use crate::indexer::{index, FolderIndex};
use crate::models::{Document, FileKind};
use crate::ocr::{HttpOcrService, OcrPolicy, OcrService};
use crate::progress::ProgressReporter;
use crate::report::{write_report, ReportOutline};
use crate::services::Services;

/// Where to read documents from.
#[derive(Debug, Clone, Default)]
pub struct SourceArgs {
    pub files: Vec<PathBuf>,
    pub dir: Option<PathBuf>,
    pub url: Option<String>,
}

/// Read one file from disk and extract it, with OCR when a service is given.
pub async fn load_file(
    path: &Path,
    ocr: Option<&dyn OcrService>,
    policy: &OcrPolicy,
    progress: &dyn ProgressReporter,
) -> Result<Document> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let kind = FileKind::from_name(&name)?;
    let raw =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    extract_with_ocr(&raw, &name, kind, ocr, policy, progress)
        .await
        .with_context(|| format!("Failed to extract {}", path.display()))
}

/// Extract and chunk every source named in `args`.
pub async fn load_documents(
    services: &Services,
    args: &SourceArgs,
    progress: &dyn ProgressReporter,
) -> Result<Vec<Document>> {
    let mut paths = args.files.clone();
    if let Some(dir) = &args.dir {
        paths.extend(collect_paths(dir)?);
    }

    let chunking = &services.config.chunking;
    let policy = OcrPolicy::from_config(&services.config.ocr);
    let mut documents = Vec::new();
    for path in &paths {
        let doc = load_file(path, services.ocr.as_deref(), &policy, progress).await?;
        documents.push(chunk(
            doc,
            chunking.chunk_size_tokens,
            chunking.overlap_tokens,
        ));
    }
    if let Some(url) = &args.url {
        for doc in scrape_url(services.crawler.as_ref(), url).await? {
            documents.push(chunk(
                doc,
                chunking.chunk_size_tokens,
                chunking.overlap_tokens,
            ));
        }
    }

    if documents.is_empty() {
        bail!("No documents given. Use --file, --dir or --url.");
    }
    tracing::info!("loaded {} document(s)", documents.len());
    Ok(documents)
}

async fn build_index(
    services: &Services,
    args: &SourceArgs,
    progress: &dyn ProgressReporter,
) -> Result<FolderIndex> {
    let documents = load_documents(services, args, progress).await?;
    let (folder_index, stats) = index(services, documents, progress).await?;
    if stats.embedded == 0 {
        bail!(
            "Nothing was indexed ({} passage(s), {} failed batch(es))",
            stats.passages,
            stats.failed_batches
        );
    }
    Ok(folder_index)
}

fn standalone_ocr(config: &Config) -> Result<Option<HttpOcrService>> {
    if config.ocr.enabled {
        Ok(Some(HttpOcrService::new(&config.ocr)?))
    } else {
        Ok(None)
    }
}

/// `docqa extract <file>`: print the document and its units as JSON.
pub async fn run_extract(
    config: &Config,
    path: &Path,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let ocr = standalone_ocr(config)?;
    let doc = load_file(
        path,
        ocr.as_ref().map(|s| s as &dyn OcrService),
        &OcrPolicy::from_config(&config.ocr),
        progress,
    )
    .await?;
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

/// `docqa chunk <file>`: print the passages as JSON.
pub async fn run_chunk(
    config: &Config,
    path: &Path,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let ocr = standalone_ocr(config)?;
    let doc = load_file(
        path,
        ocr.as_ref().map(|s| s as &dyn OcrService),
        &OcrPolicy::from_config(&config.ocr),
        progress,
    )
    .await?;
    let doc = chunk(
        doc,
        config.chunking.chunk_size_tokens,
        config.chunking.overlap_tokens,
    );
    println!("{}", serde_json::to_string_pretty(&doc.passages)?);
    Ok(())
}

/// `docqa crawl <url>`: print `{url: text}` as JSON.
pub async fn run_crawl(config: &Config, url: &str) -> Result<()> {
    let crawler = HttpCrawler::new(&config.crawl)?;
    let pages = crawler.crawl(url).await?;
    println!("{}", serde_json::to_string_pretty(&pages)?);
    Ok(())
}

/// `docqa ask <question>`.
pub async fn run_ask(
    config: Config,
    question: &str,
    args: &SourceArgs,
    options: &QueryOptions,
    json: bool,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let services = Services::from_config(config)?;
    let folder_index = build_index(&services, args, progress).await?;
    let result = answer(&services, question, &folder_index, options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    println!("{}", result.answer);
    if !result.sources.is_empty() {
        println!();
        println!("Sources:");
        for passage in &result.sources {
            let preview: String = passage.text.chars().take(100).collect();
            println!("  {}  {}", passage.source_id, preview.replace('\n', " "));
        }
    }
    Ok(())
}

/// `docqa report`: write the report to `output`, or stdout.
pub async fn run_report(
    config: Config,
    args: &SourceArgs,
    output: Option<&Path>,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let outline = ReportOutline::from_config(&config.report);
    let services = Services::from_config(config)?;
    let folder_index = build_index(&services, args, progress).await?;
    let report = write_report(&services, &folder_index, &outline, progress).await?;

    match output {
        Some(path) => {
            std::fs::write(path, &report)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Report written to {}", path.display());
        }
        None => println!("{}", report),
    }
    Ok(())
}
