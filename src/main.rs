//! # docqa CLI
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa extract <file>` | Print the extracted text units as JSON |
//! | `docqa chunk <file>` | Print the passages as JSON |
//! | `docqa crawl <url>` | Print crawled pages as `{url: text}` JSON |
//! | `docqa ask "<question>"` | Answer a question from the given documents |
//! | `docqa report` | Write a multi-topic analysis report |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docqa::answer::QueryOptions;
use docqa::commands::{self, SourceArgs};
use docqa::config;
use docqa::progress::ProgressMode;

/// docqa: ask questions about your documents and get answers with citations.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Document question answering with cited sources",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when it is absent.
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    /// Progress output on stderr: human, json or off. Defaults to human on a
    /// terminal, off otherwise.
    #[arg(long, global = true, value_parser = ["human", "json", "off"])]
    progress: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Sources {
    /// A document to load (repeatable).
    #[arg(long = "file")]
    files: Vec<PathBuf>,

    /// Load every supported file under this directory.
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Crawl this URL and load the pages found.
    #[arg(long)]
    url: Option<String>,
}

impl From<Sources> for SourceArgs {
    fn from(s: Sources) -> Self {
        SourceArgs {
            files: s.files,
            dir: s.dir,
            url: s.url,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a file and print its text units.
    Extract {
        /// PDF, DOCX, PPTX, XLSX, TXT or HTML file.
        file: PathBuf,
    },

    /// Extract and chunk a file, printing the passages.
    Chunk { file: PathBuf },

    /// Crawl a site and print the visible text of each page.
    Crawl { url: String },

    /// Answer a question from the given documents.
    Ask {
        question: String,

        #[command(flatten)]
        sources: Sources,

        /// Return every retrieved passage, not only the cited ones.
        #[arg(long)]
        all: bool,

        /// Retrieve with this text instead of the question.
        #[arg(long)]
        search_query: Option<String>,

        /// Number of passages to retrieve.
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the answer and sources as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Write a report with one section per outline topic.
    Report {
        #[command(flatten)]
        sources: Sources,

        /// Write the report here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mode = match cli.progress.as_deref() {
        Some("human") => ProgressMode::Human,
        Some("json") => ProgressMode::Json,
        Some(_) => ProgressMode::Off,
        None => ProgressMode::default_for_tty(),
    };
    let progress = mode.reporter();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Extract { file } => {
            commands::run_extract(&cfg, &file, progress.as_ref()).await?;
        }
        Commands::Chunk { file } => {
            commands::run_chunk(&cfg, &file, progress.as_ref()).await?;
        }
        Commands::Crawl { url } => {
            commands::run_crawl(&cfg, &url).await?;
        }
        Commands::Ask {
            question,
            sources,
            all,
            search_query,
            top_k,
            json,
        } => {
            let options = QueryOptions {
                search_query,
                top_k,
                return_all: all,
            };
            commands::run_ask(
                cfg,
                &question,
                &sources.into(),
                &options,
                json,
                progress.as_ref(),
            )
            .await?;
        }
        Commands::Report { sources, output } => {
            commands::run_report(cfg, &sources.into(), output.as_deref(), progress.as_ref())
                .await?;
        }
    }

    Ok(())
}
