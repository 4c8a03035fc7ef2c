//! # docqa
//!
//! Document question answering over PDF, DOCX, PPTX, XLSX, TXT and web pages.
//!
//! Files are extracted into text units, chunked into overlapping passages
//! with stable `source_id`s, embedded into a vector index, and queried: the
//! retrieved passages ground a chat model's answer, which cites its sources
//! and has any bracketed arithmetic evaluated before it is returned.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────┐   ┌─────────┐   ┌─────────────┐
//! │ Extractors │──▶│ Chunker │──▶│ Indexer │──▶│ FolderIndex │
//! │ files/web  │   └─────────┘   └─────────┘   └──────┬──────┘
//! └────────────┘                                      │
//!                       ┌─────────────────────────────┤
//!                       ▼                             ▼
//!                 ┌──────────┐                  ┌──────────┐
//!                 │  answer  │                  │  report  │
//!                 └──────────┘                  └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docqa extract annual-report.pdf
//! docqa ask "What was the revenue growth?" --file annual-report.pdf
//! docqa report --dir ./filings --output report.txt
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`extract`] | File format extractors |
//! | [`ocr`] | Image text decoding for PDF pages |
//! | [`crawl`] | Web page crawling |
//! | [`chunk`] | Token-bounded passage chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index |
//! | [`indexer`] | Embedding documents into an index |
//! | [`retrieve`] | Nearest-passage search |
//! | [`completion`] | Chat completion backends |
//! | [`math`] | Expression evaluators |
//! | [`answer`] | Grounded answers with citations |
//! | [`report`] | Multi-topic reports |
//! | [`services`] | Collaborator handle |
//! | [`progress`] | Progress reporting |
//! | [`commands`] | CLI command implementations |

pub mod answer;
pub mod chunk;
pub mod commands;
pub mod completion;
pub mod config;
pub mod crawl;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod indexer;
pub mod math;
pub mod models;
pub mod ocr;
pub mod progress;
pub mod report;
pub mod retrieve;
pub mod services;
