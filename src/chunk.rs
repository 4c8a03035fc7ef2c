//! Token-bounded, overlapping passage chunker.
//!
//! Splits a [`Document`]'s units into [`Passage`]s of at most
//! `chunk_size_tokens` tokens, each starting `overlap_tokens` tokens before
//! the end of its predecessor.
//!
//! # Algorithm
//!
//! 1. Join non-empty unit contents with `\n\n` (units are normalized, so a
//!    blank line only ever separates two units).
//! 2. Tokenize into byte spans with a [`Tokenizer`].
//! 3. From start `s`, the candidate end is `s + size`. If that is before the
//!    end of the text, back off to the latest boundary in `(s + overlap, s + size]`,
//!    preferring a paragraph break, then a line break, then any whitespace.
//! 4. With no boundary in range (one long atomic run), extend forward to the
//!    next whitespace so the run stays intact, even past `size`.
//! 5. The next passage starts at `end - overlap`.
//!
//! Each passage is labelled `<document-name>-<n>`, `n` counting from 0.
//!
//! # Example
//!
//! ```rust
//! use docqa::chunk::chunk;
//! use docqa::models::{Document, FileKind, TextUnit};
//!
//! let doc = Document::new(
//!     "id".into(),
//!     "notes.txt".into(),
//!     FileKind::Txt,
//!     vec![TextUnit::new("Hello world.".into(), None)],
//! );
//! let doc = chunk(doc, 100, 10);
//! assert_eq!(doc.passages.len(), 1);
//! assert_eq!(doc.passages[0].source_id, "notes.txt-0");
//! ```

use std::ops::Range;

use crate::models::{Document, Passage};

/// Characters per word piece for [`WordPieceTokenizer::default`]. Roughly
/// matches the granularity of BPE tokenizers on English text.
const DEFAULT_MAX_TOKEN_CHARS: usize = 6;

/// Splits text into tokens, reported as byte spans.
///
/// Spans must be ordered, non-overlapping, and must not include leading or
/// trailing whitespace; tokenizing a slice that starts at a token start and
/// ends at a token end must reproduce the same tokens.
pub trait Tokenizer: Send + Sync {
    fn token_spans(&self, text: &str) -> Vec<Range<usize>>;

    fn count(&self, text: &str) -> usize {
        self.token_spans(text).len()
    }
}

/// Whitespace-delimited words, with long words cut into fixed-size pieces.
#[derive(Debug, Clone)]
pub struct WordPieceTokenizer {
    /// Maximum characters per token; `0` keeps words whole.
    pub max_chars: usize,
}

impl Default for WordPieceTokenizer {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_TOKEN_CHARS,
        }
    }
}

impl Tokenizer for WordPieceTokenizer {
    fn token_spans(&self, text: &str) -> Vec<Range<usize>> {
        let max_chars = if self.max_chars == 0 {
            usize::MAX
        } else {
            self.max_chars
        };
        let mut spans = Vec::new();
        let mut piece: Option<(usize, usize)> = None; // (start byte, chars so far)
        for (i, c) in text.char_indices() {
            if c.is_whitespace() {
                if let Some((start, _)) = piece.take() {
                    spans.push(start..i);
                }
                continue;
            }
            piece = match piece {
                None => Some((i, 1)),
                Some((start, n)) if n == max_chars => {
                    spans.push(start..i);
                    Some((i, 1))
                }
                Some((start, n)) => Some((start, n + 1)),
            };
        }
        if let Some((start, _)) = piece {
            spans.push(start..text.len());
        }
        spans
    }
}

/// Strength of a split point between two adjacent tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Boundary {
    None,
    Word,
    Line,
    Paragraph,
}

fn boundary_before(text: &str, spans: &[Range<usize>], i: usize) -> Boundary {
    let gap = &text[spans[i - 1].end..spans[i].start];
    if gap.contains("\n\n") {
        Boundary::Paragraph
    } else if gap.contains('\n') {
        Boundary::Line
    } else if !gap.is_empty() {
        Boundary::Word
    } else {
        Boundary::None
    }
}

/// Token index ranges `[start, end)` of each passage.
fn split_points(
    text: &str,
    spans: &[Range<usize>],
    size: usize,
    overlap: usize,
) -> Vec<Range<usize>> {
    let n = spans.len();
    let mut out = Vec::new();
    if n == 0 {
        return out;
    }

    let mut start = 0;
    loop {
        let end = if start + size >= n {
            n
        } else {
            let limit = start + size;
            let lowest = start + overlap + 1;
            let best = [Boundary::Paragraph, Boundary::Line, Boundary::Word]
                .into_iter()
                .find_map(|level| {
                    (lowest..=limit)
                        .rev()
                        .find(|&i| boundary_before(text, spans, i) >= level)
                });
            match best {
                Some(i) => i,
                None => (limit + 1..n)
                    .find(|&i| boundary_before(text, spans, i) != Boundary::None)
                    .unwrap_or(n),
            }
        };
        out.push(start..end);
        if end == n {
            break;
        }
        start = end - overlap;
    }
    out
}

/// Chunk a document with the default tokenizer.
pub fn chunk(document: Document, chunk_size_tokens: usize, overlap_tokens: usize) -> Document {
    chunk_with(
        &WordPieceTokenizer::default(),
        document,
        chunk_size_tokens,
        overlap_tokens,
    )
}

/// Chunk a document, replacing any previous passages. Units are kept.
pub fn chunk_with(
    tokenizer: &dyn Tokenizer,
    mut document: Document,
    chunk_size_tokens: usize,
    overlap_tokens: usize,
) -> Document {
    let size = chunk_size_tokens.max(1);
    let overlap = overlap_tokens.min(size - 1);

    // Joined text plus the byte offset at which each unit starts.
    let mut text = String::new();
    let mut unit_starts: Vec<(usize, Option<u32>)> = Vec::new();
    for unit in document.units.iter().filter(|u| !u.content.is_empty()) {
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        unit_starts.push((text.len(), unit.unit_index));
        text.push_str(&unit.content);
    }

    let spans = tokenizer.token_spans(&text);
    let ranges = split_points(&text, &spans, size, overlap);

    document.passages = ranges
        .into_iter()
        .enumerate()
        .map(|(n, range)| {
            let byte_start = spans[range.start].start;
            let byte_end = spans[range.end - 1].end;
            let unit_index = unit_starts
                .iter()
                .take_while(|(offset, _)| *offset <= byte_start)
                .last()
                .and_then(|(_, idx)| *idx);
            Passage {
                text: text[byte_start..byte_end].to_string(),
                source_id: format!("{}-{}", document.name, n),
                document_id: document.identifier.clone(),
                unit_index,
                token_length: range.end - range.start,
            }
        })
        .collect();

    tracing::debug!(
        "chunked {} into {} passage(s) from {} token(s)",
        document.name,
        document.passages.len(),
        spans.len()
    );
    document
}
