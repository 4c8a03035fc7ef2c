//! Grounded answers with citations.
//!
//! The model is shown the retrieved excerpts, each labelled with its
//! `source_id`, and asked to finish with a `SOURCES: id, id` line. Any
//! arithmetic it needs is written as a braced expression such as
//! `{(1000-2000)/2000*100}` and replaced by the evaluator's result before
//! the answer is returned.

use std::collections::HashSet;

use anyhow::Result;

use crate::completion::ChatMessage;
use crate::indexer::FolderIndex;
use crate::math::MathEvaluator;
use crate::models::{AnswerWithSources, Passage};
use crate::retrieve::search;
use crate::services::Services;

const SOURCES_MARKER: &str = "SOURCES: ";

const GROUNDING_PROMPT: &str = "Create a final answer to the given question using only the \
provided document excerpts (in no particular order) as references. If the excerpts do not \
contain the answer, say that you don't know.\n\
End your answer with a line starting with \"SOURCES: \" followed by the Source values of the \
excerpts you used, separated by \", \".\n\
For calculations, return the expression between curly brackets; it will be passed to a \
separate service to do the calculation.\n\
Example: info: 'curr period val=1000, last period val=2000' question: 'what's the year on \
year growth?' answer: '{(1000-2000)/2000*100}'";

const KEYWORD_PROMPT: &str = "You are an answer generator for a search engine. You will be \
given a question and you return a list of relevant keywords to look for.\n\
Example: Q: 'what is the net operational profit in 2022?', A: 'business data, gross profit, \
operating expenses, net sales, revenue, cost of sales'";

/// Per-query overrides.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Text used for retrieval instead of the question itself.
    pub search_query: Option<String>,
    /// Passages to retrieve; defaults to `retrieval.top_k`.
    pub top_k: Option<usize>,
    /// Return every retrieved passage rather than only the cited ones.
    pub return_all: bool,
}

/// System and user messages asking for an answer drawn from `passages`.
pub fn grounding_messages(query: &str, passages: &[Passage]) -> Vec<ChatMessage> {
    let excerpts = passages
        .iter()
        .map(|p| format!("Content: {}\nSource: {}", p.text, p.source_id))
        .collect::<Vec<_>>()
        .join("\n\n");
    vec![
        ChatMessage::system(GROUNDING_PROMPT),
        ChatMessage::user(format!(
            "QUESTION: {}\n=========\n{}\n=========\nFINAL ANSWER:",
            query, excerpts
        )),
    ]
}

/// Split a raw reply into the answer body and the cited source ids.
///
/// The body is everything before the first `SOURCES: ` marker; the ids are
/// read from after the last one.
pub fn split_answer(raw: &str) -> (String, Vec<String>) {
    let body = raw
        .split(SOURCES_MARKER)
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    let ids = match raw.rsplit_once(SOURCES_MARKER) {
        Some((_, tail)) => tail
            .split(", ")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    };
    (body, ids)
}

/// Passages cited by `raw`, in index order, each at most once. Unknown ids
/// are ignored.
pub fn get_sources(raw: &str, folder_index: &FolderIndex) -> Vec<Passage> {
    let (_, ids) = split_answer(raw);
    let cited: HashSet<&str> = ids.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    folder_index
        .passages()
        .filter(|p| cited.contains(p.source_id.as_str()))
        .filter(|p| seen.insert((p.document_id.as_str(), p.source_id.as_str())))
        .cloned()
        .collect()
}

/// Byte ranges of the outermost balanced `{...}` groups, left to right.
/// Unmatched braces are literal text.
fn outermost_groups(text: &str) -> Vec<(usize, usize)> {
    let mut open = Vec::new();
    let mut pairs = Vec::new();
    for (i, b) in text.bytes().enumerate() {
        match b {
            b'{' => open.push(i),
            b'}' => {
                if let Some(start) = open.pop() {
                    pairs.push((start, i + 1));
                }
            }
            _ => {}
        }
    }
    pairs.sort_unstable();

    let mut groups: Vec<(usize, usize)> = Vec::new();
    for (start, end) in pairs {
        if groups.last().map_or(true, |&(_, last_end)| start >= last_end) {
            groups.push((start, end));
        }
    }
    groups
}

/// Replace each outermost `{expression}` with its evaluated value.
///
/// Groups are processed right to left so earlier offsets stay valid. A group
/// the evaluator rejects is left as written.
pub async fn resolve_computations(text: &str, evaluator: &dyn MathEvaluator) -> String {
    let mut out = text.to_string();
    for (start, end) in outermost_groups(text).into_iter().rev() {
        let expression = text[start + 1..end - 1].trim();
        match evaluator.evaluate(expression).await {
            Ok(value) => out.replace_range(start..end, &value),
            Err(e) => tracing::warn!("keeping unevaluated expression: {:#}", e),
        }
    }
    out
}

/// Answer `query` from `folder_index`.
pub async fn answer(
    services: &Services,
    query: &str,
    folder_index: &FolderIndex,
    options: &QueryOptions,
) -> Result<AnswerWithSources> {
    let search_query = options.search_query.as_deref().unwrap_or(query);
    let k = options.top_k.unwrap_or(services.config.retrieval.top_k);
    let passages = search(services, folder_index, search_query, k).await?;

    let messages = grounding_messages(query, &passages);
    let raw = services
        .completion
        .complete(&messages, services.config.completion.temperature)
        .await?;
    tracing::debug!("raw answer: {}", raw);

    let (body, _) = split_answer(&raw);
    let sources = if options.return_all {
        passages
    } else {
        get_sources(&raw, folder_index)
    };
    let answer = resolve_computations(&body, services.math.as_ref()).await;
    Ok(AnswerWithSources { answer, sources })
}

/// Ask the model for search keywords that would help answer `query`,
/// given a summary of the documents.
pub async fn expand_query(services: &Services, query: &str, summary: &str) -> Result<String> {
    let messages = vec![
        ChatMessage::system(format!("{}\nContext: {}", KEYWORD_PROMPT, summary)),
        ChatMessage::user(format!("question: {}", query)),
    ];
    let reply = services
        .completion
        .complete(&messages, services.config.completion.temperature)
        .await?;
    Ok(reply.trim().to_string())
}
