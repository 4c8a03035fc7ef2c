//! Multi-section analysis reports.
//!
//! For each topic of a [`ReportOutline`], retrieve context for the topic's
//! description and ask the model for one section. Sections are emitted in
//! outline order under a `<title>:` header.

use anyhow::Result;

use crate::completion::ChatMessage;
use crate::config::ReportConfig;
use crate::indexer::FolderIndex;
use crate::progress::{Phase, ProgressEvent, ProgressReporter};
use crate::retrieve::search;
use crate::services::Services;

const ANALYST_PROMPT: &str = "You are an excellent analyst that writes reports based on a given \
topic and the information supplied regarding it.";

const DEFAULT_TOPICS: [(&str, &str); 8] = [
    (
        "Company Overview",
        "Company Overview, this includes Company Headcount, Number of Clients, Geography \
         Presence, Number of Products, and Key Milestones and Figures",
    ),
    (
        "Market Analysis",
        "the market analysis for the company and a detailed assessment of the business's target \
         market and the competitive landscape within their specific industry",
    ),
    (
        "Products/Services Offering",
        "the product or service offering being sold by the company",
    ),
    ("Business Model", "The business model of the company"),
    ("Pricing", "The pricing of the company and their products"),
    (
        "Financial Analysis",
        "The Financials of the company including the balance sheet, the income statement, and \
         the cash flow statement",
    ),
    (
        "Strategy Analysis",
        "The strategy of the company and how they plan to approach the market",
    ),
    (
        "Final Recommendations and Analysis",
        "the company's market approach and their financials",
    ),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Topic {
    pub title: String,
    pub description: String,
}

/// Ordered report topics.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutline {
    pub topics: Vec<Topic>,
}

impl ReportOutline {
    pub fn new(topics: Vec<(String, String)>) -> Self {
        Self {
            topics: topics
                .into_iter()
                .map(|(title, description)| Topic { title, description })
                .collect(),
        }
    }

    /// The configured topics, or the built-in company analysis outline.
    pub fn from_config(config: &ReportConfig) -> Self {
        if config.topics.is_empty() {
            return Self::default();
        }
        Self::new(
            config
                .topics
                .iter()
                .map(|t| (t.title.clone(), t.description.clone()))
                .collect(),
        )
    }
}

impl Default for ReportOutline {
    fn default() -> Self {
        Self::new(
            DEFAULT_TOPICS
                .iter()
                .map(|(t, d)| (t.to_string(), d.to_string()))
                .collect(),
        )
    }
}

fn retrieval_query(description: &str) -> String {
    format!(
        "get me all information regarding the following topic: {}",
        description
    )
}

fn section_prompt(title: &str, context: &str) -> String {
    format!(
        "Write a detailed report on the following topic: {}, based on the info below. Don't \
         refer to the sources given in the retrieved data, and if there is not enough data just \
         say that not enough data was supplied.\ninfo:\n{}",
        title, context
    )
}

/// Write one section per topic. Makes exactly one completion call per topic.
pub async fn write_report(
    services: &Services,
    folder_index: &FolderIndex,
    outline: &ReportOutline,
    progress: &dyn ProgressReporter,
) -> Result<String> {
    let total = outline.topics.len() as u64;
    let mut out = String::new();

    for (i, topic) in outline.topics.iter().enumerate() {
        let passages = search(
            services,
            folder_index,
            &retrieval_query(&topic.description),
            services.config.report.context_k,
        )
        .await?;
        let context = passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let messages = vec![
            ChatMessage::system(ANALYST_PROMPT),
            ChatMessage::user(section_prompt(&topic.title, &context)),
        ];
        let section = services
            .completion
            .complete(&messages, services.config.completion.temperature)
            .await?;
        tracing::info!("wrote report section {:?}", topic.title);

        out.push_str(&format!("\n\n{}:\n\n", topic.title));
        out.push_str(section.trim());

        progress.report(ProgressEvent {
            phase: Phase::Reporting,
            subject: topic.title.clone(),
            n: i as u64 + 1,
            total,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopicConfig;

    #[test]
    fn default_outline_has_eight_topics_in_order() {
        let outline = ReportOutline::default();
        assert_eq!(outline.topics.len(), 8);
        assert_eq!(outline.topics[0].title, "Company Overview");
        assert_eq!(
            outline.topics[7].title,
            "Final Recommendations and Analysis"
        );
    }

    #[test]
    fn configured_topics_replace_defaults() {
        let config = ReportConfig {
            context_k: 3,
            topics: vec![TopicConfig {
                title: "Risks".to_string(),
                description: "the main risks".to_string(),
            }],
        };
        let outline = ReportOutline::from_config(&config);
        assert_eq!(
            outline.topics,
            vec![Topic {
                title: "Risks".to_string(),
                description: "the main risks".to_string()
            }]
        );
        assert_eq!(
            ReportOutline::from_config(&ReportConfig::default()),
            ReportOutline::default()
        );
    }

    #[test]
    fn retrieval_query_wraps_description() {
        assert_eq!(
            retrieval_query("pricing"),
            "get me all information regarding the following topic: pricing"
        );
    }
}
