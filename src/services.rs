//! The collaborator handle.
//!
//! [`Services`] is built once from a [`Config`] and passed by reference to
//! every pipeline stage. Tests assemble it from fakes with [`Services::new`].

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::completion::{create_completion, CompletionService};
use crate::config::Config;
use crate::crawl::{Crawler, HttpCrawler};
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::math::{create_evaluator, MathEvaluator};
use crate::ocr::{HttpOcrService, OcrService};

pub struct Services {
    pub config: Config,
    pub completion: Arc<dyn CompletionService>,
    pub embedding: Arc<dyn EmbeddingProvider>,
    pub math: Arc<dyn MathEvaluator>,
    pub crawler: Arc<dyn Crawler>,
    pub ocr: Option<Arc<dyn OcrService>>,
}

impl Services {
    /// Connect every collaborator named in `config`.
    ///
    /// Fails with [`DocQaError::UnsupportedModel`](crate::error::DocQaError)
    /// for an unknown completion backend, before any network call.
    pub fn from_config(config: Config) -> Result<Self> {
        let completion: Arc<dyn CompletionService> =
            Arc::from(create_completion(&config.completion)?);
        let embedding: Arc<dyn EmbeddingProvider> = Arc::from(
            create_provider(&config.embedding).context("Failed to set up embedding provider")?,
        );
        let math: Arc<dyn MathEvaluator> =
            Arc::from(create_evaluator(&config.math).context("Failed to set up math evaluator")?);
        let crawler: Arc<dyn Crawler> = Arc::new(HttpCrawler::new(&config.crawl)?);
        let ocr: Option<Arc<dyn OcrService>> = if config.ocr.enabled {
            Some(Arc::new(HttpOcrService::new(&config.ocr)?))
        } else {
            None
        };

        tracing::info!(
            "services ready: completion={} embedding={} math={} ocr={}",
            completion.model_name(),
            embedding.model_name(),
            config.math.provider,
            ocr.is_some()
        );

        Ok(Self {
            config,
            completion,
            embedding,
            math,
            crawler,
            ocr,
        })
    }

    /// Assemble from explicit collaborators. OCR starts disabled.
    pub fn new(
        config: Config,
        completion: Arc<dyn CompletionService>,
        embedding: Arc<dyn EmbeddingProvider>,
        math: Arc<dyn MathEvaluator>,
        crawler: Arc<dyn Crawler>,
    ) -> Self {
        Self {
            config,
            completion,
            embedding,
            math,
            crawler,
            ocr: None,
        }
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrService>) -> Self {
        self.ocr = Some(ocr);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocQaError;

    #[test]
    fn debug_backend_builds_offline() {
        let mut config = Config::default();
        config.completion.backend = "debug".to_string();
        let services = Services::from_config(config).unwrap();
        assert_eq!(services.completion.model_name(), "debug");
        assert_eq!(services.embedding.model_name(), "hash");
        assert!(services.ocr.is_none());
    }

    #[test]
    fn unsupported_backend_fails_construction() {
        let mut config = Config::default();
        config.completion.backend = "claude-instant".to_string();
        let err = Services::from_config(config).err().unwrap();
        assert_eq!(
            err.downcast_ref::<DocQaError>(),
            Some(&DocQaError::UnsupportedModel("claude-instant".to_string()))
        );
    }
}
