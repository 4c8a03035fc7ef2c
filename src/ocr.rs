//! Image text decoding (OCR) for PDF page images.
//!
//! OCR runs as an asynchronous job on an external service: an image is
//! submitted, then polled until it completes. Each job is a small state
//! machine:
//!
//! ```text
//!            poll: completed
//!  Pending ───────────────────▶ Resolved(text)
//!     │
//!     │ round cap or deadline reached
//!     ▼
//!  Abandoned
//! ```
//!
//! [`resolve_jobs`] polls every pending job once per round, waits between
//! rounds, and stops after `max_rounds` or when the optional deadline
//! elapses. Jobs still pending at that point are abandoned; the document
//! keeps its text layer. Dropping the returned future cancels polling.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;

use crate::config::OcrConfig;
use crate::error::DocQaError;
use crate::extract::normalize_text;
use crate::models::Document;
use crate::progress::{Phase, ProgressEvent, ProgressReporter};

pub const IMAGE_TEXT_OPEN: &str = "----- img_data -----";
pub const IMAGE_TEXT_CLOSE: &str = "----- end -----";

/// Result of polling one job.
#[derive(Debug, Clone, PartialEq)]
pub enum OcrPoll {
    Pending,
    Completed(String),
}

/// An external OCR / image-understanding service.
#[async_trait]
pub trait OcrService: Send + Sync {
    /// Submit an image; returns the job id.
    async fn submit(&self, name: &str, data: &[u8]) -> Result<String>;
    /// Check a job's status.
    async fn poll(&self, uid: &str) -> Result<OcrPoll>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum OcrJobState {
    Pending,
    Resolved(String),
    Abandoned,
}

/// One submitted image, bound to the unit (page) its text belongs to.
#[derive(Debug, Clone)]
pub struct OcrJob {
    pub uid: String,
    /// Position of the target unit in `Document::units`.
    pub unit_position: usize,
    pub state: OcrJobState,
    pub polls: u32,
}

impl OcrJob {
    pub fn new(uid: String, unit_position: usize) -> Self {
        Self {
            uid,
            unit_position,
            state: OcrJobState::Pending,
            polls: 0,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == OcrJobState::Pending
    }

    fn resolve(&mut self, text: String) {
        if self.is_pending() {
            self.state = OcrJobState::Resolved(text);
        }
    }

    fn abandon(&mut self) {
        if self.is_pending() {
            self.state = OcrJobState::Abandoned;
        }
    }
}

/// Timing and budget for submitting and polling OCR jobs.
#[derive(Debug, Clone)]
pub struct OcrPolicy {
    pub max_rounds: u32,
    pub poll_delay: Duration,
    pub round_delay: Duration,
    pub submit_delay: Duration,
    pub deadline: Option<Duration>,
}

impl OcrPolicy {
    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            max_rounds: config.max_rounds,
            poll_delay: Duration::from_millis(config.poll_delay_ms),
            round_delay: Duration::from_millis(config.round_delay_ms),
            submit_delay: Duration::from_millis(config.submit_delay_ms),
            deadline: config.deadline_secs.map(Duration::from_secs),
        }
    }

    /// No waiting at all; useful for tests and local services.
    pub fn immediate(max_rounds: u32) -> Self {
        Self {
            max_rounds,
            poll_delay: Duration::ZERO,
            round_delay: Duration::ZERO,
            submit_delay: Duration::ZERO,
            deadline: None,
        }
    }
}

/// Poll jobs until all resolve, the round cap is hit, or the deadline passes.
/// Returns every job; none are left `Pending`.
pub async fn resolve_jobs(
    service: &dyn OcrService,
    mut jobs: Vec<OcrJob>,
    policy: &OcrPolicy,
    subject: &str,
    progress: &dyn ProgressReporter,
) -> Vec<OcrJob> {
    let mut rounds = 0u32;
    {
        let polling = poll_rounds(service, &mut jobs, policy, &mut rounds, subject, progress);
        match policy.deadline {
            Some(deadline) => {
                if tokio::time::timeout(deadline, polling).await.is_err() {
                    tracing::debug!("OCR deadline of {:?} reached for {}", deadline, subject);
                }
            }
            None => polling.await,
        }
    }

    let pending = jobs.iter().filter(|j| j.is_pending()).count();
    if pending > 0 {
        let timeout = DocQaError::OcrTimeout { pending, rounds };
        tracing::warn!("{}: {}; continuing without their text", subject, timeout);
        for job in jobs.iter_mut() {
            job.abandon();
        }
    }
    jobs
}

async fn poll_rounds(
    service: &dyn OcrService,
    jobs: &mut [OcrJob],
    policy: &OcrPolicy,
    rounds: &mut u32,
    subject: &str,
    progress: &dyn ProgressReporter,
) {
    let total = jobs.len() as u64;
    let mut done = 0u64;

    while *rounds < policy.max_rounds && jobs.iter().any(OcrJob::is_pending) {
        for job in jobs.iter_mut().filter(|j| j.is_pending()) {
            job.polls += 1;
            match service.poll(&job.uid).await {
                Ok(OcrPoll::Completed(text)) => {
                    job.resolve(text);
                    done += 1;
                    progress.report(ProgressEvent {
                        phase: Phase::DecodingImages,
                        subject: subject.to_string(),
                        n: done,
                        total,
                    });
                }
                Ok(OcrPoll::Pending) => {}
                Err(e) => tracing::warn!("OCR poll failed for job {}: {}", job.uid, e),
            }
            if !policy.poll_delay.is_zero() {
                tokio::time::sleep(policy.poll_delay).await;
            }
        }
        *rounds += 1;

        let more = *rounds < policy.max_rounds && jobs.iter().any(OcrJob::is_pending);
        if more && !policy.round_delay.is_zero() {
            tokio::time::sleep(policy.round_delay).await;
        }
    }
}

/// Append the text of resolved jobs to their page units, delimited by the
/// image-data markers.
pub fn append_resolved(doc: &mut Document, jobs: &[OcrJob]) {
    for job in jobs {
        let OcrJobState::Resolved(text) = &job.state else {
            continue;
        };
        let text = normalize_text(text);
        if text.is_empty() {
            continue;
        }
        if let Some(unit) = doc.units.get_mut(job.unit_position) {
            if !unit.content.is_empty() {
                unit.content.push('\n');
            }
            unit.content.push_str(IMAGE_TEXT_OPEN);
            unit.content.push('\n');
            unit.content.push_str(&text);
            unit.content.push('\n');
            unit.content.push_str(IMAGE_TEXT_CLOSE);
        }
    }
}

// ============ HTTP OCR service ============

/// OCR service speaking a minimal JSON job API:
///
/// - `POST {url}/jobs` with `{"name", "data"}` (base64 image) → `{"uid"}`
/// - `GET {url}/jobs/{uid}` → `{"completed", "document_text"}`
pub struct HttpOcrService {
    client: reqwest::Client,
    url: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    uid: String,
}

#[derive(Deserialize)]
struct PollResponse {
    completed: bool,
    #[serde(default)]
    document_text: Option<String>,
}

impl HttpOcrService {
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("ocr.url required for the OCR service"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl OcrService for HttpOcrService {
    async fn submit(&self, name: &str, data: &[u8]) -> Result<String> {
        let body = serde_json::json!({
            "name": name,
            "data": base64::engine::general_purpose::STANDARD.encode(data),
        });
        let response = self
            .client
            .post(format!("{}/jobs", self.url))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OCR submit error {}: {}", status, body_text);
        }
        let parsed: SubmitResponse = response.json().await?;
        Ok(parsed.uid)
    }

    async fn poll(&self, uid: &str) -> Result<OcrPoll> {
        let response = self
            .client
            .get(format!("{}/jobs/{}", self.url, uid))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OCR poll error {}: {}", status, body_text);
        }
        let parsed: PollResponse = response.json().await?;
        Ok(if parsed.completed {
            OcrPoll::Completed(parsed.document_text.unwrap_or_default())
        } else {
            OcrPoll::Pending
        })
    }
}
