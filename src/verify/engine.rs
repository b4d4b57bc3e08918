use anyhow::{Context, Result};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::data::DataAttachment;
use crate::extract::extract_text;
use crate::fields::Category;
use crate::ocr::{self, OcrEngine};
use crate::settings::Settings;

use super::{ApplicationRecord, VerificationResult, verify_scan};

/// Refusal to start work because the engine is not ready for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionError {
    EmptyLibrary,
}

impl fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreconditionError::EmptyLibrary => {
                f.write_str("no applications ingested; ingest application documents first")
            }
        }
    }
}

impl std::error::Error for PreconditionError {}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    Ingested { file_name: String, category: Category },
    Failed { file_name: String, error: String },
}

/// Holds the application library and runs ingestion and verification against it.
///
/// Mutating the library needs `&mut self`; verification borrows a snapshot, so batches never
/// observe a half-ingested library.
pub struct Engine {
    ocr: Arc<dyn OcrEngine>,
    settings: Arc<Settings>,
    library: Arc<Vec<ApplicationRecord>>,
}

impl Engine {
    pub fn new(ocr: Arc<dyn OcrEngine>, settings: Settings) -> Self {
        Self {
            ocr,
            settings: Arc::new(settings),
            library: Arc::new(Vec::new()),
        }
    }

    pub fn applications(&self) -> &[ApplicationRecord] {
        &self.library
    }

    pub fn clear(&mut self) {
        info!("clearing {} applications", self.library.len());
        self.library = Arc::new(Vec::new());
    }

    pub fn ingest(&mut self, document: &DataAttachment) -> Result<Category> {
        let record = build_record(document, self.ocr.as_ref(), &self.settings)?;
        let category = record.category;
        Arc::make_mut(&mut self.library).push(record);
        Ok(category)
    }

    /// Ingests documents on the worker pool. Successful records are appended in submission
    /// order; failures are reported and skipped.
    pub async fn ingest_batch(&mut self, documents: Vec<DataAttachment>) -> Vec<IngestOutcome> {
        let workers = self.settings.worker_count();
        info!("ingesting {} documents on {} workers", documents.len(), workers);

        let tasks = documents.into_iter().enumerate().map(|(index, document)| {
            let ocr = Arc::clone(&self.ocr);
            let settings = Arc::clone(&self.settings);
            let file_name = document.display_name().to_string();
            async move {
                let joined = tokio::task::spawn_blocking(move || {
                    build_record(&document, ocr.as_ref(), &settings)
                })
                .await;
                let outcome = match joined {
                    Ok(Ok(record)) => Ok(record),
                    Ok(Err(err)) => Err(format!("{:#}", err)),
                    Err(err) => Err(format!("ingestion task failed: {}", err)),
                };
                (index, file_name, outcome)
            }
        });
        let mut finished = stream::iter(tasks)
            .buffer_unordered(workers)
            .collect::<Vec<_>>()
            .await;
        finished.sort_by_key(|(index, _, _)| *index);

        let library = Arc::make_mut(&mut self.library);
        finished
            .into_iter()
            .map(|(_, file_name, outcome)| match outcome {
                Ok(record) => {
                    let category = record.category;
                    library.push(record);
                    IngestOutcome::Ingested {
                        file_name,
                        category,
                    }
                }
                Err(error) => {
                    warn!("ingest: {} failed: {}", file_name, error);
                    IngestOutcome::Failed { file_name, error }
                }
            })
            .collect()
    }

    /// Verifies one label. An empty library yields an unmatched result rather than an error.
    pub fn verify_label(
        &self,
        label: &DataAttachment,
        forced: Option<Category>,
    ) -> Result<VerificationResult> {
        verify_attachment(label, self.ocr.as_ref(), &self.library, forced, &self.settings)
    }

    /// Verifies labels on the worker pool, returning one result per label in submission order.
    /// A label that fails, or whose task panics, becomes an error result.
    pub async fn verify_batch(
        &self,
        labels: Vec<DataAttachment>,
        forced: Option<Category>,
    ) -> Result<Vec<VerificationResult>> {
        if self.library.is_empty() {
            return Err(PreconditionError::EmptyLibrary.into());
        }
        let workers = self.settings.worker_count();
        info!(
            "verifying {} labels against {} applications on {} workers",
            labels.len(),
            self.library.len(),
            workers
        );

        let tasks = labels.into_iter().enumerate().map(|(index, label)| {
            let ocr = Arc::clone(&self.ocr);
            let settings = Arc::clone(&self.settings);
            let library = Arc::clone(&self.library);
            let label_file = label.display_name().to_string();
            async move {
                let joined = tokio::task::spawn_blocking(move || {
                    verify_attachment(&label, ocr.as_ref(), &library, forced, &settings)
                })
                .await;
                let result = match joined {
                    Ok(Ok(result)) => result,
                    Ok(Err(err)) => {
                        warn!("verify: {} failed: {:#}", label_file, err);
                        VerificationResult::error(&label_file, forced, format!("{:#}", err))
                    }
                    Err(err) => {
                        warn!("verify: {} task failed: {}", label_file, err);
                        VerificationResult::error(
                            &label_file,
                            forced,
                            format!("verification task failed: {}", err),
                        )
                    }
                };
                (index, result)
            }
        });
        let mut finished = stream::iter(tasks)
            .buffer_unordered(workers)
            .collect::<Vec<_>>()
            .await;
        finished.sort_by_key(|(index, _)| *index);
        Ok(finished.into_iter().map(|(_, result)| result).collect())
    }
}

fn build_record(
    document: &DataAttachment,
    ocr: &dyn OcrEngine,
    settings: &Settings,
) -> Result<ApplicationRecord> {
    let text = extract_text(document, ocr, &settings.preprocess_options())?;
    let record = ApplicationRecord::from_text(document.display_name(), &text);
    info!(
        "ingest: {} -> {} ({} chars)",
        record.file_name,
        record.category,
        text.len()
    );
    Ok(record)
}

fn verify_attachment(
    label: &DataAttachment,
    ocr: &dyn OcrEngine,
    library: &[ApplicationRecord],
    forced: Option<Category>,
    settings: &Settings,
) -> Result<VerificationResult> {
    let started = Instant::now();
    let scan = ocr::scan(&label.bytes, ocr, &settings.preprocess_options())
        .with_context(|| format!("failed to scan label {}", label.display_name()))?;
    let mut result = verify_scan(label.display_name(), &scan, library, forced, settings);
    result.latency = started.elapsed();
    info!(
        "verify: {} -> {:?} (app={}, {:.2}s)",
        result.label_file,
        result.ai_status(),
        result.app_file,
        result.latency.as_secs_f64()
    );
    Ok(result)
}
