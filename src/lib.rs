use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

pub mod data;
pub mod extract;
pub mod fields;
pub mod fuzzy;
pub mod logging;
pub mod ocr;
pub mod settings;
pub mod verify;
pub mod vision;

#[cfg(test)]
mod test_util;

pub use fields::Category;
pub use ocr::{OcrEngine, TesseractOcr};
pub use settings::Settings;
pub use verify::{
    ApplicationRecord, Engine, FieldComparison, IngestOutcome, MatchStatus, PreconditionError,
    ReviewDecision, Verdict, VerificationResult,
};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub apps: Vec<String>,
    pub labels: Vec<String>,
    pub app_mime: Option<String>,
    pub category: Option<String>,
    pub settings_path: Option<String>,
}

#[derive(Serialize)]
struct LibraryReport<'a> {
    ingested: &'a [IngestOutcome],
    applications: &'a [ApplicationRecord],
}

#[derive(Serialize)]
struct VerificationReport<'a> {
    ingested: &'a [IngestOutcome],
    results: &'a [VerificationResult],
}

/// Ingests the application documents, verifies the labels against them and renders the outcome
/// as pretty JSON. Without labels the ingested library is rendered instead.
pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let forced = config
        .category
        .as_deref()
        .map(str::parse::<Category>)
        .transpose()?;

    if config.apps.is_empty() {
        return Err(anyhow!("no application documents given (use --app)"));
    }

    let documents = config
        .apps
        .iter()
        .map(|path| data::load_attachment(Path::new(path), config.app_mime.as_deref()))
        .collect::<Result<Vec<_>>>()?;

    let ocr = TesseractOcr::new(&settings.ocr_languages, settings.ocr_psm)
        .with_context(|| "failed to set up tesseract")?;
    let mut engine = Engine::new(Arc::new(ocr), settings);
    let ingested = engine.ingest_batch(documents).await;

    if config.labels.is_empty() {
        let report = LibraryReport {
            ingested: &ingested,
            applications: engine.applications(),
        };
        return serde_json::to_string_pretty(&report).with_context(|| "failed to render library");
    }

    let results = verify_paths(&engine, &config.labels, forced).await?;
    let report = VerificationReport {
        ingested: &ingested,
        results: &results,
    };
    serde_json::to_string_pretty(&report).with_context(|| "failed to render results")
}

/// Loads and verifies label files in order. A label that cannot be read becomes an error result
/// in its slot while the rest of the batch still runs.
async fn verify_paths(
    engine: &Engine,
    paths: &[String],
    forced: Option<Category>,
) -> Result<Vec<VerificationResult>> {
    let mut loaded = Vec::with_capacity(paths.len());
    let mut slots = Vec::with_capacity(paths.len());
    for path in paths {
        match data::load_attachment(Path::new(path), None) {
            Ok(label) => {
                loaded.push(label);
                slots.push(None);
            }
            Err(err) => {
                warn!("verify: {} could not be loaded: {:#}", path, err);
                let label_file = Path::new(path)
                    .file_name()
                    .and_then(|value| value.to_str())
                    .unwrap_or(path.as_str());
                slots.push(Some(VerificationResult::error(
                    label_file,
                    forced,
                    format!("{:#}", err),
                )));
            }
        }
    }

    let mut verified = engine.verify_batch(loaded, forced).await?.into_iter();
    Ok(slots
        .into_iter()
        .filter_map(|slot| slot.or_else(|| verified.next()))
        .collect())
}
