mod office;
mod pdf;

use anyhow::{Context, Result};
use tracing::info;

use crate::data::{self, DataAttachment};
use crate::ocr::{self, OcrEngine};
use crate::vision::PreprocessOptions;

#[cfg(test)]
pub(crate) use office::build_docx;
#[cfg(test)]
pub(crate) use pdf::build_pdf;

/// Pulls the text out of an application document.
///
/// Formats without a decoder produce an empty string rather than an error; callers treat that
/// as "nothing extracted".
pub fn extract_text(
    data: &DataAttachment,
    engine: &dyn OcrEngine,
    options: &PreprocessOptions,
) -> Result<String> {
    match data.mime.as_str() {
        mime if data.is_image() => {
            info!("extract: image {} (mime={})", data.display_name(), mime);
            let scan = ocr::scan(&data.bytes, engine, options)
                .with_context(|| format!("failed to read image {}", data.display_name()))?;
            Ok(scan.full_text)
        }
        data::PDF_MIME => {
            info!("extract: pdf {}", data.display_name());
            pdf::extract_pdf_text(&data.bytes)
                .with_context(|| format!("failed to read pdf {}", data.display_name()))
        }
        data::DOCX_MIME | data::DOC_MIME => {
            info!("extract: word document {}", data.display_name());
            office::extract_docx_text(&data.bytes)
                .with_context(|| format!("failed to read document {}", data.display_name()))
        }
        data::TEXT_MIME => {
            info!("extract: text {}", data.display_name());
            Ok(String::from_utf8_lossy(&data.bytes).into_owned())
        }
        other => {
            info!(
                "extract: no decoder for {} (mime={}), treating as empty",
                data.display_name(),
                other
            );
            Ok(String::new())
        }
    }
}
