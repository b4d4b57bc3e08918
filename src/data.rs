use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const PDF_MIME: &str = "application/pdf";
pub const DOC_MIME: &str = "application/msword";
pub const TEXT_MIME: &str = "text/plain";
pub const OCTET_STREAM_MIME: &str = "application/octet-stream";

/// Raw bytes of an uploaded document or label, with its resolved mime type.
#[derive(Debug, Clone)]
pub struct DataAttachment {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub name: Option<String>,
}

impl DataAttachment {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}

pub fn load_attachment(path: &Path, mime_hint: Option<&str>) -> Result<DataAttachment> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read data file: {}", path.display()))?;
    let mime = resolve_mime(mime_hint.unwrap_or("auto"), &bytes, Some(path))?;
    let name = path
        .file_name()
        .and_then(|value| value.to_str())
        .map(|value| value.to_string());
    Ok(DataAttachment { bytes, mime, name })
}

pub fn load_attachment_from_bytes(
    bytes: Vec<u8>,
    mime_hint: Option<&str>,
    name: Option<&str>,
) -> Result<DataAttachment> {
    let path = name.map(PathBuf::from);
    let mime = resolve_mime(mime_hint.unwrap_or("auto"), &bytes, path.as_deref())?;
    Ok(DataAttachment {
        bytes,
        mime,
        name: name.map(|value| value.to_string()),
    })
}

fn resolve_mime(input: &str, bytes: &[u8], path: Option<&Path>) -> Result<String> {
    let raw = input.trim();
    if raw.is_empty() {
        return Err(anyhow!("mime hint is empty"));
    }
    let lower = raw.to_lowercase();

    match lower.as_str() {
        "auto" => return Ok(detect_mime(bytes, path)),
        "image" | "image/*" => {
            let detected = detect_mime(bytes, path);
            if !detected.starts_with("image/") {
                return Err(anyhow!(
                    "mime hint image/* requires image data (detected '{}')",
                    detected
                ));
            }
            return Ok(detected);
        }
        "pdf" => return Ok(PDF_MIME.to_string()),
        "doc" => return Ok(DOC_MIME.to_string()),
        "docx" => return Ok(DOCX_MIME.to_string()),
        "txt" | "text" => return Ok(TEXT_MIME.to_string()),
        _ => {}
    }

    if let Some(mime) = mime_from_extension(&lower) {
        return Ok(mime.to_string());
    }
    if lower == DOCX_MIME || lower == PDF_MIME || lower == DOC_MIME || lower == TEXT_MIME {
        return Ok(lower);
    }
    if lower.starts_with("image/") {
        return Ok(lower);
    }

    Err(anyhow!(
        "unsupported mime hint '{}' (expected auto, image, pdf, doc, docx, txt, or a mime type)",
        raw
    ))
}

/// Content sniffing first, file extension second. Anything unrecognised is an octet stream.
fn detect_mime(bytes: &[u8], path: Option<&Path>) -> String {
    if let Some(detected) = sniff_mime_bytes(bytes) {
        return detected.to_string();
    }
    extension_lower(path)
        .and_then(|ext| mime_from_extension(&ext))
        .unwrap_or(OCTET_STREAM_MIME)
        .to_string()
}

fn sniff_mime_bytes(bytes: &[u8]) -> Option<&'static str> {
    let kind = infer::get(bytes)?;
    let detected = kind.mime_type();
    if detected.starts_with("image/") {
        return Some(detected);
    }
    match detected {
        PDF_MIME => Some(PDF_MIME),
        DOC_MIME => Some(DOC_MIME),
        DOCX_MIME => Some(DOCX_MIME),
        "application/zip" => detect_office_in_zip(bytes),
        _ => None,
    }
}

fn detect_office_in_zip(bytes: &[u8]) -> Option<&'static str> {
    if contains_bytes(bytes, b"word/") {
        return Some(DOCX_MIME);
    }
    None
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || haystack.len() < needle.len() {
        return false;
    }
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}

fn extension_lower(path: Option<&Path>) -> Option<String> {
    path.and_then(|path| path.extension())
        .and_then(|value| value.to_str())
        .map(|value| value.to_lowercase())
}

fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "pdf" => Some(PDF_MIME),
        "doc" => Some(DOC_MIME),
        "docx" => Some(DOCX_MIME),
        "txt" => Some(TEXT_MIME),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "tiff" | "tif" => Some("image/tiff"),
        _ => None,
    }
}
