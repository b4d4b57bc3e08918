use anyhow::{Context, Result, anyhow};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::io::{Cursor, Read};
use zip::ZipArchive;

const DOCUMENT_ENTRY: &str = "word/document.xml";

/// Paragraph texts of a `.docx` body, in document order, joined by single spaces.
pub(super) fn extract_docx_text(bytes: &[u8]) -> Result<String> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).with_context(|| "failed to read docx archive")?;
    let mut entry = archive
        .by_name(DOCUMENT_ENTRY)
        .with_context(|| format!("docx is missing {}", DOCUMENT_ENTRY))?;
    let mut xml = Vec::new();
    entry
        .read_to_end(&mut xml)
        .with_context(|| "failed to read docx document entry")?;
    let paragraphs = docx_paragraphs(&xml)?;
    Ok(paragraphs.join(" "))
}

fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    reader.trim_text(false);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    // Text boxes nest whole paragraphs inside a run of the outer one.
    let mut depth = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:p" => {
                    if depth == 0 {
                        current = Some(String::new());
                    } else if let Some(text) = current.as_mut() {
                        separate(text);
                    }
                    depth += 1;
                }
                b"w:t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:p" if depth == 0 => paragraphs.push(String::new()),
                b"w:tab" => {
                    if let Some(text) = current.as_mut() {
                        text.push('\t');
                    }
                }
                b"w:br" | b"w:cr" => {
                    if let Some(text) = current.as_mut() {
                        text.push('\n');
                    }
                }
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:p" => {
                    depth = depth.saturating_sub(1);
                    if depth > 0 {
                        if let Some(text) = current.as_mut() {
                            separate(text);
                        }
                    } else if let Some(text) = current.take() {
                        paragraphs.push(text);
                    }
                }
                b"w:t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text {
                    if let Some(text) = current.as_mut() {
                        text.push_str(&e.unescape()?);
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if in_text {
                    if let Some(text) = current.as_mut() {
                        text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(anyhow!("failed to parse docx xml: {}", err)),
        }
        buf.clear();
    }
    Ok(paragraphs)
}

fn separate(text: &mut String) {
    if !text.is_empty() && !text.ends_with(char::is_whitespace) {
        text.push(' ');
    }
}

#[cfg(test)]
pub(crate) fn build_docx(paragraphs: &[&str]) -> Vec<u8> {
    use std::io::Write;
    use zip::ZipWriter;
    use zip::write::FileOptions;

    let mut body = String::new();
    for paragraph in paragraphs {
        body.push_str("<w:p><w:r><w:t xml:space=\"preserve\">");
        body.push_str(
            &paragraph
                .replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;"),
        );
        body.push_str("</w:t></w:r></w:p>");
    }
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{}</w:body></w:document>",
        body
    );

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(DOCUMENT_ENTRY, FileOptions::default())
        .expect("start docx entry");
    writer.write_all(xml.as_bytes()).expect("write docx entry");
    writer.finish().expect("finish docx").into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_paragraphs_in_order() {
        let bytes = build_docx(&["Brand Name: Old Barrel", "Alcohol Content: 45% & proof"]);
        let text = extract_docx_text(&bytes).expect("docx text");
        assert_eq!(text, "Brand Name: Old Barrel Alcohol Content: 45% & proof");
    }

    #[test]
    fn concatenates_runs_within_a_paragraph() {
        let xml = br#"<w:document><w:body>
            <w:p><w:r><w:t>Net </w:t></w:r><w:r><w:t>Contents</w:t></w:r><w:r><w:tab/><w:t>750 mL</w:t></w:r></w:p>
            <w:p/>
            <w:p><w:r><w:t>USA</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let paragraphs = docx_paragraphs(xml).expect("paragraphs");
        assert_eq!(paragraphs, vec!["Net Contents\t750 mL", "", "USA"]);
    }

    #[test]
    fn text_box_paragraphs_stay_inside_the_outer_paragraph() {
        let xml = br#"<w:document><w:body>
            <w:p><w:r><w:t>Brand Name: Aurora</w:t></w:r><w:r><w:pict><w:txbxContent>
                <w:p><w:r><w:t>Estate</w:t></w:r></w:p>
                <w:p/>
            </w:txbxContent></w:pict></w:r><w:r><w:t>Reserve</w:t></w:r></w:p>
            <w:p><w:r><w:t>Net Contents: 750 mL</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let paragraphs = docx_paragraphs(xml).expect("paragraphs");
        assert_eq!(
            paragraphs,
            vec!["Brand Name: Aurora Estate Reserve", "Net Contents: 750 mL"]
        );
    }

    #[test]
    fn rejects_non_zip_bytes() {
        assert!(extract_docx_text(b"plain text, not a docx").is_err());
    }
}
