use std::io::Cursor;
use std::sync::Arc;

use anyhow::Result;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use label_audit::data::{DataAttachment, load_attachment_from_bytes};
use label_audit::extract::extract_text;
use label_audit::fields::{Category, extract_fields};
use label_audit::ocr::{BBoxPx, OcrDetection, OcrEngine, Quad};
use label_audit::verify::HEALTH_WARNING_TEXT;
use label_audit::vision::PreprocessOptions;
use label_audit::{Engine, Settings, Verdict};

const LAKESIDE: &str = "Brand Name:\tLakeside Lager\n\
    Class/Type Designation: American Pale Lager\n\n\
    Alcohol Content: 5% ALC/VOL\n\
    Net Contents: 12 FL OZ\n\
    Name and Address: Lakeside Brewing Co., Duluth, MN\n\
    Country of Origin: USA\n\
    GOVERNMENT WARNING: Drink responsibly.";

struct ScriptedOcr(Vec<(&'static str, u32)>);

impl OcrEngine for ScriptedOcr {
    fn recognize(&self, _image: &RgbImage) -> Result<Vec<OcrDetection>> {
        Ok(self
            .0
            .iter()
            .map(|(text, y)| OcrDetection {
                quad: Quad::from_bbox(&BBoxPx {
                    x: 20,
                    y: *y,
                    w: 320,
                    h: 40,
                }),
                text: text.to_string(),
                confidence: 0.9,
            })
            .collect())
    }
}

fn label_png() -> Vec<u8> {
    let mut image = RgbImage::from_pixel(400, 240, Rgb([255, 255, 255]));
    for y in 170..190 {
        for x in 30..250 {
            image.put_pixel(x, y, Rgb([0, 0, 0]));
        }
    }
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut cursor, ImageFormat::Png)
        .unwrap();
    cursor.into_inner()
}

#[test]
fn application_fields_snapshot() {
    let document =
        load_attachment_from_bytes(LAKESIDE.as_bytes().to_vec(), Some("txt"), Some("lakeside.txt"))
            .unwrap();
    let text = extract_text(
        &document,
        &ScriptedOcr(Vec::new()),
        &PreprocessOptions::default(),
    )
    .unwrap();
    let mut rendered = extract_fields(&text)
        .iter()
        .map(|(id, value)| format!("{}: {}", id, value))
        .collect::<Vec<_>>();
    rendered.push(format!("category: {}", Category::infer(&text)));

    insta::assert_snapshot!(rendered.join("\n"), @r"
    brand: Lakeside Lager
    type: American Pale Lager
    abv: 5% ALC/VOL
    net_contents: 12 FL OZ
    address: Lakeside Brewing Co., Duluth, MN
    origin: USA
    hws: Drink responsibly.
    category: Spirits
    ");
}

#[tokio::test]
async fn audit_flags_only_the_missing_field() {
    let ocr = ScriptedOcr(vec![
        ("LAKESIDE LAGER", 20),
        ("American Pale Lager 5% ALC/VOL 12 FL OZ", 60),
        ("Brewed by Lakeside Brewing Co., Duluth, MN", 100),
        (HEALTH_WARNING_TEXT, 160),
    ]);
    let mut engine = Engine::new(Arc::new(ocr), Settings::default());
    let category = engine
        .ingest(
            &load_attachment_from_bytes(
                LAKESIDE.as_bytes().to_vec(),
                Some("auto"),
                Some("lakeside.txt"),
            )
            .unwrap(),
        )
        .unwrap();
    // "Country of Origin" contains the spirits keyword "gin".
    assert_eq!(category, Category::Spirits);

    let label = DataAttachment {
        bytes: label_png(),
        mime: "image/png".to_string(),
        name: Some("lakeside_front.png".to_string()),
    };
    let results = engine.verify_batch(vec![label], None).await.unwrap();
    assert_eq!(results.len(), 1);

    let result = &results[0];
    assert_eq!(result.app_file, "lakeside.txt");
    assert_eq!(result.ai_status(), Verdict::Fail);
    let failed = result
        .comparisons()
        .iter()
        .filter(|comparison| comparison.status == label_audit::MatchStatus::Fail)
        .map(|comparison| comparison.field.as_str())
        .collect::<Vec<_>>();
    assert_eq!(failed, vec!["Origin"]);
}
