use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};

pub const NOT_FOUND: &str = "not found";
pub const HEALTH_WARNING_FIELD: &str = "hws";

/// A regulated field and the keyword anchors that introduce its value in a document.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub id: &'static str,
    pub label: &'static str,
    pub keywords: &'static [&'static str],
}

/// Fields in the order they are laid out on an application form. Each field's value ends where
/// the next field's anchor begins, so this order is load-bearing.
pub const FIELD_CONFIG: &[FieldDescriptor] = &[
    FieldDescriptor {
        id: "brand",
        label: "Brand Name",
        keywords: &["brand name"],
    },
    FieldDescriptor {
        id: "type",
        label: "Class/Type",
        keywords: &["class/type designation", "class/type"],
    },
    FieldDescriptor {
        id: "abv",
        label: "Alcohol Content",
        keywords: &["alcohol content"],
    },
    FieldDescriptor {
        id: "net_contents",
        label: "Net Contents",
        keywords: &["net contents"],
    },
    FieldDescriptor {
        id: "address",
        label: "Address",
        keywords: &["name and address"],
    },
    FieldDescriptor {
        id: "origin",
        label: "Origin",
        keywords: &["country of origin"],
    },
    FieldDescriptor {
        id: HEALTH_WARNING_FIELD,
        label: "Health Warning",
        keywords: &["government health warning", "government warning"],
    },
];

/// Field values keyed by field id, in configuration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    values: Vec<(String, String)>,
}

impl ExtractedFields {
    /// Value for `id`, or [`NOT_FOUND`] when the field was never extracted.
    pub fn get(&self, id: &str) -> &str {
        self.values
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, value)| value.as_str())
            .unwrap_or(NOT_FOUND)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for ExtractedFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

pub fn extract_fields(text: &str) -> ExtractedFields {
    extract_fields_with(text, FIELD_CONFIG)
}

/// Slices `text` into field values by walking the anchors of `fields` in order.
///
/// A value runs from the end of its anchor to the start of the next field's anchor (searched
/// only after the value start), or to the end of the text. There is no backtracking.
pub fn extract_fields_with(text: &str, fields: &[FieldDescriptor]) -> ExtractedFields {
    let clean = collapse_whitespace(text);
    // ASCII lowering keeps byte offsets identical between `clean` and `lower`.
    let lower = clean.to_ascii_lowercase();

    let mut values = Vec::with_capacity(fields.len());
    for (idx, field) in fields.iter().enumerate() {
        let value = find_anchor(&lower, field.keywords, 0)
            .and_then(|(_, start)| {
                let end = fields
                    .get(idx + 1)
                    .and_then(|next| find_anchor(&lower, next.keywords, start))
                    .map(|(next_start, _)| next_start)
                    .unwrap_or(clean.len());
                clean_value(&clean[start..end])
            })
            .unwrap_or_else(|| NOT_FOUND.to_string());
        values.push((field.id.to_string(), value));
    }
    ExtractedFields { values }
}

/// First keyword (in keyword order) found at or after `from`, as `(anchor_start, anchor_end)`.
fn find_anchor(haystack: &str, keywords: &[&str], from: usize) -> Option<(usize, usize)> {
    keywords
        .iter()
        .filter(|keyword| !keyword.is_empty())
        .find_map(|keyword| {
            let needle = keyword.to_ascii_lowercase();
            haystack[from..]
                .find(&needle)
                .map(|pos| (from + pos, from + pos + needle.len()))
        })
}

fn clean_value(raw: &str) -> Option<String> {
    let value = raw
        .trim()
        .trim_start_matches(|ch: char| ch == ':' || ch == '-' || ch == '.' || ch.is_whitespace());
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub(crate) fn collapse_whitespace(value: &str) -> String {
    let mut out = String::new();
    let mut last_space = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out
}

const SPIRIT_KEYWORDS: &[&str] = &["whiskey", "vodka", "rum", "gin", "tequila"];
const WINE_KEYWORDS: &[&str] = &["wine"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Spirits,
    Wine,
    Beer,
}

impl Category {
    /// Spirits keywords win over wine; anything else is beer. Keywords match anywhere in the
    /// text, so "origin" counts as "gin".
    pub fn infer(text: &str) -> Self {
        let lower = text.to_lowercase();
        if contains_keyword(&lower, SPIRIT_KEYWORDS) {
            Category::Spirits
        } else if contains_keyword(&lower, WINE_KEYWORDS) {
            Category::Wine
        } else {
            Category::Beer
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Spirits => "Spirits",
            Category::Wine => "Wine",
            Category::Beer => "Beer",
        }
    }
}

fn contains_keyword(lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| lower.contains(*keyword))
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "spirits" | "spirit" => Ok(Category::Spirits),
            "wine" => Ok(Category::Wine),
            "beer" | "malt" => Ok(Category::Beer),
            other => Err(anyhow!(
                "unknown category '{}' (expected spirits, wine, beer)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APPLICATION: &str = "COLA application\n\
        Brand Name: Old Barrel Whiskey\n\
        Class/Type Designation - Straight Bourbon Whiskey\n\
        Alcohol Content: 45% ALC/VOL\n\
        Net Contents:   750 mL\n\
        Name and Address: Old Barrel Distilling Co., Bardstown, KY\n\
        Country of Origin: USA\n\
        Government Warning: (1) According to the Surgeon General...";

    #[test]
    fn extracts_every_configured_field() {
        let fields = extract_fields(APPLICATION);
        assert_eq!(fields.len(), FIELD_CONFIG.len());
        assert_eq!(fields.get("brand"), "Old Barrel Whiskey");
        assert_eq!(fields.get("type"), "Straight Bourbon Whiskey");
        assert_eq!(fields.get("abv"), "45% ALC/VOL");
        assert_eq!(fields.get("net_contents"), "750 mL");
        assert_eq!(
            fields.get("address"),
            "Old Barrel Distilling Co., Bardstown, KY"
        );
        assert_eq!(fields.get("origin"), "USA");
        assert_eq!(
            fields.get(HEALTH_WARNING_FIELD),
            "(1) According to the Surgeon General..."
        );
    }

    #[test]
    fn missing_anchor_yields_not_found() {
        let fields = extract_fields("Alcohol Content: 5%\nNet Contents: 12 FL OZ");
        assert_eq!(fields.get("brand"), NOT_FOUND);
        assert_eq!(fields.get("type"), NOT_FOUND);
        assert_eq!(fields.get("abv"), "5%");
        assert_eq!(fields.get("origin"), NOT_FOUND);
        assert_eq!(fields.get("net_contents"), "12 FL OZ");
    }

    #[test]
    fn value_runs_to_end_when_next_anchor_is_absent() {
        // brand's successor (class/type) never appears, so brand swallows the rest.
        let fields = extract_fields("Brand Name: Lakeside Lager Net Contents: 12 FL OZ");
        assert_eq!(fields.get("brand"), "Lakeside Lager Net Contents: 12 FL OZ");
    }

    #[test]
    fn empty_value_is_not_found() {
        let fields = extract_fields("Brand Name: .. -- Class/Type: Lager");
        assert_eq!(fields.get("brand"), NOT_FOUND);
        assert_eq!(fields.get("type"), "Lager");
    }

    #[test]
    fn anchors_are_case_insensitive_and_keep_value_case() {
        let fields = extract_fields("BRAND NAME:\tMoonRiver\n\nCLASS/TYPE: Vodka");
        assert_eq!(fields.get("brand"), "MoonRiver");
        assert_eq!(fields.get("type"), "Vodka");
    }

    #[test]
    fn keyword_priority_follows_configuration_order() {
        // "class/type designation" is tried before the shorter "class/type".
        let fields = extract_fields("Class/Type Designation: Gin Alcohol Content: 40%");
        assert_eq!(fields.get("type"), "Gin");
    }

    #[test]
    fn misordered_configuration_misattributes_values() {
        const SWAPPED: &[FieldDescriptor] = &[
            FieldDescriptor {
                id: "abv",
                label: "Alcohol Content",
                keywords: &["alcohol content"],
            },
            FieldDescriptor {
                id: "brand",
                label: "Brand Name",
                keywords: &["brand name"],
            },
        ];
        let fields = extract_fields_with("Brand Name: Aurora Alcohol Content: 12%", SWAPPED);
        assert_eq!(fields.get("abv"), "12%");
        assert_eq!(fields.get("brand"), "Aurora Alcohol Content: 12%");
    }

    #[test]
    fn serializes_in_configuration_order() {
        let fields = extract_fields("Brand Name: Aurora");
        let value = serde_json::to_string(&fields).expect("serialize");
        assert!(value.starts_with("{\"brand\":\"Aurora\",\"type\":\"not found\""));
    }

    #[test]
    fn infers_category_by_keyword_priority() {
        assert_eq!(Category::infer("Old Barrel WHISKEY"), Category::Spirits);
        assert_eq!(Category::infer("Table wine with vodka notes"), Category::Spirits);
        assert_eq!(Category::infer("Red Wine, Product of France"), Category::Wine);
        assert_eq!(Category::infer("India Pale Ale"), Category::Beer);
    }

    #[test]
    fn category_keywords_match_inside_words() {
        assert_eq!(
            Category::infer("Napa Valley Winery Cabernet Sauvignon"),
            Category::Wine
        );
        assert_eq!(Category::infer("RumChata cream liqueur"), Category::Spirits);
        assert_eq!(
            Category::infer("Pilsner. Country of Origin: Germany"),
            Category::Spirits
        );
    }

    #[test]
    fn parses_category_names() {
        assert_eq!("Spirits".parse::<Category>().unwrap(), Category::Spirits);
        assert_eq!(" wine ".parse::<Category>().unwrap(), Category::Wine);
        assert!("cider".parse::<Category>().is_err());
    }
}
