use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::vision::{BoldDetector, ClaheParams, PreprocessOptions};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub blur_threshold: f64,
    pub bold_ratio_threshold: f64,
    pub clahe_clip_limit: f32,
    pub clahe_tiles: u32,
    pub field_match_threshold: u8,
    pub health_warning_threshold: u8,
    pub ocr_languages: String,
    pub ocr_psm: u32,
    pub max_workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            blur_threshold: 100.0,
            bold_ratio_threshold: 0.04,
            clahe_clip_limit: 2.0,
            clahe_tiles: 8,
            field_match_threshold: 70,
            health_warning_threshold: 80,
            ocr_languages: "eng".to_string(),
            ocr_psm: 11,
            max_workers: 4,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    vision: Option<VisionSettings>,
    matching: Option<MatchingSettings>,
    ocr: Option<OcrSettings>,
    batch: Option<BatchSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct VisionSettings {
    blur_threshold: Option<f64>,
    bold_ratio_threshold: Option<f64>,
    clahe_clip_limit: Option<f32>,
    clahe_tiles: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct MatchingSettings {
    field_threshold: Option<u8>,
    health_warning_threshold: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    languages: Option<String>,
    psm: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct BatchSettings {
    max_workers: Option<usize>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn preprocess_options(&self) -> PreprocessOptions {
        PreprocessOptions {
            blur_threshold: self.blur_threshold,
            clahe: ClaheParams {
                clip_limit: self.clahe_clip_limit,
                tiles: self.clahe_tiles,
            },
        }
    }

    pub fn bold_detector(&self) -> BoldDetector {
        BoldDetector::new(self.bold_ratio_threshold)
    }

    /// Pool size: available parallelism, capped by `max_workers`.
    pub fn worker_count(&self) -> usize {
        num_cpus::get().min(self.max_workers).max(1)
    }

    fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(vision) = incoming.vision {
            if let Some(value) = vision.blur_threshold {
                if value >= 0.0 {
                    self.blur_threshold = value;
                }
            }
            if let Some(value) = vision.bold_ratio_threshold {
                if value > 0.0 {
                    self.bold_ratio_threshold = value;
                }
            }
            if let Some(value) = vision.clahe_clip_limit {
                if value > 0.0 {
                    self.clahe_clip_limit = value;
                }
            }
            if let Some(value) = vision.clahe_tiles {
                if value > 0 {
                    self.clahe_tiles = value;
                }
            }
        }
        if let Some(matching) = incoming.matching {
            if let Some(value) = matching.field_threshold {
                if value <= 100 {
                    self.field_match_threshold = value;
                }
            }
            if let Some(value) = matching.health_warning_threshold {
                if value <= 100 {
                    self.health_warning_threshold = value;
                }
            }
        }
        if let Some(ocr) = incoming.ocr {
            if let Some(languages) = ocr.languages {
                if !languages.trim().is_empty() {
                    self.ocr_languages = languages;
                }
            }
            if let Some(psm) = ocr.psm {
                self.ocr_psm = psm;
            }
        }
        if let Some(batch) = incoming.batch {
            if let Some(value) = batch.max_workers {
                if value > 0 {
                    self.max_workers = value;
                }
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".label-audit"))
        }
    })
}
