use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::{AspectRatioPreset, Catalog, StylePreset};
use crate::error::StudioError;

pub const DEFAULT_CAMERA: &str = "standard lens";
pub const DEFAULT_LIGHTING: &str = "natural lighting";
pub const DEFAULT_MOOD: &str = "neutral";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    #[default]
    Generate,
    Edit,
}

impl AppMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppMode::Generate => "generate",
            AppMode::Edit => "edit",
        }
    }
}

impl fmt::Display for AppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppMode {
    type Err = StudioError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "generate" | "gen" => Ok(AppMode::Generate),
            "edit" => Ok(AppMode::Edit),
            other => Err(StudioError::Validation(format!(
                "unknown mode '{other}' (expected 'generate' or 'edit')"
            ))),
        }
    }
}

/// Session-scoped selection of presets and free-text render hints.
///
/// Free-text fields are stored as typed; the defaults for empty values are
/// applied only when a prompt is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub aspect_ratio: String,
    pub style_id: String,
    pub camera_type: String,
    pub lighting: String,
    pub mood: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: "1:1".to_string(),
            style_id: "cinematic".to_string(),
            camera_type: "50mm prime, f/1.8".to_string(),
            lighting: "soft studio lighting".to_string(),
            mood: "cinematic and dramatic".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    styles: Catalog<StylePreset>,
    ratios: Catalog<AspectRatioPreset>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(crate::catalog::style_catalog(), crate::catalog::ratio_catalog())
    }
}

impl PromptBuilder {
    pub fn new(styles: Catalog<StylePreset>, ratios: Catalog<AspectRatioPreset>) -> Self {
        Self { styles, ratios }
    }

    pub fn styles(&self) -> &Catalog<StylePreset> {
        &self.styles
    }

    pub fn ratios(&self) -> &Catalog<AspectRatioPreset> {
        &self.ratios
    }

    /// Templated instruction for generate mode. Pure and deterministic.
    pub fn build(&self, user_text: &str, config: &GenerationConfig) -> String {
        let style = self.styles.lookup(&config.style_id);
        let ratio = self.ratios.lookup(&config.aspect_ratio);
        let camera = or_default(&config.camera_type, DEFAULT_CAMERA);
        let lighting = or_default(&config.lighting, DEFAULT_LIGHTING);
        let mood = or_default(&config.mood, DEFAULT_MOOD);

        // Aspect ratio goes first; the image model follows it more reliably there.
        format!(
            "Create a {} image ({} aspect ratio). {user_text}. Render details: {}, Camera: {camera}, Lighting: {lighting}, Mood: {mood}. Output specs: {} resolution, PNG.",
            ratio.orientation,
            ratio.id,
            style.prompt_modifier,
            ratio.size(),
        )
    }

    /// Text sent to the gateway for `mode`. Edit instructions are forwarded raw.
    pub fn compose(&self, mode: AppMode, user_text: &str, config: &GenerationConfig) -> String {
        match mode {
            AppMode::Generate => self.build(user_text, config),
            AppMode::Edit => user_text.to_string(),
        }
    }
}

pub fn build_prompt(user_text: &str, config: &GenerationConfig) -> String {
    PromptBuilder::default().build(user_text, config)
}

pub fn compose_request(mode: AppMode, user_text: &str, config: &GenerationConfig) -> String {
    PromptBuilder::default().compose(mode, user_text, config)
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}
