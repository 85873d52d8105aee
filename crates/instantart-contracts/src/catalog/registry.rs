use indexmap::IndexMap;

use crate::error::StudioError;

/// Anything a catalog can hold: keyed by a unique id, shown with a label.
pub trait Preset {
    fn id(&self) -> &str;
    fn label(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylePreset {
    pub id: String,
    pub label: String,
    pub prompt_modifier: String,
    pub description: String,
}

impl Preset for StylePreset {
    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn label(&self) -> &str {
        self.label.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AspectRatioPreset {
    pub id: String,
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub orientation: String,
}

impl AspectRatioPreset {
    pub fn size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl Preset for AspectRatioPreset {
    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn label(&self) -> &str {
        self.label.as_str()
    }
}

/// Ordered, read-only collection of presets. Never empty; ids are unique.
#[derive(Debug, Clone)]
pub struct Catalog<T: Preset> {
    entries: IndexMap<String, T>,
}

impl<T: Preset> Catalog<T> {
    pub fn new(entries: Vec<T>) -> Result<Self, StudioError> {
        let mut map = IndexMap::new();
        for entry in entries {
            let id = entry.id().to_string();
            if map.contains_key(&id) {
                return Err(StudioError::Configuration(format!(
                    "duplicate catalog id '{id}'"
                )));
            }
            map.insert(id, entry);
        }
        if map.is_empty() {
            return Err(StudioError::Configuration(
                "catalog must contain at least one entry".to_string(),
            ));
        }
        Ok(Self { entries: map })
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.entries.get(id)
    }

    /// Entry for `id`, or the first entry when `id` is unknown.
    pub fn lookup(&self, id: &str) -> &T {
        self.get(id).unwrap_or_else(|| self.first())
    }

    pub fn first(&self) -> &T {
        // Construction guarantees at least one entry.
        &self.entries[0]
    }

    pub fn list(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn style_catalog() -> Catalog<StylePreset> {
    let mut styles = Vec::new();
    let mut insert = |id: &str, label: &str, description: &str, prompt_modifier: &str| {
        styles.push(StylePreset {
            id: id.to_string(),
            label: label.to_string(),
            prompt_modifier: prompt_modifier.to_string(),
            description: description.to_string(),
        });
    };

    insert(
        "cinematic",
        "Cinematic",
        "Movie-like visual quality with dramatic lighting",
        "cinematic photorealistic, 8k, highly detailed, dramatic lighting, movie still",
    );
    insert(
        "anime",
        "Anime",
        "High-quality Japanese animation style",
        "anime style, studio ghibli inspired, cel shaded, vibrant colors, detailed background",
    );
    insert(
        "photorealistic",
        "Photorealistic",
        "Indistinguishable from a real photograph",
        "photorealistic, raw photo, 8k uhd, dslr, soft lighting, high quality, film grain, Fujifilm XT3",
    );
    insert(
        "digital-art",
        "Digital Art",
        "Clean, modern digital illustration",
        "digital art, trending on artstation, concept art, smooth, sharp focus, illustration",
    );
    insert(
        "oil-painting",
        "Oil Painting",
        "Classic textured oil on canvas",
        "oil painting, impasto, textured canvas, classical art style, visible brushstrokes",
    );
    insert(
        "cyberpunk",
        "Cyberpunk",
        "Neon, futuristic, high-tech aesthetic",
        "cyberpunk, synthwave, neon lights, futuristic city, high tech, sci-fi, chromatic aberration",
    );

    Catalog {
        entries: styles
            .into_iter()
            .map(|style| (style.id.clone(), style))
            .collect(),
    }
}

pub fn ratio_catalog() -> Catalog<AspectRatioPreset> {
    let mut ratios = Vec::new();
    let mut insert = |id: &str, label: &str, width: u32, height: u32, orientation: &str| {
        ratios.push(AspectRatioPreset {
            id: id.to_string(),
            label: label.to_string(),
            width,
            height,
            orientation: orientation.to_string(),
        });
    };

    insert("1:1", "Square (1:1)", 1024, 1024, "square");
    insert("16:9", "Landscape (16:9)", 1920, 1080, "wide landscape");
    insert("9:16", "Portrait (9:16)", 1080, 1920, "tall portrait");
    insert("4:3", "Standard (4:3)", 1440, 1080, "standard landscape");

    Catalog {
        entries: ratios
            .into_iter()
            .map(|ratio| (ratio.id.clone(), ratio))
            .collect(),
    }
}
