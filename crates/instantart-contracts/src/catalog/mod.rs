mod registry;
mod selectors;

pub use registry::{ratio_catalog, style_catalog, AspectRatioPreset, Catalog, Preset, StylePreset};
pub use selectors::PresetSelection;
