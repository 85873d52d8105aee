use super::registry::{Catalog, Preset};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetSelection<'a, T> {
    pub preset: &'a T,
    pub requested: String,
    pub fallback_reason: Option<String>,
}

impl<T: Preset> Catalog<T> {
    /// Same as [`Catalog::lookup`], but explains when the fallback was taken.
    pub fn resolve(&self, requested: &str) -> PresetSelection<'_, T> {
        if let Some(preset) = self.get(requested) {
            return PresetSelection {
                preset,
                requested: requested.to_string(),
                fallback_reason: None,
            };
        }
        let preset = self.first();
        PresetSelection {
            preset,
            requested: requested.to_string(),
            fallback_reason: Some(format!(
                "Unknown preset '{requested}'; using '{}'.",
                preset.id()
            )),
        }
    }
}
