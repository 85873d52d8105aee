use serde::{Deserialize, Serialize};

use super::image::GeneratedImage;

/// Gallery entries, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    items: Vec<GeneratedImage>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a history from entries already in newest-first order.
    /// Later duplicates of an id are dropped; the count of dropped rows is returned.
    pub fn from_entries(entries: Vec<GeneratedImage>) -> (Self, usize) {
        let mut items: Vec<GeneratedImage> = Vec::with_capacity(entries.len());
        let mut dropped = 0;
        for entry in entries {
            if items.iter().any(|existing| existing.id == entry.id) {
                dropped += 1;
                continue;
            }
            items.push(entry);
        }
        (Self { items }, dropped)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneratedImage> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[GeneratedImage] {
        self.items.as_slice()
    }

    pub fn first(&self) -> Option<&GeneratedImage> {
        self.items.first()
    }

    pub fn get(&self, id: &str) -> Option<&GeneratedImage> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// New history with `item` ahead of every existing entry.
    pub fn prepended(&self, item: GeneratedImage) -> Self {
        let mut items = Vec::with_capacity(self.items.len() + 1);
        items.push(item);
        items.extend(self.items.iter().cloned());
        Self { items }
    }

    /// Time-based id for a new entry, bumped forward until it is unused here.
    pub fn next_id(&self, now_millis: i64) -> String {
        let mut candidate = now_millis;
        while self.contains(&candidate.to_string()) {
            candidate += 1;
        }
        candidate.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::History;
    use crate::gallery::GeneratedImage;

    fn image(id: &str) -> GeneratedImage {
        GeneratedImage {
            id: id.to_string(),
            url: format!("data:image/png;base64,{id}"),
            prompt: format!("prompt {id}"),
            timestamp: 1_700_000_000_000,
            style: "cinematic".to_string(),
            aspect_ratio: "1:1".to_string(),
            is_edited: false,
        }
    }

    #[test]
    fn prepend_puts_item_first_and_keeps_relative_order() {
        let history = History::new()
            .prepended(image("a"))
            .prepended(image("b"))
            .prepended(image("c"));
        let next = history.prepended(image("d"));

        assert_eq!(next.len(), history.len() + 1);
        assert_eq!(next.first(), Some(&image("d")));
        let ids: Vec<&str> = next.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "c", "b", "a"]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn next_id_skips_ids_already_taken() {
        let history = History::new()
            .prepended(image("1000"))
            .prepended(image("1001"));
        assert_eq!(history.next_id(1000), "1002");
        assert_eq!(history.next_id(5000), "5000");
    }

    #[test]
    fn from_entries_drops_repeated_ids() {
        let (history, dropped) =
            History::from_entries(vec![image("x"), image("y"), image("x")]);
        assert_eq!(dropped, 1);
        assert_eq!(history.len(), 2);
        assert_eq!(history.get("x"), Some(&image("x")));
    }

    #[test]
    fn serializes_as_plain_array_with_camel_case_keys() -> anyhow::Result<()> {
        let mut edited = image("9");
        edited.is_edited = true;
        let history = History::new().prepended(edited);
        let value = serde_json::to_value(&history)?;
        assert_eq!(value[0]["aspectRatio"], serde_json::json!("1:1"));
        assert_eq!(value[0]["isEdited"], serde_json::json!(true));
        Ok(())
    }
}
