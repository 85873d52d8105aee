use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One finished generation or edit. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub id: String,
    pub url: String,
    pub prompt: String,
    pub timestamp: i64,
    pub style: String,
    pub aspect_ratio: String,
    #[serde(default)]
    pub is_edited: bool,
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
