mod history;
mod image;
mod repository;
mod store;

pub use history::History;
pub use image::{now_millis, GeneratedImage};
pub use repository::{FileHistoryRepository, HistoryRepository, MemoryHistoryRepository, SNAPSHOT_NAME};
pub use store::{GalleryStore, LoadedHistory};
