pub mod catalog;
pub mod chat;
pub mod error;
pub mod events;
pub mod gallery;
pub mod prompt;

pub use error::{PersistenceWarning, StudioError};
