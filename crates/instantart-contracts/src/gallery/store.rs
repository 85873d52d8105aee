use anyhow::Context;

use super::history::History;
use super::image::GeneratedImage;
use super::repository::HistoryRepository;
use crate::error::PersistenceWarning;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedHistory {
    pub history: History,
    pub warning: Option<PersistenceWarning>,
}

/// Gallery persistence over an injected repository.
///
/// The snapshot is only read by [`GalleryStore::load`] and only written by
/// [`GalleryStore::persist`] and [`GalleryStore::clear`]; it is always the
/// whole collection.
pub struct GalleryStore {
    repository: Box<dyn HistoryRepository>,
}

impl GalleryStore {
    pub fn new<R: HistoryRepository + 'static>(repository: R) -> Self {
        Self {
            repository: Box::new(repository),
        }
    }

    pub fn location(&self) -> String {
        self.repository.location()
    }

    /// Never fails: unreadable or malformed snapshots yield an empty history
    /// and a warning for the caller to log.
    pub fn load(&self) -> LoadedHistory {
        let raw = match self.repository.load() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                return LoadedHistory {
                    history: History::new(),
                    warning: None,
                }
            }
            Err(err) => {
                return LoadedHistory {
                    history: History::new(),
                    warning: Some(PersistenceWarning {
                        message: format!(
                            "failed to read gallery snapshot {}: {err:#}",
                            self.location()
                        ),
                    }),
                }
            }
        };

        match serde_json::from_str::<Vec<GeneratedImage>>(&raw) {
            Ok(entries) => {
                let (history, dropped) = History::from_entries(entries);
                let warning = (dropped > 0).then(|| PersistenceWarning {
                    message: format!(
                        "gallery snapshot {} contained {dropped} duplicate id(s); kept the newest",
                        self.location()
                    ),
                });
                LoadedHistory { history, warning }
            }
            Err(err) => LoadedHistory {
                history: History::new(),
                warning: Some(PersistenceWarning {
                    message: format!(
                        "discarded malformed gallery snapshot {}: {err}",
                        self.location()
                    ),
                }),
            },
        }
    }

    pub fn prepend(&self, history: &History, item: GeneratedImage) -> History {
        history.prepended(item)
    }

    pub fn persist(&self, history: &History) -> anyhow::Result<()> {
        let snapshot =
            serde_json::to_string(history).context("gallery snapshot serialization failed")?;
        self.repository
            .persist(&snapshot)
            .with_context(|| format!("failed to write gallery snapshot {}", self.location()))
    }

    pub fn clear(&self) -> anyhow::Result<History> {
        self.repository
            .clear()
            .with_context(|| format!("failed to remove gallery snapshot {}", self.location()))?;
        Ok(History::new())
    }

    pub fn select_current<'a>(history: &'a History, id: &str) -> Option<&'a GeneratedImage> {
        history.get(id)
    }
}
