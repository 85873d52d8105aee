use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// File name of the gallery snapshot inside the gallery directory.
pub const SNAPSHOT_NAME: &str = "instantArt_history.json";

/// Storage medium for the single serialized gallery snapshot.
pub trait HistoryRepository: Send {
    fn location(&self) -> String;

    /// Raw snapshot text, or `None` when nothing has been persisted.
    fn load(&self) -> anyhow::Result<Option<String>>;

    /// Replaces the previous snapshot.
    fn persist(&self, snapshot: &str) -> anyhow::Result<()>;

    /// Removes the snapshot entirely.
    fn clear(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileHistoryRepository {
    path: PathBuf,
}

impl FileHistoryRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(SNAPSHOT_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryRepository for FileHistoryRepository {
    fn location(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    fn load(&self) -> anyhow::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn persist(&self, snapshot: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, snapshot)?;
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-process snapshot slot. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistoryRepository {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(snapshot.into()))),
        }
    }

    pub fn snapshot(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

impl HistoryRepository for MemoryHistoryRepository {
    fn location(&self) -> String {
        "memory".to_string()
    }

    fn load(&self) -> anyhow::Result<Option<String>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("history slot lock poisoned"))?;
        Ok(slot.clone())
    }

    fn persist(&self, snapshot: &str) -> anyhow::Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("history slot lock poisoned"))?;
        *slot = Some(snapshot.to_string());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("history slot lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{FileHistoryRepository, HistoryRepository, MemoryHistoryRepository};

    #[test]
    fn file_repository_missing_file_is_absent_snapshot() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let repo = FileHistoryRepository::in_dir(temp.path().join("nested"));
        assert_eq!(repo.load()?, None);
        repo.clear()?;
        Ok(())
    }

    #[test]
    fn file_repository_persist_creates_parents_and_clear_removes_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let repo = FileHistoryRepository::in_dir(temp.path().join("gallery"));
        repo.persist("[]")?;
        assert!(repo.path().exists());
        assert_eq!(repo.load()?.as_deref(), Some("[]"));

        repo.clear()?;
        assert!(!repo.path().exists());
        assert_eq!(repo.load()?, None);
        Ok(())
    }

    #[test]
    fn memory_repository_clones_share_state() -> anyhow::Result<()> {
        let repo = MemoryHistoryRepository::new();
        let other = repo.clone();
        repo.persist("[1]")?;
        assert_eq!(other.load()?.as_deref(), Some("[1]"));
        other.clear()?;
        assert_eq!(repo.snapshot(), None);
        Ok(())
    }
}
