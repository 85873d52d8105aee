use thiserror::Error;

/// Failures surfaced at the submission boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StudioError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    Generation {
        status: Option<u16>,
        message: String,
    },
}

impl StudioError {
    pub fn generation(message: impl Into<String>) -> Self {
        StudioError::Generation {
            status: None,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StudioError::Configuration(_) => "configuration",
            StudioError::Validation(_) => "validation",
            StudioError::Generation { .. } => "generation",
        }
    }
}

/// A recovered problem with the persisted gallery snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceWarning {
    pub message: String,
}

impl std::fmt::Display for PersistenceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;
