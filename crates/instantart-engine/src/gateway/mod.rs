use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use instantart_contracts::StudioError;
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::media::{mime_for_bytes, mime_for_path};

mod dryrun;
mod gemini;
mod relay;

pub use dryrun::DryrunGateway;
pub use gemini::GeminiGateway;
pub use relay::{handle_relay_request, RelayGateway, RelayResponse};

/// Image bytes returned by a gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayImage {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

impl GatewayImage {
    pub fn mime_type(&self) -> String {
        self.mime_type
            .clone()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| mime_for_bytes(&self.bytes).map(str::to_string))
            .unwrap_or_else(|| "image/png".to_string())
    }
}

/// Source image for edit mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub label: String,
}

impl SourceImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            label: label.into(),
        }
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        let mime_type = mime_for_bytes(&bytes)
            .or_else(|| mime_for_path(path))
            .unwrap_or("image/png");
        Ok(Self::new(
            bytes,
            mime_type,
            path.to_string_lossy().to_string(),
        ))
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("API key is missing")]
    MissingCredential,

    #[error("gateway misconfigured: {0}")]
    Misconfigured(String),

    #[error("{provider} request failed ({code}): {body}")]
    Status {
        provider: String,
        code: u16,
        body: String,
    },

    #[error("{0}")]
    NoImageData(String),

    #[error("{0}")]
    InvalidResponse(String),

    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },
}

impl GatewayError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GatewayError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<GatewayError> for StudioError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::MissingCredential | GatewayError::Misconfigured(_) => {
                StudioError::Configuration(err.to_string())
            }
            GatewayError::Status { code, .. } => StudioError::Generation {
                status: Some(code),
                message: err.to_string(),
            },
            other => StudioError::generation(other.to_string()),
        }
    }
}

/// The external image model. Each call is independent and carries its own
/// full input; there is no streaming and no partial result.
pub trait GenerationGateway: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, prompt: &str) -> Result<GatewayImage, GatewayError>;
    fn edit(&self, source: &SourceImage, instruction: &str) -> Result<GatewayImage, GatewayError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
    Gemini,
    Relay,
    Dryrun,
}

impl GatewayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayKind::Gemini => "gemini",
            GatewayKind::Relay => "relay",
            GatewayKind::Dryrun => "dryrun",
        }
    }
}

impl fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GatewayKind {
    type Err = GatewayError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(GatewayKind::Gemini),
            "relay" => Ok(GatewayKind::Relay),
            "dryrun" | "dry-run" => Ok(GatewayKind::Dryrun),
            other => Err(GatewayError::Misconfigured(format!(
                "unknown gateway '{other}' (expected gemini, relay or dryrun)"
            ))),
        }
    }
}

pub fn build_gateway(
    kind: GatewayKind,
    config: &GatewayConfig,
) -> Result<Box<dyn GenerationGateway>, GatewayError> {
    Ok(match kind {
        GatewayKind::Gemini => Box::new(GeminiGateway::new(config)?),
        GatewayKind::Relay => Box::new(RelayGateway::new(config)?),
        GatewayKind::Dryrun => Box::new(DryrunGateway),
    })
}
