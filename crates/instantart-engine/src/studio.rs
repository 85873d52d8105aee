use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use instantart_contracts::events::{EventPayload, EventWriter};
use instantart_contracts::gallery::{now_millis, GalleryStore, GeneratedImage, History};
use instantart_contracts::prompt::{AppMode, GenerationConfig, PromptBuilder};
use instantart_contracts::{PersistenceWarning, StudioError};
use serde_json::{json, Value};

use crate::gateway::{GenerationGateway, SourceImage};
use crate::media::{data_url, decode_data_url, extension_for_mime, image_digest, mime_for_bytes};

/// One user session: configuration, selection and gallery in front of a
/// gateway.
///
/// All mutation goes through `&mut self`, and history changes are
/// read-modify-persist in one step.
pub struct Studio {
    builder: PromptBuilder,
    store: GalleryStore,
    gateway: Box<dyn GenerationGateway>,
    events: EventWriter,
    mode: AppMode,
    config: GenerationConfig,
    history: History,
    current_id: Option<String>,
    source_image: Option<SourceImage>,
    busy: bool,
    last_error: Option<String>,
    warnings: Vec<PersistenceWarning>,
    event_log_failed: bool,
}

impl Studio {
    /// Loads the gallery and selects its newest entry. Snapshot and event log
    /// problems are recorded as warnings; opening never fails.
    pub fn open(
        store: GalleryStore,
        gateway: Box<dyn GenerationGateway>,
        events: EventWriter,
    ) -> Self {
        let loaded = store.load();
        let current_id = loaded.history.first().map(|item| item.id.clone());
        let mut studio = Self {
            builder: PromptBuilder::default(),
            store,
            gateway,
            events,
            mode: AppMode::default(),
            config: GenerationConfig::default(),
            history: loaded.history,
            current_id,
            source_image: None,
            busy: false,
            last_error: None,
            warnings: Vec::new(),
            event_log_failed: false,
        };

        let started = json!({
            "gateway": studio.gateway.name(),
            "gallery": studio.store.location(),
        });
        studio.log_or_warn("session_started", started);
        if let Some(warning) = loaded.warning {
            studio.log_or_warn("history_warning", json!({ "message": warning.message }));
            studio.warnings.push(warning);
        }
        let count = studio.history.len();
        studio.log_or_warn("history_loaded", json!({ "count": count }));
        studio
    }

    pub fn builder(&self) -> &PromptBuilder {
        &self.builder
    }

    pub fn gateway_name(&self) -> &str {
        self.gateway.name()
    }

    pub fn mode(&self) -> AppMode {
        self.mode
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn current(&self) -> Option<&GeneratedImage> {
        let id = self.current_id.as_deref()?;
        GalleryStore::select_current(&self.history, id)
    }

    pub fn source_image(&self) -> Option<&SourceImage> {
        self.source_image.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Persistence problems recovered from so far, oldest first.
    pub fn warnings(&self) -> &[PersistenceWarning] {
        &self.warnings
    }

    pub fn set_mode(&mut self, mode: AppMode) {
        self.mode = mode;
        self.log("config_updated", json!({ "mode": mode.as_str() }));
    }

    /// Stores `style_id` as given; returns the fallback notice when the id is
    /// not in the catalog.
    pub fn set_style(&mut self, style_id: &str) -> Option<String> {
        self.config.style_id = style_id.to_string();
        let reason = self.builder.styles().resolve(style_id).fallback_reason;
        self.log_config_change("style_id", style_id, reason.as_deref());
        reason
    }

    pub fn set_aspect_ratio(&mut self, ratio_id: &str) -> Option<String> {
        self.config.aspect_ratio = ratio_id.to_string();
        let reason = self.builder.ratios().resolve(ratio_id).fallback_reason;
        self.log_config_change("aspect_ratio", ratio_id, reason.as_deref());
        reason
    }

    pub fn set_camera(&mut self, camera: &str) {
        self.config.camera_type = camera.to_string();
        self.log_config_change("camera_type", camera, None);
    }

    pub fn set_lighting(&mut self, lighting: &str) {
        self.config.lighting = lighting.to_string();
        self.log_config_change("lighting", lighting, None);
    }

    pub fn set_mood(&mut self, mood: &str) {
        self.config.mood = mood.to_string();
        self.log_config_change("mood", mood, None);
    }

    /// Attaching a source image switches the session to edit mode.
    pub fn set_source_image(&mut self, source: SourceImage) {
        self.log(
            "config_updated",
            json!({
                "source_image": source.label,
                "mime_type": source.mime_type,
                "mode": AppMode::Edit.as_str(),
            }),
        );
        self.source_image = Some(source);
        self.mode = AppMode::Edit;
    }

    pub fn clear_source_image(&mut self) {
        self.source_image = None;
        self.log("config_updated", json!({ "source_image": Value::Null }));
    }

    /// Text that `submit` would send for `user_text` in the current mode.
    pub fn preview(&self, user_text: &str) -> String {
        self.builder.compose(self.mode, user_text, &self.config)
    }

    /// Runs one generation or edit.
    ///
    /// `&mut self` admits one submission at a time; `busy` is set only for
    /// the duration of the gateway call. On failure the gallery is untouched, the error message is recorded and
    /// the busy flag is cleared. A new entry exists only after a successful
    /// gateway response.
    pub fn submit(&mut self, user_text: &str) -> Result<GeneratedImage, StudioError> {
        if let Err(err) = self.validate(user_text) {
            self.last_error = Some(err.to_string());
            return Err(err);
        }

        self.busy = true;
        self.last_error = None;
        let result = self.run_gateway(user_text);
        self.busy = false;

        match result {
            Ok(item) => Ok(item),
            Err(err) => {
                let status = match &err {
                    StudioError::Generation { status, .. } => *status,
                    _ => None,
                };
                self.log(
                    "generation_failed",
                    json!({
                        "mode": self.mode.as_str(),
                        "kind": err.kind(),
                        "status": status,
                        "error": err.to_string(),
                    }),
                );
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn validate(&self, user_text: &str) -> Result<(), StudioError> {
        if user_text.trim().is_empty() {
            return Err(StudioError::Validation("Please enter a prompt.".to_string()));
        }
        if self.mode == AppMode::Edit && self.source_image.is_none() {
            return Err(StudioError::Validation(
                "Please upload an image to edit.".to_string(),
            ));
        }
        Ok(())
    }

    fn run_gateway(&mut self, user_text: &str) -> Result<GeneratedImage, StudioError> {
        let final_prompt = self.preview(user_text);
        self.log(
            "generation_started",
            json!({
                "mode": self.mode.as_str(),
                "gateway": self.gateway.name(),
                "prompt": final_prompt,
                "config": self.config,
            }),
        );

        let image = match (self.mode, self.source_image.as_ref()) {
            (AppMode::Edit, Some(source)) => self.gateway.edit(source, &final_prompt)?,
            (AppMode::Edit, None) => {
                return Err(StudioError::Validation(
                    "Please upload an image to edit.".to_string(),
                ))
            }
            (AppMode::Generate, _) => self.gateway.generate(&final_prompt)?,
        };
        if image.bytes.is_empty() {
            return Err(StudioError::generation("Gateway returned an empty image."));
        }

        let now = now_millis();
        let mime = image.mime_type();
        // Edited entries record the session's current style and ratio as well.
        let item = GeneratedImage {
            id: self.history.next_id(now),
            url: data_url(&mime, &image.bytes),
            prompt: final_prompt,
            timestamp: now,
            style: self.config.style_id.clone(),
            aspect_ratio: self.config.aspect_ratio.clone(),
            is_edited: self.mode == AppMode::Edit,
        };

        self.history = self.store.prepend(&self.history, item.clone());
        self.current_id = Some(item.id.clone());
        if let Err(err) = self.store.persist(&self.history) {
            let warning = PersistenceWarning {
                message: format!("{err:#}"),
            };
            self.log(
                "history_persist_failed",
                json!({ "id": item.id, "message": warning.message }),
            );
            self.warnings.push(warning);
        }
        self.log(
            "image_created",
            json!({
                "id": item.id,
                "mime_type": mime,
                "bytes": image.bytes.len(),
                "sha256": image_digest(&image.bytes),
                "is_edited": item.is_edited,
                "history_len": self.history.len(),
            }),
        );
        Ok(item)
    }

    /// Makes `id` the current image. Unknown ids leave no current image.
    pub fn select(&mut self, id: &str) -> Option<&GeneratedImage> {
        self.current_id = self.history.contains(id).then(|| id.to_string());
        self.current()
    }

    pub fn clear_history(&mut self) -> anyhow::Result<()> {
        let removed = self.history.len();
        self.history = self.store.clear()?;
        self.current_id = None;
        self.log("history_cleared", json!({ "removed": removed }));
        Ok(())
    }

    /// Writes an entry's image bytes to disk and returns the written path.
    ///
    /// `id` defaults to the current image. `out` may be a file or an existing
    /// directory; it defaults to `instantArt-{id}.{ext}` in the working
    /// directory.
    pub fn export(&self, id: Option<&str>, out: Option<&Path>) -> anyhow::Result<PathBuf> {
        let item = match id {
            Some(id) => self
                .history
                .get(id)
                .with_context(|| format!("no gallery entry with id '{id}'"))?,
            None => match self.current() {
                Some(item) => item,
                None => bail!("no image selected"),
            },
        };
        let (mime, bytes) = image_bytes(item)?;
        let file_name = format!("instantArt-{}.{}", item.id, extension_for_mime(&mime));
        let path = match out {
            Some(path) if path.is_dir() => path.join(file_name),
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(file_name),
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.log(
            "image_exported",
            json!({ "id": item.id, "path": path.to_string_lossy() }),
        );
        Ok(path)
    }

    fn log_config_change(&self, field: &str, value: &str, fallback_reason: Option<&str>) {
        self.log("config_updated", json!({ (field): value }));
        if let Some(reason) = fallback_reason {
            self.log(
                "prompt_fallback",
                json!({ "field": field, "requested": value, "reason": reason }),
            );
        }
    }

    // Event logging is diagnostics only; a failed write never changes session state.
    fn log(&self, event_type: &str, payload: Value) {
        let _ = self.events.emit(event_type, map_object(payload));
    }

    /// Like `log`, but the first failed write is kept as a warning.
    fn log_or_warn(&mut self, event_type: &str, payload: Value) {
        let Err(err) = self.events.emit(event_type, map_object(payload)) else {
            return;
        };
        if !self.event_log_failed {
            self.event_log_failed = true;
            let location = self
                .events
                .path()
                .map(|path| path.display().to_string())
                .unwrap_or_default();
            self.warnings.push(PersistenceWarning {
                message: format!("event log {location} is not writable: {err:#}"),
            });
        }
    }
}

/// Bytes behind an entry's `url`: a data URL or a readable file path.
pub fn image_bytes(item: &GeneratedImage) -> anyhow::Result<(String, Vec<u8>)> {
    if let Some(decoded) = decode_data_url(&item.url)
        .with_context(|| format!("gallery entry '{}' has a malformed data URL", item.id))?
    {
        return Ok(decoded);
    }
    let bytes = std::fs::read(&item.url)
        .with_context(|| format!("failed reading image for '{}' from {}", item.id, item.url))?;
    let mime = mime_for_bytes(&bytes).unwrap_or("image/png").to_string();
    Ok((mime, bytes))
}

fn map_object(value: Value) -> EventPayload {
    value.as_object().cloned().unwrap_or_default()
}
