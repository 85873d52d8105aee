use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};

use super::{GatewayError, GatewayImage, GenerationGateway, SourceImage};
use crate::config::{GatewayConfig, Secret};

pub struct GeminiGateway {
    api_base: String,
    model: String,
    api_key: Option<Secret>,
    http: HttpClient,
}

impl GeminiGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        // No client-side timeout: a call ends when the service answers or errors.
        let http = HttpClient::builder()
            .timeout(None)
            .build()
            .map_err(|source| GatewayError::Transport {
                context: "Gemini HTTP client setup failed".to_string(),
                source,
            })?;
        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            http,
        })
    }

    pub fn endpoint(&self) -> String {
        let trimmed = self.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn request(&self, parts: Vec<Value>, empty_message: &str) -> Result<GatewayImage, GatewayError> {
        let api_key = self.api_key.as_ref().ok_or(GatewayError::MissingCredential)?;
        let endpoint = self.endpoint();
        let payload = request_payload(parts);
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key.expose())])
            .json(&payload)
            .send()
            .map_err(|source| GatewayError::Transport {
                context: format!("Gemini request failed ({endpoint})"),
                // The query string carries the key.
                source: source.without_url(),
            })?;
        let response_payload = response_json_or_error("Gemini", response)?;
        extract_first_image(&response_payload)?
            .ok_or_else(|| GatewayError::NoImageData(empty_message.to_string()))
    }
}

impl GenerationGateway for GeminiGateway {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, prompt: &str) -> Result<GatewayImage, GatewayError> {
        self.request(
            vec![json!({ "text": prompt })],
            "No image data returned from Gemini.",
        )
    }

    fn edit(&self, source: &SourceImage, instruction: &str) -> Result<GatewayImage, GatewayError> {
        self.request(
            vec![
                json!({
                    "inlineData": {
                        "mimeType": source.mime_type,
                        "data": BASE64.encode(&source.bytes),
                    }
                }),
                json!({ "text": instruction }),
            ],
            "No edited image data returned from Gemini.",
        )
    }
}

fn request_payload(parts: Vec<Value>) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": parts,
        }],
        "generationConfig": {
            "responseModalities": ["IMAGE"],
        },
    })
}

pub(crate) fn response_json_or_error(
    provider: &str,
    response: HttpResponse,
) -> Result<Value, GatewayError> {
    let status = response.status();
    let code = status.as_u16();
    let body = response.text().map_err(|source| GatewayError::Transport {
        context: format!("{provider} response body read failed"),
        source,
    })?;
    if !status.is_success() {
        return Err(GatewayError::Status {
            provider: provider.to_string(),
            code,
            body: truncate_text(&body, 512),
        });
    }
    serde_json::from_str(&body).map_err(|err| {
        GatewayError::InvalidResponse(format!("{provider} returned invalid JSON payload: {err}"))
    })
}

/// First inline image across the parts of the first candidate.
fn extract_first_image(response_payload: &Value) -> Result<Option<GatewayImage>, GatewayError> {
    let parts = response_payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for part in parts {
        let Some(inline) = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object)
        else {
            continue;
        };
        let data = inline
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let bytes = BASE64.decode(data.as_bytes()).map_err(|err| {
            GatewayError::InvalidResponse(format!("Gemini image base64 decode failed: {err}"))
        })?;
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .map(str::to_string);
        return Ok(Some(GatewayImage { bytes, mime_type }));
    }
    Ok(None)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use base64::Engine as _;
    use serde_json::json;

    use super::{extract_first_image, request_payload, truncate_text, GeminiGateway, BASE64};
    use crate::config::GatewayConfig;
    use crate::gateway::{GatewayError, GenerationGateway};

    #[test]
    fn endpoint_uses_model_path() -> anyhow::Result<()> {
        let config = GatewayConfig {
            api_base: "https://example.test/v1beta/".to_string(),
            model: "gemini-2.5-flash-image".to_string(),
            ..GatewayConfig::default()
        };
        let gateway = GeminiGateway::new(&config)?;
        assert_eq!(
            gateway.endpoint(),
            "https://example.test/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
        Ok(())
    }

    #[test]
    fn missing_credential_fails_before_any_request() -> anyhow::Result<()> {
        let config = GatewayConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            ..GatewayConfig::default()
        };
        let gateway = GeminiGateway::new(&config)?;
        assert!(matches!(
            gateway.generate("a prompt"),
            Err(GatewayError::MissingCredential)
        ));
        Ok(())
    }

    #[test]
    fn payload_requests_image_modality() {
        let payload = request_payload(vec![json!({"text": "hi"})]);
        assert_eq!(payload["generationConfig"]["responseModalities"], json!(["IMAGE"]));
        assert_eq!(payload["contents"][0]["parts"][0]["text"], json!("hi"));
    }

    #[test]
    fn extracts_first_inline_image_after_text_parts() -> anyhow::Result<()> {
        let encoded = BASE64.encode(b"png-bytes");
        let response = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "here you go"},
                        {"inlineData": {"mimeType": "image/png", "data": encoded}},
                    ]
                }
            }]
        });
        let image = extract_first_image(&response)?.expect("image part");
        assert_eq!(image.bytes, b"png-bytes".to_vec());
        assert_eq!(image.mime_type.as_deref(), Some("image/png"));
        Ok(())
    }

    #[test]
    fn response_without_image_yields_none() -> anyhow::Result<()> {
        let response = json!({"candidates": [{"content": {"parts": [{"text": "refused"}]}}]});
        assert!(extract_first_image(&response)?.is_none());
        assert!(extract_first_image(&json!({}))?.is_none());
        Ok(())
    }

    #[test]
    fn truncate_adds_ellipsis() {
        assert_eq!(truncate_text("abcdef", 3), "abc…");
        assert_eq!(truncate_text("abc", 3), "abc");
    }
}
