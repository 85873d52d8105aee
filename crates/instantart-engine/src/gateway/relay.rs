use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};

use super::gemini::truncate_text;
use super::{GatewayError, GatewayImage, GenerationGateway, SourceImage};
use crate::config::GatewayConfig;
use crate::media::strip_data_url_prefix;

/// Client for a hosted relay that holds the credential server-side.
///
/// Request: `{ prompt, image?, mimeType? }`. Response: an `image/*` body, or
/// JSON `{ image, mimeType? }`, or JSON `{ error, details? }`.
pub struct RelayGateway {
    url: String,
    http: HttpClient,
}

impl RelayGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let url = config
            .relay_url
            .clone()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| GatewayError::Misconfigured("relay URL is not set".to_string()))?;
        let http = HttpClient::builder()
            .timeout(None)
            .build()
            .map_err(|source| GatewayError::Transport {
                context: "relay HTTP client setup failed".to_string(),
                source,
            })?;
        Ok(Self { url, http })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn call(&self, payload: Value) -> Result<GatewayImage, GatewayError> {
        let response = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .map_err(|source| GatewayError::Transport {
                context: format!("relay request failed ({})", self.url),
                source,
            })?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_ascii_lowercase());
        let body = response.bytes().map_err(|source| GatewayError::Transport {
            context: "relay response body read failed".to_string(),
            source,
        })?;

        if !status.is_success() {
            return Err(GatewayError::Status {
                provider: "relay".to_string(),
                code: status.as_u16(),
                body: relay_error_text(&body),
            });
        }

        if let Some(mime) = content_type.filter(|value| value.starts_with("image/")) {
            let mime = mime.split(';').next().unwrap_or("image/png").trim().to_string();
            return Ok(GatewayImage {
                bytes: body.to_vec(),
                mime_type: Some(mime),
            });
        }

        let parsed: Value = serde_json::from_slice(&body).map_err(|err| {
            GatewayError::InvalidResponse(format!("relay returned invalid JSON payload: {err}"))
        })?;
        image_from_relay_json(&parsed)
    }
}

impl GenerationGateway for RelayGateway {
    fn name(&self) -> &str {
        "relay"
    }

    fn generate(&self, prompt: &str) -> Result<GatewayImage, GatewayError> {
        self.call(json!({ "prompt": prompt }))
    }

    fn edit(&self, source: &SourceImage, instruction: &str) -> Result<GatewayImage, GatewayError> {
        self.call(json!({
            "prompt": instruction,
            "image": BASE64.encode(&source.bytes),
            "mimeType": source.mime_type,
        }))
    }
}

fn relay_error_text(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body).to_string();
    let Ok(parsed) = serde_json::from_str::<Value>(&text) else {
        return truncate_text(&text, 512);
    };
    let error = parsed.get("error").and_then(Value::as_str);
    let details = parsed.get("details").and_then(Value::as_str);
    match (error, details) {
        (Some(error), Some(details)) => format!("{error}: {details}"),
        (Some(error), None) => error.to_string(),
        _ => truncate_text(&text, 512),
    }
}

fn image_from_relay_json(parsed: &Value) -> Result<GatewayImage, GatewayError> {
    if let Some(error) = parsed.get("error").and_then(Value::as_str) {
        let details = parsed
            .get("details")
            .and_then(Value::as_str)
            .map(|details| format!(": {details}"))
            .unwrap_or_default();
        return Err(GatewayError::InvalidResponse(format!(
            "relay error: {error}{details}"
        )));
    }
    let data = parsed
        .get("image")
        .and_then(Value::as_str)
        .map(strip_data_url_prefix)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| GatewayError::NoImageData("No image data returned from relay.".to_string()))?;
    let bytes = BASE64.decode(data.as_bytes()).map_err(|err| {
        GatewayError::InvalidResponse(format!("relay image base64 decode failed: {err}"))
    })?;
    Ok(GatewayImage {
        bytes,
        mime_type: parsed
            .get("mimeType")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Status code and JSON body produced by the relay endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayResponse {
    pub status: u16,
    pub body: Value,
}

impl RelayResponse {
    fn error(status: u16, error: &str, details: Option<String>) -> Self {
        let mut body = json!({ "error": error });
        if let Some(details) = details {
            body["details"] = Value::String(details);
        }
        Self { status, body }
    }
}

/// Server side of the relay: validates the request and forwards it to
/// `gateway`, which holds the credential.
pub fn handle_relay_request(
    method: &str,
    body: &str,
    gateway: &dyn GenerationGateway,
) -> RelayResponse {
    if !method.eq_ignore_ascii_case("POST") {
        return RelayResponse::error(405, "Only POST method allowed", None);
    }

    let request: Value = if body.trim().is_empty() {
        json!({})
    } else {
        match serde_json::from_str(body) {
            Ok(value) => value,
            Err(err) => {
                return RelayResponse::error(400, "Invalid JSON body", Some(err.to_string()))
            }
        }
    };
    // Blank prompts are rejected; others are forwarded exactly as sent.
    let prompt = request
        .get("prompt")
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty());
    let Some(prompt) = prompt else {
        return RelayResponse::error(400, "Prompt missing", None);
    };

    let result = match request.get("image").and_then(Value::as_str) {
        Some(image) => {
            let bytes = match BASE64.decode(strip_data_url_prefix(image).as_bytes()) {
                Ok(bytes) => bytes,
                Err(err) => {
                    return RelayResponse::error(400, "Invalid image data", Some(err.to_string()))
                }
            };
            let mime_type = request
                .get("mimeType")
                .and_then(Value::as_str)
                .unwrap_or("image/png");
            gateway.edit(&SourceImage::new(bytes, mime_type, "relay"), prompt)
        }
        None => gateway.generate(prompt),
    };

    match result {
        Ok(image) => RelayResponse {
            status: 200,
            body: json!({
                "image": BASE64.encode(&image.bytes),
                "mimeType": image.mime_type(),
            }),
        },
        Err(GatewayError::MissingCredential) => {
            RelayResponse::error(500, "API key missing on server", None)
        }
        Err(GatewayError::Status { code, body, .. }) => {
            match serde_json::from_str::<Value>(&body) {
                Ok(upstream) => RelayResponse {
                    status: code,
                    body: upstream,
                },
                Err(_) => RelayResponse::error(code, "Upstream request failed", Some(body)),
            }
        }
        Err(err) => RelayResponse::error(500, "Server error", Some(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use base64::Engine as _;
    use serde_json::json;

    use super::{handle_relay_request, image_from_relay_json, relay_error_text, BASE64};
    use crate::gateway::{GatewayError, GatewayImage, GenerationGateway, SourceImage};

    #[derive(Default)]
    struct RecordingGateway {
        calls: Mutex<Vec<String>>,
        fail_with: Option<(u16, &'static str)>,
        no_key: bool,
    }

    impl GenerationGateway for RecordingGateway {
        fn name(&self) -> &str {
            "recording"
        }

        fn generate(&self, prompt: &str) -> Result<GatewayImage, GatewayError> {
            self.respond(format!("generate:{prompt}"))
        }

        fn edit(&self, source: &SourceImage, instruction: &str) -> Result<GatewayImage, GatewayError> {
            self.respond(format!(
                "edit:{}:{}:{instruction}",
                source.mime_type,
                source.bytes.len()
            ))
        }
    }

    impl RecordingGateway {
        fn respond(&self, call: String) -> Result<GatewayImage, GatewayError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call);
            }
            if self.no_key {
                return Err(GatewayError::MissingCredential);
            }
            if let Some((code, body)) = self.fail_with {
                return Err(GatewayError::Status {
                    provider: "Gemini".to_string(),
                    code,
                    body: body.to_string(),
                });
            }
            Ok(GatewayImage {
                bytes: b"img".to_vec(),
                mime_type: Some("image/png".to_string()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }
    }

    #[test]
    fn rejects_non_post() {
        let gateway = RecordingGateway::default();
        let response = handle_relay_request("GET", "", &gateway);
        assert_eq!(response.status, 405);
        assert!(gateway.calls().is_empty());
    }

    #[test]
    fn missing_prompt_is_bad_request() {
        let gateway = RecordingGateway::default();
        let response = handle_relay_request("POST", r#"{"prompt": "  "}"#, &gateway);
        assert_eq!(response.status, 400);
        assert_eq!(response.body, json!({"error": "Prompt missing"}));
        assert_eq!(handle_relay_request("POST", "", &gateway).status, 400);
        assert!(gateway.calls().is_empty());
    }

    #[test]
    fn generate_request_returns_base64_image() {
        let gateway = RecordingGateway::default();
        let response = handle_relay_request("post", r#"{"prompt": "a fox"}"#, &gateway);
        assert_eq!(response.status, 200);
        assert_eq!(response.body["image"], json!(BASE64.encode(b"img")));
        assert_eq!(response.body["mimeType"], json!("image/png"));
        assert_eq!(gateway.calls(), vec!["generate:a fox"]);
    }

    #[test]
    fn image_field_switches_to_edit() {
        let gateway = RecordingGateway::default();
        let body = json!({
            "prompt": "add a cat",
            "image": format!("data:image/jpeg;base64,{}", BASE64.encode(b"jpeg!")),
            "mimeType": "image/jpeg",
        })
        .to_string();
        let response = handle_relay_request("POST", &body, &gateway);
        assert_eq!(response.status, 200);
        assert_eq!(gateway.calls(), vec!["edit:image/jpeg:5:add a cat"]);
    }

    #[test]
    fn upstream_status_propagates_unchanged() {
        let gateway = RecordingGateway {
            fail_with: Some((429, "quota exceeded")),
            ..RecordingGateway::default()
        };
        let response = handle_relay_request("POST", r#"{"prompt": "x"}"#, &gateway);
        assert_eq!(response.status, 429);
        assert_eq!(response.body["details"], json!("quota exceeded"));
    }

    #[test]
    fn upstream_json_error_body_passes_through() {
        let gateway = RecordingGateway {
            fail_with: Some((
                400,
                r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#,
            )),
            ..RecordingGateway::default()
        };
        let response = handle_relay_request("POST", r#"{"prompt": "x"}"#, &gateway);
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"]["message"], json!("API key not valid"));
        assert!(response.body.get("details").is_none());
    }

    #[test]
    fn prompt_is_forwarded_untrimmed() {
        let gateway = RecordingGateway::default();
        let body = json!({
            "prompt": "  add a cat\n",
            "image": BASE64.encode(b"png"),
            "mimeType": "image/png",
        })
        .to_string();
        let response = handle_relay_request("POST", &body, &gateway);
        assert_eq!(response.status, 200);
        assert_eq!(gateway.calls(), vec!["edit:image/png:3:  add a cat\n"]);

        handle_relay_request("POST", r#"{"prompt": " a fox "}"#, &gateway);
        assert_eq!(gateway.calls()[1], "generate: a fox ");
    }

    #[test]
    fn missing_server_key_is_500() {
        let gateway = RecordingGateway {
            no_key: true,
            ..RecordingGateway::default()
        };
        let response = handle_relay_request("POST", r#"{"prompt": "x"}"#, &gateway);
        assert_eq!(response.status, 500);
        assert_eq!(response.body, json!({"error": "API key missing on server"}));
    }

    #[test]
    fn relay_json_parsing() -> anyhow::Result<()> {
        let image = image_from_relay_json(&json!({
            "image": BASE64.encode(b"abc"),
            "mimeType": "image/webp",
        }))?;
        assert_eq!(image.bytes, b"abc".to_vec());
        assert_eq!(image.mime_type.as_deref(), Some("image/webp"));

        assert!(matches!(
            image_from_relay_json(&json!({})),
            Err(GatewayError::NoImageData(_))
        ));
        assert!(matches!(
            image_from_relay_json(&json!({"error": "Server error", "details": "boom"})),
            Err(GatewayError::InvalidResponse(_))
        ));
        Ok(())
    }

    #[test]
    fn error_text_prefers_error_and_details() {
        assert_eq!(
            relay_error_text(br#"{"error": "Prompt missing"}"#),
            "Prompt missing"
        );
        assert_eq!(
            relay_error_text(br#"{"error": "Server error", "details": "boom"}"#),
            "Server error: boom"
        );
        assert_eq!(relay_error_text(b"plain failure"), "plain failure");
    }
}
