use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};

pub fn mime_for_bytes(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    let lowered = mime.to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    "png"
}

pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

/// Splits a `data:<mime>;base64,<payload>` URL into its mime type and bytes.
pub fn decode_data_url(url: &str) -> anyhow::Result<Option<(String, Vec<u8>)>> {
    let Some(rest) = url.strip_prefix("data:") else {
        return Ok(None);
    };
    let Some((header, payload)) = rest.split_once(',') else {
        anyhow::bail!("data URL has no payload");
    };
    let Some(mime) = header.strip_suffix(";base64") else {
        anyhow::bail!("data URL is not base64 encoded");
    };
    let bytes = BASE64.decode(payload.trim().as_bytes())?;
    Ok(Some((mime.to_string(), bytes)))
}

/// Raw base64 payload with any `data:image/...;base64,` prefix removed.
pub fn strip_data_url_prefix(raw: &str) -> &str {
    match raw.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(raw),
        None => raw,
    }
}

pub fn image_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{
        data_url, decode_data_url, extension_for_mime, image_digest, mime_for_bytes,
        mime_for_path, strip_data_url_prefix,
    };

    #[test]
    fn data_url_decodes_back_to_bytes() -> anyhow::Result<()> {
        let url = data_url("image/png", b"\x89PNG\r\n\x1a\nxyz");
        assert!(url.starts_with("data:image/png;base64,"));
        let decoded = decode_data_url(&url)?;
        assert_eq!(
            decoded,
            Some(("image/png".to_string(), b"\x89PNG\r\n\x1a\nxyz".to_vec()))
        );
        Ok(())
    }

    #[test]
    fn non_data_url_is_not_decoded() -> anyhow::Result<()> {
        assert_eq!(decode_data_url("/tmp/image.png")?, None);
        assert!(decode_data_url("data:image/png,plain").is_err());
        Ok(())
    }

    #[test]
    fn prefix_is_stripped_only_for_data_urls() {
        assert_eq!(strip_data_url_prefix("data:image/webp;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_url_prefix("QUJD"), "QUJD");
    }

    #[test]
    fn mime_helpers() {
        assert_eq!(mime_for_bytes(b"\x89PNG\r\n\x1a\n0000"), Some("image/png"));
        assert_eq!(mime_for_bytes(b"plain text"), None);
        assert_eq!(mime_for_path(Path::new("a/b.JPEG")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("a/b.txt")), None);
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("image/png"), "png");
    }

    #[test]
    fn digest_is_hex_sha256() {
        assert_eq!(
            image_digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
