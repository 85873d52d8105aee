use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};

use super::{GatewayError, GatewayImage, GenerationGateway, SourceImage};

const DRYRUN_SIDE: u32 = 256;

/// Offline gateway: a solid-colour PNG whose colour is derived from the input.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunGateway;

impl GenerationGateway for DryrunGateway {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, prompt: &str) -> Result<GatewayImage, GatewayError> {
        render_swatch(color_from_input(prompt.as_bytes(), &[]))
    }

    fn edit(&self, source: &SourceImage, instruction: &str) -> Result<GatewayImage, GatewayError> {
        render_swatch(color_from_input(instruction.as_bytes(), &source.bytes))
    }
}

fn color_from_input(text: &[u8], extra: &[u8]) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(text);
    hasher.update(extra);
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

fn render_swatch((r, g, b): (u8, u8, u8)) -> Result<GatewayImage, GatewayError> {
    let mut image = RgbImage::new(DRYRUN_SIDE, DRYRUN_SIDE);
    for pixel in image.pixels_mut() {
        *pixel = Rgb([r, g, b]);
    }
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|err| GatewayError::InvalidResponse(format!("dryrun PNG encode failed: {err}")))?;
    Ok(GatewayImage {
        bytes: out.into_inner(),
        mime_type: Some("image/png".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::DryrunGateway;
    use crate::gateway::{GenerationGateway, SourceImage};

    #[test]
    fn generate_is_deterministic_png() -> anyhow::Result<()> {
        let first = DryrunGateway.generate("boat")?;
        let second = DryrunGateway.generate("boat")?;
        assert_eq!(first, second);
        assert!(first.bytes.starts_with(b"\x89PNG"));
        assert_ne!(DryrunGateway.generate("car")?, first);
        Ok(())
    }

    #[test]
    fn edit_depends_on_source_bytes() -> anyhow::Result<()> {
        let a = SourceImage::new(b"one".to_vec(), "image/png", "a.png");
        let b = SourceImage::new(b"two".to_vec(), "image/png", "b.png");
        assert_ne!(
            DryrunGateway.edit(&a, "add a cat")?,
            DryrunGateway.edit(&b, "add a cat")?
        );
        Ok(())
    }
}
