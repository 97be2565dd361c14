use std::io::Cursor;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbaImage};
use tracing::{info, warn};

use crate::config::CONFIG;
use crate::utils::http::get_http_client;

const MATTING_TIMEOUT_SECONDS: u64 = 60;

/// External segmentation capability. Implementations take encoded PNG bytes
/// and return encoded PNG bytes whose alpha channel masks out the background.
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    fn name(&self) -> &'static str;

    async fn remove(&self, png_bytes: &[u8]) -> Result<Vec<u8>>;
}

/// HTTP matting API (remove.bg wire format).
pub struct MattingApi {
    endpoint: String,
    api_key: String,
}

impl MattingApi {
    pub fn new(endpoint: String, api_key: String) -> Self {
        MattingApi { endpoint, api_key }
    }
}

#[async_trait]
impl BackgroundRemover for MattingApi {
    fn name(&self) -> &'static str {
        "matting-api"
    }

    async fn remove(&self, png_bytes: &[u8]) -> Result<Vec<u8>> {
        let part = reqwest::multipart::Part::bytes(png_bytes.to_vec())
            .file_name("input.png")
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new()
            .part("image_file", part)
            .text("size", "auto")
            .text("format", "png");

        let client = get_http_client();
        let response = client
            .post(&self.endpoint)
            .header("X-Api-Key", self.api_key.clone())
            .multipart(form)
            .timeout(Duration::from_secs(MATTING_TIMEOUT_SECONDS))
            .send()
            .await
            .map_err(|err| anyhow!("Matting request failed: {err}"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Matting request failed with status {}",
                response.status()
            ));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Identity provider used when no segmentation capability is configured.
/// Returning the input untouched keeps the contract (`clean` adds the alpha
/// channel when decoding) without surfacing an error anywhere.
pub struct Passthrough;

#[async_trait]
impl BackgroundRemover for Passthrough {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    async fn remove(&self, png_bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(png_bytes.to_vec())
    }
}

/// Pick the provider once at startup instead of re-checking availability at
/// every call site.
pub fn select_remover() -> Box<dyn BackgroundRemover> {
    if CONFIG.removebg_api_key.trim().is_empty() {
        info!("No matting API key configured; backgrounds will not be removed.");
        Box::new(Passthrough)
    } else {
        info!("Background removal via {}", CONFIG.removebg_endpoint);
        Box::new(MattingApi::new(
            CONFIG.removebg_endpoint.clone(),
            CONFIG.removebg_api_key.clone(),
        ))
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Fail-open background cleaning. Always returns a valid RGBA image with the
/// input's dimensions: the provider's matte when everything works, otherwise
/// the input converted to fully opaque RGBA. Never an error.
pub async fn clean(remover: &dyn BackgroundRemover, image: &DynamicImage) -> RgbaImage {
    let fallback = || image.to_rgba8();

    let png_bytes = match encode_png(image) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Could not encode image for background removal: {err}");
            return fallback();
        }
    };

    let cleaned_bytes = match remover.remove(&png_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Background removal ({}) failed: {err}", remover.name());
            return fallback();
        }
    };

    match image::load_from_memory(&cleaned_bytes) {
        Ok(cleaned) if cleaned.width() == image.width() && cleaned.height() == image.height() => {
            cleaned.to_rgba8()
        }
        Ok(cleaned) => {
            warn!(
                "Background removal ({}) returned {}x{} for a {}x{} input; keeping the original.",
                remover.name(),
                cleaned.width(),
                cleaned.height(),
                image.width(),
                image.height()
            );
            fallback()
        }
        Err(err) => {
            warn!("Background removal ({}) returned undecodable bytes: {err}", remover.name());
            fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    struct FailingRemover;

    #[async_trait]
    impl BackgroundRemover for FailingRemover {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn remove(&self, _png_bytes: &[u8]) -> Result<Vec<u8>> {
            Err(anyhow!("provider offline"))
        }
    }

    struct MattingStub;

    #[async_trait]
    impl BackgroundRemover for MattingStub {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn remove(&self, png_bytes: &[u8]) -> Result<Vec<u8>> {
            let decoded = image::load_from_memory(png_bytes)?;
            let mut rgba = decoded.to_rgba8();
            // Clear the top-left pixel as a stand-in matte.
            rgba.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
            encode_png(&DynamicImage::ImageRgba8(rgba))
        }
    }

    struct WrongSizeRemover;

    #[async_trait]
    impl BackgroundRemover for WrongSizeRemover {
        fn name(&self) -> &'static str {
            "wrong-size"
        }

        async fn remove(&self, _png_bytes: &[u8]) -> Result<Vec<u8>> {
            let tiny = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
            encode_png(&DynamicImage::ImageRgba8(tiny))
        }
    }

    fn opaque_input() -> DynamicImage {
        let rgb = image::RgbImage::from_pixel(3, 5, image::Rgb([200, 100, 50]));
        DynamicImage::ImageRgb8(rgb)
    }

    #[tokio::test]
    async fn passthrough_keeps_content_and_makes_alpha_opaque() {
        let input = opaque_input();
        let cleaned = clean(&Passthrough, &input).await;

        assert_eq!(cleaned.dimensions(), (3, 5));
        assert!(cleaned.pixels().all(|p| p.0[3] == 255));
        assert_eq!(cleaned.get_pixel(1, 1).0, [200, 100, 50, 255]);
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_the_input() {
        let input = opaque_input();
        let cleaned = clean(&FailingRemover, &input).await;

        assert_eq!(cleaned.dimensions(), (3, 5));
        assert!(cleaned.pixels().all(|p| p.0[3] == 255));
    }

    #[tokio::test]
    async fn successful_matting_yields_a_transparent_pixel() {
        let input = opaque_input();
        let cleaned = clean(&MattingStub, &input).await;

        assert_eq!(cleaned.dimensions(), (3, 5));
        assert_eq!(cleaned.get_pixel(0, 0).0[3], 0);
        assert_eq!(cleaned.get_pixel(2, 4).0[3], 255);
    }

    #[tokio::test]
    async fn dimension_mismatch_from_the_provider_is_rejected() {
        let input = opaque_input();
        let cleaned = clean(&WrongSizeRemover, &input).await;

        assert_eq!(cleaned.dimensions(), (3, 5));
        assert!(cleaned.pixels().all(|p| p.0[3] == 255));
    }
}
