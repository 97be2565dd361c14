use base64::{engine::general_purpose, Engine as _};

use crate::llm::gemini::{call_gemini_image, InlineImage};

#[derive(Debug, thiserror::Error)]
#[error("Image generation failed: {0}")]
pub struct ImageGenerationError(pub String);

const GENERATION_SYSTEM_PROMPT: &str =
    "Generate the try-on image described by the prompt, using the attached reference collage. \
     CRITICAL: the response must be an image, NOT TEXT.";

/// A generated try-on result: raw bytes for persistence plus the MIME type
/// needed to build a display data URL.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl GeneratedImage {
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Decode a `data:<mime>;base64,<payload>` URL back into bytes. Malformed
/// input is a generation failure, never a panic.
pub fn decode_data_url(url: &str) -> Result<GeneratedImage, ImageGenerationError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| ImageGenerationError("not a data URL".to_string()))?;
    let (mime_type, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| ImageGenerationError("data URL is not base64-encoded".to_string()))?;
    if !mime_type.starts_with("image/") {
        return Err(ImageGenerationError(format!(
            "data URL has non-image MIME type {mime_type}"
        )));
    }
    let bytes = general_purpose::STANDARD
        .decode(payload)
        .map_err(|err| ImageGenerationError(format!("invalid base64 payload: {err}")))?;
    Ok(GeneratedImage {
        bytes,
        mime_type: mime_type.to_string(),
    })
}

/// Submit the reference collage and final prompt to the image model. Single
/// request/response; an empty or malformed payload is a failure, not a crash.
pub async fn generate_tryon(
    collage_png: Vec<u8>,
    final_prompt: &str,
) -> Result<GeneratedImage, ImageGenerationError> {
    let images = call_gemini_image(
        GENERATION_SYSTEM_PROMPT,
        final_prompt,
        &[collage_png],
        "generate_tryon",
    )
    .await
    .map_err(|err| ImageGenerationError(err.to_string()))?;

    let first: InlineImage = images
        .into_iter()
        .next()
        .ok_or_else(|| ImageGenerationError("no image returned by the model".to_string()))?;

    if first.bytes.is_empty() {
        return Err(ImageGenerationError("model returned an empty image payload".to_string()));
    }

    Ok(GeneratedImage {
        bytes: first.bytes,
        mime_type: first.mime_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_round_trips() {
        let generated = GeneratedImage {
            bytes: vec![7, 8, 9],
            mime_type: "image/png".to_string(),
        };
        let url = generated.data_url();
        assert!(url.starts_with("data:image/png;base64,"));

        let decoded = decode_data_url(&url).unwrap();
        assert_eq!(decoded.bytes, vec![7, 8, 9]);
        assert_eq!(decoded.mime_type, "image/png");
    }

    #[test]
    fn malformed_data_urls_are_rejected() {
        assert!(decode_data_url("https://example.com/img.png").is_err());
        assert!(decode_data_url("data:image/png,rawpayload").is_err());
        assert!(decode_data_url("data:text/plain;base64,aGk=").is_err());
        assert!(decode_data_url("data:image/png;base64,!!!").is_err());
    }
}
