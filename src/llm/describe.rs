use tracing::warn;

use crate::llm::gemini::call_gemini_text;

const DESCRIBE_SYSTEM_PROMPT: &str =
    "You are a fashion cataloguer. Return only the requested description text, \
     with no preamble and no markdown.";

fn person_prompt() -> String {
    "Describe the person in this image in detail, focusing on their physical attributes, \
     body shape, pose, stance, skin tone, hair style and color, and facial features. \
     Ignore any clothing they are currently wearing. \
     This description is for an AI model that will generate a new image of this person \
     wearing different clothes, so provide details that help preserve their identity and posture. \
     Provide a concise summary description. Return only the description text."
        .to_string()
}

fn garment_prompt(garment_type: &str, garment_title: &str) -> String {
    let title_part = if garment_title.trim().is_empty() {
        String::new()
    } else {
        format!("The product is called '{}'. ", garment_title.trim())
    };

    format!(
        "{title_part}This is a {garment_type}. Describe only this {garment_type}, focusing on:\n\
         - Color (primary + secondary tones)\n\
         - Texture and fabric (e.g., suede, cotton, denim, etc.)\n\
         - Shape, silhouette, fit (e.g., slim fit, cropped, high-waisted)\n\
         - Fine details: patterns, logos, laces, zippers, collar, stitching, sole (for shoes)\n\
         - Brand or style hints if visible\n\n\
         Output a full, catalog-style description that helps an AI model recreate it exactly. \
         Do NOT include descriptions of background or mannequin. Only return description text."
    )
}

/// Fail-soft: provider failures come back as a text message so the pipeline
/// never stalls on a description.
pub async fn describe_person(image_bytes: Vec<u8>) -> String {
    match call_gemini_text(
        DESCRIBE_SYSTEM_PROMPT,
        &person_prompt(),
        &[image_bytes],
        "describe_person",
    )
    .await
    {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => "Could not generate person description.".to_string(),
        Err(err) => {
            warn!("Person description failed: {err}");
            format!("Error describing person: {err}")
        }
    }
}

pub async fn describe_garment(
    image_bytes: Vec<u8>,
    garment_type: &str,
    garment_title: &str,
) -> String {
    match call_gemini_text(
        DESCRIBE_SYSTEM_PROMPT,
        &garment_prompt(garment_type, garment_title),
        &[image_bytes],
        "describe_garment",
    )
    .await
    {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => format!("Could not generate description for {garment_type}."),
        Err(err) => {
            warn!("Garment description failed for {garment_type}: {err}");
            format!("Error describing {garment_type}: {err}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garment_prompt_mentions_the_product_title_when_present() {
        let prompt = garment_prompt("T-shirt", "Acme Crew Tee");
        assert!(prompt.starts_with("The product is called 'Acme Crew Tee'."));
        assert!(prompt.contains("This is a T-shirt."));
    }

    #[test]
    fn garment_prompt_omits_empty_titles() {
        let prompt = garment_prompt("sneakers", "  ");
        assert!(prompt.starts_with("This is a sneakers."));
    }
}
