use anyhow::Result;

use crate::config::CONFIG;
use crate::llm::gemini::call_gemini_text;
use crate::state::{GarmentKind, OutfitSlots};

/// Placeholder for garment sections the user never filled in.
pub const NOT_SPECIFIED: &str = "Not specified.";

const TRYON_PROMPT_TEMPLATE: &str = "\
Generate a realistic, full-body image of a person wearing the described outfit.
Use the reference image to preserve the person's identity, skin tone, body shape, and pose exactly.

Important: The input collage contains 4 images in this order:
1. Person reference - use for face-identity, skin tone, pose, and body shape.
2. Shoes - use for rendering footwear.
3. Lower-body garment - use for pants, jeans, trousers.
4. Upper-body garment - use for shirts, jackets, or tops.

Person:
{person_desc}

Garment descriptions:
Upper body clothing:
{upper_desc}

Lower body clothing:
{lower_desc}

Shoes:
{shoe_desc}

Instructions:
- Do not alter the person's face, hair, skin tone, posture, or proportions.
- Face should always be present
- Match the exact color, material, fit, and detailing of each garment.
- Render clothing naturally on the body.
- Use a clean studio background with soft, even lighting.
- Do not add accessories unless described.";

fn optimizer_system_prompt(char_budget: usize) -> String {
    format!(
        "You are a prompt optimizer for image generation models. \
         Rewrite the following prompt to be under {char_budget} characters. \
         Use clean, direct phrasing. Emphasize the reference image order and instructions \
         for each garment placement. \
         Do not remove information about garment details or identity preservation."
    )
}

fn section(descriptions: &OutfitSlots<Option<String>>, kind: GarmentKind) -> String {
    descriptions
        .get(kind)
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .unwrap_or(NOT_SPECIFIED)
        .to_string()
}

/// Pure templating step: fill the fixed try-on template with whatever
/// descriptions exist, substituting the literal placeholder for absent ones.
pub fn fill_template(
    person_description: &str,
    descriptions: &OutfitSlots<Option<String>>,
) -> String {
    let person = if person_description.trim().is_empty() {
        "No person description provided."
    } else {
        person_description.trim()
    };

    TRYON_PROMPT_TEMPLATE
        .replace("{person_desc}", person)
        .replace("{upper_desc}", &section(descriptions, GarmentKind::Upper))
        .replace("{lower_desc}", &section(descriptions, GarmentKind::Lower))
        .replace("{shoe_desc}", &section(descriptions, GarmentKind::Shoes))
}

/// Fill the template, then ask the text model to compress it toward the
/// configured character budget. The budget is a request to the summarizer,
/// not an enforced cap; an empty rewrite falls back to the filled template.
pub async fn compose_final_prompt(
    person_description: &str,
    descriptions: &OutfitSlots<Option<String>>,
) -> Result<String> {
    let detailed = fill_template(person_description, descriptions);
    let summarized = call_gemini_text(
        &optimizer_system_prompt(CONFIG.prompt_char_budget),
        &detailed,
        &[],
        "summarize_prompt",
    )
    .await?;

    let summarized = summarized.trim();
    if summarized.is_empty() {
        return Ok(detailed);
    }
    Ok(summarized.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sections_substitute_the_literal_placeholder() {
        let descriptions = OutfitSlots::default()
            .set(GarmentKind::Upper, Some("red flannel shirt".to_string()))
            .set(GarmentKind::Shoes, Some("   ".to_string()));
        let prompt = fill_template("tall, short dark hair", &descriptions);

        assert!(prompt.contains("red flannel shirt"));
        // Lower is absent, shoes is blank; both collapse to the placeholder.
        assert_eq!(prompt.matches(NOT_SPECIFIED).count(), 2);
        assert!(!prompt.contains("{upper_desc}"));
        assert!(!prompt.contains("{lower_desc}"));
        assert!(!prompt.contains("{shoe_desc}"));
    }

    #[test]
    fn template_always_states_the_reference_order() {
        let prompt = fill_template("", &OutfitSlots::default());
        assert!(!prompt.is_empty());
        assert!(prompt.contains("4 images in this order"));
        assert!(prompt.contains("1. Person reference"));
        assert!(prompt.contains("2. Shoes"));
        assert!(prompt.contains("3. Lower-body garment"));
        assert!(prompt.contains("4. Upper-body garment"));
        assert!(prompt.contains("No person description provided."));
    }
}
