use crate::llm::shopping::Product;

/// The three searchable garment categories. The person photo is handled
/// separately because it never comes from the shopping provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GarmentKind {
    Upper,
    Lower,
    Shoes,
}

impl GarmentKind {
    pub const ALL: [GarmentKind; 3] = [GarmentKind::Upper, GarmentKind::Lower, GarmentKind::Shoes];

    /// Working-directory slot name, also used as the file stem under `input/`.
    pub fn slot(self) -> &'static str {
        match self {
            GarmentKind::Upper => "upper",
            GarmentKind::Lower => "lower",
            GarmentKind::Shoes => "shoes",
        }
    }

    /// Fallback search noun when the user gives no terms of their own.
    pub fn noun(self) -> &'static str {
        match self {
            GarmentKind::Upper => "upper body clothing",
            GarmentKind::Lower => "lower body clothing",
            GarmentKind::Shoes => "shoes",
        }
    }

    pub fn display(self) -> &'static str {
        match self {
            GarmentKind::Upper => "Upper Body",
            GarmentKind::Lower => "Lower Body",
            GarmentKind::Shoes => "Shoes",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "upper" | "top" => Some(GarmentKind::Upper),
            "lower" | "bottom" => Some(GarmentKind::Lower),
            "shoes" | "shoe" | "footwear" => Some(GarmentKind::Shoes),
            _ => None,
        }
    }
}

/// One value per garment category.
#[derive(Debug, Clone, Default)]
pub struct OutfitSlots<T> {
    pub upper: T,
    pub lower: T,
    pub shoes: T,
}

impl<T> OutfitSlots<T> {
    pub fn get(&self, kind: GarmentKind) -> &T {
        match kind {
            GarmentKind::Upper => &self.upper,
            GarmentKind::Lower => &self.lower,
            GarmentKind::Shoes => &self.shoes,
        }
    }

    pub fn set(mut self, kind: GarmentKind, value: T) -> Self {
        match kind {
            GarmentKind::Upper => self.upper = value,
            GarmentKind::Lower => self.lower = value,
            GarmentKind::Shoes => self.shoes = value,
        }
        self
    }
}

/// Explicit session record. Every pipeline step takes the current state and
/// returns a new one; the controller owns the latest value and nothing else
/// mutates it. Transitions clear the artifacts they invalidate so a stale
/// description can never feed a fresh prompt.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub gender: String,
    pub results: OutfitSlots<Vec<Product>>,
    pub query_terms: OutfitSlots<String>,
    pub chosen: OutfitSlots<Option<Product>>,
    pub person_photo: bool,
    pub person_description: String,
    pub garment_descriptions: OutfitSlots<Option<String>>,
    pub final_prompt: String,
    pub generated_data_url: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState {
            gender: "unisex".to_string(),
            results: OutfitSlots::default(),
            query_terms: OutfitSlots::default(),
            chosen: OutfitSlots::default(),
            person_photo: false,
            person_description: String::new(),
            garment_descriptions: OutfitSlots::default(),
            final_prompt: String::new(),
            generated_data_url: None,
        }
    }
}

impl SessionState {
    pub fn with_gender(mut self, gender: &str) -> Self {
        self.gender = gender.trim().to_lowercase();
        self
    }

    pub fn with_search_results(
        mut self,
        kind: GarmentKind,
        terms: &str,
        products: Vec<Product>,
    ) -> Self {
        self.results = self.results.set(kind, products);
        self.query_terms = self.query_terms.set(kind, terms.trim().to_string());
        self.chosen = self.chosen.set(kind, None);
        self.garment_descriptions = self.garment_descriptions.set(kind, None);
        self.clear_prompt_and_result()
    }

    pub fn with_chosen(mut self, kind: GarmentKind, product: Product) -> Self {
        self.chosen = self.chosen.set(kind, Some(product));
        self.garment_descriptions = self.garment_descriptions.set(kind, None);
        self.clear_prompt_and_result()
    }

    pub fn with_person_photo(mut self) -> Self {
        self.person_photo = true;
        self.person_description = String::new();
        self.clear_prompt_and_result()
    }

    pub fn with_descriptions(
        mut self,
        person_description: String,
        garment_descriptions: OutfitSlots<Option<String>>,
    ) -> Self {
        self.person_description = person_description;
        self.garment_descriptions = garment_descriptions;
        self.clear_prompt_and_result()
    }

    pub fn with_prompt(mut self, prompt: String) -> Self {
        self.final_prompt = prompt;
        self.generated_data_url = None;
        self
    }

    pub fn with_generated(mut self, data_url: String) -> Self {
        self.generated_data_url = Some(data_url);
        self
    }

    fn clear_prompt_and_result(mut self) -> Self {
        self.final_prompt = String::new();
        self.generated_data_url = None;
        self
    }

    pub fn has_any_garment(&self) -> bool {
        GarmentKind::ALL
            .iter()
            .any(|kind| self.chosen.get(*kind).is_some())
    }

    pub fn describe_ready(&self) -> bool {
        self.person_photo && self.has_any_garment()
    }

    pub fn described(&self) -> bool {
        !self.person_description.is_empty()
            && GarmentKind::ALL
                .iter()
                .any(|kind| self.garment_descriptions.get(*kind).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(title: &str) -> Product {
        Product {
            title: title.to_string(),
            thumbnail: format!("https://example.com/{title}.jpg"),
            price: None,
            source: None,
        }
    }

    #[test]
    fn choosing_a_garment_clears_its_stale_description() {
        let state = SessionState::default()
            .with_descriptions(
                "a person".to_string(),
                OutfitSlots::default().set(GarmentKind::Upper, Some("old jacket".to_string())),
            )
            .with_prompt("old prompt".to_string())
            .with_chosen(GarmentKind::Upper, product("denim jacket"));

        assert!(state.garment_descriptions.get(GarmentKind::Upper).is_none());
        assert!(state.final_prompt.is_empty());
        assert!(state.generated_data_url.is_none());
        assert_eq!(
            state.chosen.get(GarmentKind::Upper).as_ref().unwrap().title,
            "denim jacket"
        );
    }

    #[test]
    fn new_person_photo_invalidates_description_and_result() {
        let state = SessionState::default()
            .with_descriptions("tall person".to_string(), OutfitSlots::default())
            .with_prompt("prompt".to_string())
            .with_generated("data:image/png;base64,AAAA".to_string())
            .with_person_photo();

        assert!(state.person_photo);
        assert!(state.person_description.is_empty());
        assert!(state.final_prompt.is_empty());
        assert!(state.generated_data_url.is_none());
    }

    #[test]
    fn describe_requires_photo_and_at_least_one_garment() {
        let state = SessionState::default();
        assert!(!state.describe_ready());

        let state = state.with_person_photo();
        assert!(!state.describe_ready());

        let state = state.with_chosen(GarmentKind::Shoes, product("sneakers"));
        assert!(state.describe_ready());
    }

    #[test]
    fn search_resets_selection_for_that_category_only() {
        let state = SessionState::default()
            .with_chosen(GarmentKind::Upper, product("hoodie"))
            .with_chosen(GarmentKind::Shoes, product("boots"))
            .with_search_results(GarmentKind::Upper, "linen shirt", vec![product("shirt")]);

        assert!(state.chosen.get(GarmentKind::Upper).is_none());
        assert!(state.chosen.get(GarmentKind::Shoes).is_some());
        assert_eq!(state.query_terms.get(GarmentKind::Upper), "linen shirt");
    }
}
