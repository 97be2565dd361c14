use tokio::fs;
use tracing::info;

use crate::config::CONFIG;
use crate::imaging::background::{self, BackgroundRemover};
use crate::imaging::collage::Compositor;
use crate::llm::describe::{describe_garment, describe_person};
use crate::llm::generate::{decode_data_url, generate_tryon};
use crate::llm::media::download_media;
use crate::llm::prompt::compose_final_prompt;
use crate::llm::shopping::search_garments;
use crate::state::{GarmentKind, OutfitSlots, SessionState};
use crate::workspace::{Workspace, PERSON_SLOT, REFERENCE_COLLAGE};

/// Drives the fixed step sequence. Every step takes the current session state
/// and returns the next one; on failure it reports the problem and hands the
/// state back unchanged so the user can retry the same step.
pub struct Controller {
    workspace: Workspace,
    remover: Box<dyn BackgroundRemover>,
    compositor: Compositor,
}

impl Controller {
    pub fn new() -> Self {
        Controller {
            workspace: Workspace::new(&CONFIG.workspace_root),
            remover: background::select_remover(),
            compositor: Compositor::new(),
        }
    }

    pub async fn search(
        &self,
        state: SessionState,
        kind: GarmentKind,
        terms: &str,
    ) -> SessionState {
        match search_garments(kind, &state.gender, terms, CONFIG.search_result_limit).await {
            Ok(products) => {
                if products.is_empty() {
                    println!("No {} results for '{}'.", kind.display(), terms);
                } else {
                    println!("{} results:", kind.display());
                    print_products(&products);
                }
                state.with_search_results(kind, terms, products)
            }
            Err(err) => {
                println!("Search failed: {err}");
                state
            }
        }
    }

    pub fn list(&self, state: &SessionState, kind: GarmentKind) {
        let products = state.results.get(kind);
        if products.is_empty() {
            println!("No {} results yet; run `search` first.", kind.display());
        } else {
            print_products(products);
        }
    }

    /// Choose one search result: fetch its thumbnail, clean the background,
    /// and persist it into the garment's input slot.
    pub async fn pick(&self, state: SessionState, kind: GarmentKind, index: usize) -> SessionState {
        let Some(product) = state.results.get(kind).get(index).cloned() else {
            println!(
                "No {} result #{index}; run `list {}` to see what is available.",
                kind.display(),
                kind.slot()
            );
            return state;
        };

        let Some(bytes) = download_media(&product.thumbnail).await else {
            println!("Could not fetch the product image; try another result.");
            return state;
        };

        let decoded = match image::load_from_memory(&bytes) {
            Ok(img) => img,
            Err(err) => {
                println!("Product image could not be decoded: {err}");
                return state;
            }
        };

        let cleaned = background::clean(self.remover.as_ref(), &decoded).await;
        match self.workspace.save_input(kind.slot(), &cleaned) {
            Ok(path) => {
                println!("Saved {} -> {}", product.title, path.display());
                state.with_chosen(kind, product)
            }
            Err(err) => {
                println!("Could not save the cleaned image: {err}");
                state
            }
        }
    }

    /// Load the user's photo from disk, clean it, and persist the person slot.
    pub async fn photo(&self, state: SessionState, path: &str) -> SessionState {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                println!("Could not read {path}: {err}");
                return state;
            }
        };

        let decoded = match image::load_from_memory(&bytes) {
            Ok(img) => img,
            Err(err) => {
                println!("Photo could not be decoded: {err}");
                return state;
            }
        };

        let cleaned = background::clean(self.remover.as_ref(), &decoded).await;
        match self.workspace.save_input(PERSON_SLOT, &cleaned) {
            Ok(saved) => {
                println!("Cleaned and saved your photo to {}", saved.display());
                state.with_person_photo()
            }
            Err(err) => {
                println!("Could not save the cleaned photo: {err}");
                state
            }
        }
    }

    /// Describe the person and every chosen garment. Descriptor calls are
    /// fail-soft, so this step always completes with text in every slot it
    /// attempted.
    pub async fn describe(&self, state: SessionState) -> SessionState {
        if !state.describe_ready() {
            println!("Describe needs your photo and at least one chosen garment.");
            return state;
        }

        let person_bytes = match fs::read(self.workspace.person_path()).await {
            Ok(bytes) => bytes,
            Err(err) => {
                println!("Could not read the saved person photo: {err}");
                return state;
            }
        };

        println!("Describing your photo...");
        let person_description = describe_person(person_bytes).await;
        println!("Person: {}", preview(&person_description));

        let mut descriptions: OutfitSlots<Option<String>> = OutfitSlots::default();
        for kind in GarmentKind::ALL {
            let Some(product) = state.chosen.get(kind).clone() else {
                continue;
            };
            let bytes = match fs::read(self.workspace.garment_path(kind)).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    println!("Skipping {}: {err}", kind.display());
                    continue;
                }
            };

            let garment_type = {
                let terms = state.query_terms.get(kind);
                if terms.is_empty() {
                    kind.noun().to_string()
                } else {
                    terms.clone()
                }
            };
            println!("Describing {}...", kind.display());
            let description = describe_garment(bytes, &garment_type, &product.title).await;
            println!("{}: {}", kind.display(), preview(&description));
            descriptions = descriptions.set(kind, Some(description));
        }

        state.with_descriptions(person_description, descriptions)
    }

    /// Assemble and persist the reference collage. Requires all four slot
    /// files; partially-empty outfits are refused, not rendered blank.
    pub fn collage(&mut self, state: SessionState) -> SessionState {
        let missing = self.workspace.missing_collage_slots();
        if !missing.is_empty() {
            println!(
                "The collage needs all four images; still missing: {}.",
                missing.join(", ")
            );
            return state;
        }

        let loaded = (|| {
            let person = self.workspace.load_input(PERSON_SLOT)?;
            let shoes = self.workspace.load_input(GarmentKind::Shoes.slot())?;
            let lower = self.workspace.load_input(GarmentKind::Lower.slot())?;
            let upper = self.workspace.load_input(GarmentKind::Upper.slot())?;
            anyhow::Ok((person, shoes, lower, upper))
        })();

        let (person, shoes, lower, upper) = match loaded {
            Ok(images) => images,
            Err(err) => {
                println!("Could not load a slot image: {err}");
                return state;
            }
        };

        match self.compositor.compose(&person, &shoes, &lower, &upper) {
            Ok(collage) => match self.workspace.save_input(REFERENCE_COLLAGE, &collage) {
                Ok(path) => {
                    info!(
                        "Composed reference collage {}x{}",
                        collage.width(),
                        collage.height()
                    );
                    println!(
                        "Reference collage ({}x{}) saved to {}",
                        collage.width(),
                        collage.height(),
                        path.display()
                    );
                    state
                }
                Err(err) => {
                    println!("Could not save the collage: {err}");
                    state
                }
            },
            Err(err) => {
                println!("Collage failed: {err}");
                state
            }
        }
    }

    pub async fn prompt(&self, state: SessionState) -> SessionState {
        if !state.described() {
            println!("Missing person or garment descriptions; run `describe` first.");
            return state;
        }

        match compose_final_prompt(&state.person_description, &state.garment_descriptions).await {
            Ok(prompt) => {
                println!("Final prompt ({} chars):\n{prompt}", prompt.chars().count());
                state.with_prompt(prompt)
            }
            Err(err) => {
                println!("Prompt composition failed: {err}");
                state
            }
        }
    }

    pub async fn generate(&self, state: SessionState) -> SessionState {
        if state.final_prompt.is_empty() {
            println!("No final prompt yet; run `prompt` first.");
            return state;
        }
        let collage_bytes = match fs::read(self.workspace.collage_path()).await {
            Ok(bytes) => bytes,
            Err(err) => {
                println!("Could not read the reference collage ({err}); run `collage` first.");
                return state;
            }
        };

        println!("Generating the try-on image...");
        match generate_tryon(collage_bytes, &state.final_prompt).await {
            Ok(generated) => match self.workspace.save_generated(&generated.bytes) {
                Ok(path) => {
                    println!("Try-on image saved to {}", path.display());
                    state.with_generated(generated.data_url())
                }
                Err(err) => {
                    println!("Generated an image but could not save it: {err}");
                    state
                }
            },
            Err(err) => {
                println!("{err}");
                state
            }
        }
    }

    pub fn show(&self, state: &SessionState) {
        match &state.generated_data_url {
            Some(url) => match decode_data_url(url) {
                Ok(generated) => println!(
                    "Generated {} image, {} bytes, saved at {}",
                    generated.mime_type,
                    generated.bytes.len(),
                    self.workspace.generated_path().display()
                ),
                Err(err) => println!("Stored result is unusable: {err}"),
            },
            None => println!("Nothing generated yet; run `generate`."),
        }
    }

    pub fn status(&self, state: &SessionState) {
        println!("Gender: {}", state.gender);
        for kind in GarmentKind::ALL {
            let chosen = state
                .chosen
                .get(kind)
                .as_ref()
                .map(|p| p.title.as_str())
                .unwrap_or("-");
            println!(
                "{:<11} {} result(s), chosen: {}",
                kind.display(),
                state.results.get(kind).len(),
                chosen
            );
        }
        println!(
            "Photo: {}",
            if state.person_photo { "saved" } else { "-" }
        );
        println!(
            "Described: {}",
            if state.described() { "yes" } else { "no" }
        );
        println!(
            "Collage: {}",
            if self.workspace.missing_collage_slots().is_empty() {
                "ready"
            } else {
                "incomplete"
            }
        );
        println!(
            "Prompt: {}",
            if state.final_prompt.is_empty() { "-" } else { "ready" }
        );
        println!(
            "Result: {}",
            match &state.generated_data_url {
                Some(_) => "generated",
                None => "-",
            }
        );
    }
}

fn print_products(products: &[crate::llm::shopping::Product]) {
    for (index, product) in products.iter().enumerate() {
        let price = product.price.as_deref().unwrap_or("");
        let source = product.source.as_deref().unwrap_or("");
        println!("  [{index}] {} {price} {source}", product.title);
    }
}

fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= 160 {
        return flat;
    }
    let truncated: String = flat.chars().take(160).collect();
    format!("{truncated}...")
}
