use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tracing::info;

use crate::config::CONFIG;
use crate::state::GarmentKind;
use crate::utils::http::get_http_client;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Deserialize)]
struct ShoppingResponse {
    shopping_results: Option<Vec<ShoppingItem>>,
}

#[derive(Debug, Deserialize)]
struct ShoppingItem {
    title: Option<String>,
    thumbnail: Option<String>,
    price: Option<String>,
    source: Option<String>,
}

/// One shopping result the user can pick as a garment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub title: String,
    pub thumbnail: String,
    pub price: Option<String>,
    pub source: Option<String>,
}

fn extract_products(payload: ShoppingResponse) -> Vec<Product> {
    let mut products = Vec::new();
    for item in payload.shopping_results.unwrap_or_default() {
        let thumbnail = item.thumbnail.unwrap_or_default();
        if thumbnail.trim().is_empty() {
            continue;
        }
        let title = item.title.unwrap_or_else(|| thumbnail.clone());
        products.push(Product {
            title,
            thumbnail,
            price: item.price,
            source: item.source,
        });
    }
    products
}

/// `"{terms} {gender} {category noun}"` with empty pieces dropped, mirroring
/// how a person would type the query into the shopping search box.
pub fn build_query(kind: GarmentKind, gender: &str, terms: &str) -> String {
    let mut pieces = Vec::new();
    if !terms.trim().is_empty() {
        pieces.push(terms.trim());
    }
    if !gender.trim().is_empty() && gender.trim() != "unisex" {
        pieces.push(gender.trim());
    }
    pieces.push(kind.noun());
    pieces.join(" ")
}

/// One provider call per garment category; result ordering is whatever the
/// provider returns.
pub async fn search_garments(
    kind: GarmentKind,
    gender: &str,
    terms: &str,
    max_results: usize,
) -> Result<Vec<Product>> {
    let query = build_query(kind, gender, terms);
    let count = max_results.clamp(1, 20);
    info!(
        "Calling shopping search endpoint {} with query: {}",
        CONFIG.serpapi_endpoint, query
    );

    let client = get_http_client();
    let response = client
        .get(&CONFIG.serpapi_endpoint)
        .query(&[
            ("api_key", CONFIG.serpapi_key.as_str()),
            ("engine", "google_shopping"),
            ("q", query.as_str()),
            ("google_domain", CONFIG.serpapi_google_domain.as_str()),
            ("num", &count.to_string()),
        ])
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
        .send()
        .await
        .map_err(|err| anyhow!("Shopping search request failed: {err}"))?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Shopping search request failed with status {}",
            response.status()
        ));
    }

    let data: ShoppingResponse = response
        .json()
        .await
        .map_err(|err| anyhow!("Invalid shopping search response: {err}"))?;

    Ok(extract_products(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_products_and_skips_entries_without_thumbnails() {
        let payload: ShoppingResponse = serde_json::from_str(
            r#"{
                "shopping_results": [
                    { "title": "Slim denim jacket", "thumbnail": "https://img/1.jpg", "price": "$39.99", "source": "ShopCo" },
                    { "title": "No image item" },
                    { "thumbnail": "https://img/3.jpg" }
                ]
            }"#,
        )
        .unwrap();

        let products = extract_products(payload);
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].title, "Slim denim jacket");
        assert_eq!(products[0].price.as_deref(), Some("$39.99"));
        // Title falls back to the thumbnail URL when absent.
        assert_eq!(products[1].title, "https://img/3.jpg");
    }

    #[test]
    fn missing_results_key_yields_empty_list() {
        let payload: ShoppingResponse = serde_json::from_str("{}").unwrap();
        assert!(extract_products(payload).is_empty());
    }

    #[test]
    fn query_drops_empty_terms_and_unisex_gender() {
        assert_eq!(
            build_query(GarmentKind::Shoes, "female", "white sneakers"),
            "white sneakers female shoes"
        );
        assert_eq!(
            build_query(GarmentKind::Upper, "unisex", ""),
            "upper body clothing"
        );
    }
}
