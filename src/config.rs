use std::env;

use anyhow::Result;
use once_cell::sync::Lazy;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_image_model: String,
    pub gemini_temperature: f32,
    pub gemini_top_k: i32,
    pub gemini_top_p: f32,
    pub gemini_max_output_tokens: i32,
    pub gemini_safety_settings: String,
    pub serpapi_key: String,
    pub serpapi_endpoint: String,
    pub serpapi_google_domain: String,
    pub search_result_limit: usize,
    pub removebg_api_key: String,
    pub removebg_endpoint: String,
    pub prompt_char_budget: usize,
    pub workspace_root: String,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<i32>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn require_env(name: &str) -> Result<String> {
    let value = env::var(name).unwrap_or_default();
    if value.trim().is_empty() {
        return Err(anyhow::anyhow!(
            "{name} is required; set it in the environment or a .env file"
        ));
    }
    Ok(value)
}

fn normalize_gemini_safety_settings(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "permissive".to_string();
    }

    let lowered = trimmed.to_lowercase();
    match lowered.as_str() {
        "permissive" | "off" | "none" => "permissive".to_string(),
        "standard" => "standard".to_string(),
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}'; defaulting to permissive.",
                value
            );
            "permissive".to_string()
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Both external services are mandatory; fail before any network call.
        let gemini_api_key = require_env("GEMINI_API_KEY")?;
        let serpapi_key = require_env("SERPAPI_KEY")?;

        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            gemini_api_key,
            gemini_model: env_string("GEMINI_MODEL", "gemini-2.5-pro"),
            gemini_image_model: env_string("GEMINI_IMAGE_MODEL", "gemini-3-pro-image-preview"),
            gemini_temperature: env_f32("GEMINI_TEMPERATURE", 0.7),
            gemini_top_k: env_i32("GEMINI_TOP_K", 40),
            gemini_top_p: env_f32("GEMINI_TOP_P", 0.95),
            gemini_max_output_tokens: env_i32("GEMINI_MAX_OUTPUT_TOKENS", 2048),
            gemini_safety_settings: normalize_gemini_safety_settings(env_string(
                "GEMINI_SAFETY_SETTINGS",
                "permissive",
            )),
            serpapi_key,
            serpapi_endpoint: env_string("SERPAPI_ENDPOINT", "https://serpapi.com/search.json"),
            serpapi_google_domain: env_string("SERPAPI_GOOGLE_DOMAIN", "google.com"),
            search_result_limit: env_usize("SEARCH_RESULT_LIMIT", 5),
            removebg_api_key: env_string("REMOVEBG_API_KEY", ""),
            removebg_endpoint: env_string(
                "REMOVEBG_ENDPOINT",
                "https://api.remove.bg/v1.0/removebg",
            ),
            prompt_char_budget: env_usize("PROMPT_CHAR_BUDGET", 800),
            workspace_root: env_string("TRYON_WORKSPACE", "."),
        })
    }
}
