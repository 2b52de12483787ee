use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Credentials and endpoint for a keyed provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct DiffusionConfig {
    pub base_url: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub timeout: Duration,
}

/// Process configuration, loaded once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openai: ProviderConfig,
    pub gemini: ProviderConfig,
    pub diffusion: DiffusionConfig,
    pub content_root: PathBuf,
    pub bind_addr: String,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let timeout = Duration::from_secs(parse_var("PROVIDER_TIMEOUT_SECS", 60));

        let openai = ProviderConfig {
            api_key: api_key_var("OPENAI_API_KEY"),
            model: string_var("OPENAI_MODEL", "gpt-4o-mini"),
            base_url: string_var("OPENAI_BASE_URL", "https://api.openai.com"),
            timeout,
        };

        let gemini = ProviderConfig {
            api_key: api_key_var("GEMINI_API_KEY"),
            model: string_var("GEMINI_MODEL", "gemini-2.0-flash-exp-image-generation"),
            base_url: string_var("GEMINI_BASE_URL", "https://generativelanguage.googleapis.com"),
            timeout,
        };

        let diffusion = DiffusionConfig {
            base_url: string_var("SD_BASE_URL", "http://localhost:7860"),
            width: parse_var("SD_WIDTH", 256),
            height: parse_var("SD_HEIGHT", 256),
            steps: parse_var("SD_STEPS", 20),
            timeout,
        };

        let content_root = env::var("CONTENT_ROOT")
            .map(PathBuf::from)
            .or_else(|_| env::current_dir())
            .unwrap_or_else(|_| PathBuf::from("."));

        Self {
            openai,
            gemini,
            diffusion,
            content_root,
            bind_addr: string_var("BIND_ADDR", "0.0.0.0:8080"),
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", 20 * 1024 * 1024),
        }
    }
}

fn string_var(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn api_key_var(name: &str) -> String {
    match env::var(name) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            log::warn!("⚠️ {} not set, calls to this provider will fail with ConfigurationError", name);
            String::new()
        }
    }
}

fn parse_var<T: std::str::FromStr + std::fmt::Display + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("⚠️ {}={:?} is not valid, using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
