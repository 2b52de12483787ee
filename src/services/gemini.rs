use base64::{engine::general_purpose, Engine};
use serde::Serialize;

use super::extractor;
use super::gateway::{build_client, missing_api_key, send_json, ProviderGateway};
use crate::config::ProviderConfig;
use crate::models::{ExtractedPayload, Failure, Modality, ProviderRequest, ProviderResponse};

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseModalities")]
    response_modalities: Vec<Modality>,
}

/// Text-and-image provider speaking the `generateContent` API.
pub struct GeminiGateway {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl GeminiGateway {
    pub fn new(config: ProviderConfig) -> anyhow::Result<Self> {
        let client = build_client(config.timeout)?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_body<'a>(&self, request: &'a ProviderRequest) -> GenerateContentRequest<'a> {
        let mut parts = vec![Part::Text {
            text: &request.prompt,
        }];

        if let Some(bytes) = &request.image_bytes {
            parts.push(Part::Image {
                inline_data: InlineData {
                    mime_type: request
                        .mime_type
                        .clone()
                        .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string()),
                    data: general_purpose::STANDARD.encode(bytes),
                },
            });
        }

        let generation_config = (!request.modalities.is_empty()).then(|| GenerationConfig {
            response_modalities: request.modalities.iter().copied().collect(),
        });

        GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config,
        }
    }
}

#[async_trait::async_trait]
impl ProviderGateway for GeminiGateway {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    async fn call(&self, request: &ProviderRequest) -> ProviderResponse {
        if !self.config.has_api_key() {
            return missing_api_key(self.name());
        }

        let body = self.build_body(request);
        log::info!(
            "🤖 Sending request to Gemini with model: {} (modalities: {:?}, image: {})",
            self.config.model,
            request.modalities,
            request.image_bytes.is_some()
        );

        let http = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())]);

        send_json(self.name(), http, &body).await
    }

    fn extract(&self, raw_body: &str) -> Result<ExtractedPayload, Failure> {
        extractor::extract(raw_body)
    }
}
