use serde::Serialize;
use serde_json::Value;

use super::gateway::{build_client, send_json, ProviderGateway};
use crate::config::DiffusionConfig;
use crate::models::{
    ErrorKind, ExtractedPayload, Failure, InlineMedia, ProviderRequest, ProviderResponse,
};

#[derive(Debug, Serialize)]
struct Txt2ImgRequest<'a> {
    prompt: &'a str,
    width: u32,
    height: u32,
    steps: u32,
}

/// Local Stable Diffusion web UI (`/sdapi/v1/txt2img`).
pub struct DiffusionGateway {
    config: DiffusionConfig,
    client: reqwest::Client,
}

impl DiffusionGateway {
    pub fn new(config: DiffusionConfig) -> anyhow::Result<Self> {
        let client = build_client(config.timeout)?;
        Ok(Self { config, client })
    }
}

#[async_trait::async_trait]
impl ProviderGateway for DiffusionGateway {
    fn name(&self) -> &'static str {
        "StableDiffusion"
    }

    async fn call(&self, request: &ProviderRequest) -> ProviderResponse {
        let base_url = self.config.base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return ProviderResponse::failure(
                ErrorKind::ConfigurationError,
                "Stable Diffusion base URL is not configured",
            );
        }

        let body = Txt2ImgRequest {
            prompt: &request.prompt,
            width: self.config.width,
            height: self.config.height,
            steps: self.config.steps,
        };
        log::info!(
            "🎨 Sending txt2img request ({}x{}, {} steps)",
            body.width,
            body.height,
            body.steps
        );

        let http = self.client.post(format!("{}/sdapi/v1/txt2img", base_url));
        send_json(self.name(), http, &body).await
    }

    /// The first generated image becomes the inline media. Its reply carries
    /// no text fragment.
    fn extract(&self, raw_body: &str) -> Result<ExtractedPayload, Failure> {
        let root: Value = serde_json::from_str(raw_body).map_err(|e| {
            Failure::new(
                ErrorKind::ParseError,
                format!("txt2img reply is not valid JSON: {}", e),
            )
        })?;

        let inline_media = root
            .get("images")
            .and_then(Value::as_array)
            .and_then(|images| images.first())
            .and_then(Value::as_str)
            .map(|data| InlineMedia {
                mime_type: "image/png".to_string(),
                base64_data: data.to_string(),
            });

        Ok(ExtractedPayload {
            text: None,
            inline_media,
        })
    }
}
