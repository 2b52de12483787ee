use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};

use super::gateway::{build_client, missing_api_key, send_json, ProviderGateway};
use crate::config::ProviderConfig;
use crate::models::{ErrorKind, ExtractedPayload, Failure, ProviderRequest, ProviderResponse};

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Plain(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ContentPart {
    Text {
        #[serde(rename = "type")]
        content_type: String,
        text: String,
    },
    ImageUrl {
        #[serde(rename = "type")]
        content_type: String,
        image_url: ImageData,
    },
}

#[derive(Debug, Serialize)]
struct ImageData {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ReplyMessage>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// Chat-completion provider (OpenAI-compatible API).
pub struct OpenAiGateway {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAiGateway {
    pub fn new(config: ProviderConfig) -> anyhow::Result<Self> {
        let client = build_client(config.timeout)?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn build_body(&self, request: &ProviderRequest) -> ChatRequest {
        let content = match &request.image_bytes {
            None => MessageContent::Plain(request.prompt.clone()),
            Some(bytes) => {
                let mime_type = request.mime_type.as_deref().unwrap_or("image/jpeg");
                let data_url = format!(
                    "data:{};base64,{}",
                    mime_type,
                    general_purpose::STANDARD.encode(bytes)
                );
                MessageContent::Parts(vec![
                    ContentPart::Text {
                        content_type: "text".to_string(),
                        text: request.prompt.clone(),
                    },
                    ContentPart::ImageUrl {
                        content_type: "image_url".to_string(),
                        image_url: ImageData { url: data_url },
                    },
                ])
            }
        };

        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
        }
    }
}

#[async_trait::async_trait]
impl ProviderGateway for OpenAiGateway {
    fn name(&self) -> &'static str {
        "ChatGPT"
    }

    async fn call(&self, request: &ProviderRequest) -> ProviderResponse {
        if !self.config.has_api_key() {
            return missing_api_key(self.name());
        }

        let body = self.build_body(request);
        log::info!("🤖 Sending request to OpenAI with model: {}", self.config.model);

        let http = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_key));

        send_json(self.name(), http, &body).await
    }

    fn extract(&self, raw_body: &str) -> Result<ExtractedPayload, Failure> {
        let response: ChatResponse = serde_json::from_str(raw_body).map_err(|e| {
            Failure::new(
                ErrorKind::ParseError,
                format!("chat reply is not a completion object: {}", e),
            )
        })?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content);

        Ok(ExtractedPayload {
            text,
            inline_media: None,
        })
    }
}
