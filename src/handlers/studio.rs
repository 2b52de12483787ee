use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::{ErrorKind, Failure, Modality, NutritionRecord, ProviderRequest, StoredArtifact};
use crate::services::aggregator::{self, Branch};
use crate::services::media::{GEMINI_FOLDER, GEMINI_SUFFIX, SD_FOLDER, SD_SUFFIX};
use crate::services::{extractor, food_info, MediaPersister, ProviderGateway};

pub const CHAT_LABEL: &str = "chatgpt_response";
pub const MULTIMODAL_LABEL: &str = "gemini_response";

/// Body of `/api/save-sd-image`.
#[derive(Debug, Deserialize)]
pub struct SaveImagesRequest {
    #[serde(default)]
    pub images: Vec<String>,
}

/// Every caller-facing operation. Failures come back as readable text (or an
/// explicit `Failure` for food info), never as a panic.
pub struct StudioHandler {
    chat: Arc<dyn ProviderGateway>,
    multimodal: Arc<dyn ProviderGateway>,
    diffusion: Arc<dyn ProviderGateway>,
    persister: MediaPersister,
}

impl StudioHandler {
    pub fn new(
        chat: Arc<dyn ProviderGateway>,
        multimodal: Arc<dyn ProviderGateway>,
        diffusion: Arc<dyn ProviderGateway>,
        persister: MediaPersister,
    ) -> Self {
        Self {
            chat,
            multimodal,
            diffusion,
            persister,
        }
    }

    /// Ask the chat and multimodal providers the same question at once.
    pub async fn chat(&self, message: &str) -> BTreeMap<String, String> {
        log::info!("💬 Chat request ({} chars)", message.chars().count());

        aggregator::combine(vec![
            Branch::new(CHAT_LABEL, self.chat.clone(), ProviderRequest::text(message)),
            Branch::new(
                MULTIMODAL_LABEL,
                self.multimodal.clone(),
                ProviderRequest::text(message).with_modalities(&[Modality::Text]),
            ),
        ])
        .await
    }

    /// Multimodal generation returning the provider's full JSON reply.
    pub async fn gemini_image(&self, prompt: &str) -> String {
        let request =
            ProviderRequest::text(prompt).with_modalities(&[Modality::Text, Modality::Image]);

        match self.multimodal.call(&request).await.into_result() {
            Ok(raw) => raw,
            Err(failure) => aggregator::describe_failure(self.multimodal.name(), &failure),
        }
    }

    /// Diffusion generation returning the provider's JSON reply untouched.
    pub async fn sd_image(&self, prompt: &str) -> String {
        match self.diffusion.call(&ProviderRequest::text(prompt)).await.into_result() {
            Ok(raw) => raw,
            Err(failure) => aggregator::describe_failure(self.diffusion.name(), &failure),
        }
    }

    /// Save the first image of a txt2img reply.
    pub async fn save_sd_image(&self, request: &SaveImagesRequest) -> String {
        let Some(first) = request.images.first() else {
            return save_failed("SD", &Failure::new(ErrorKind::EmptyResponse, "no images in request"));
        };

        match self.persister.persist(first, SD_FOLDER, SD_SUFFIX).await {
            Ok(artifact) => saved_message(&artifact),
            Err(failure) => save_failed("SD", &failure),
        }
    }

    /// Save the first inline image of a multimodal reply.
    pub async fn save_gemini_image(&self, response_json: &str) -> String {
        let media = match extractor::first_inline_media(response_json) {
            Ok(Some(media)) => media,
            Ok(None) => {
                return save_failed(
                    "Gemini",
                    &Failure::new(ErrorKind::ParseError, "reply contains no inline image data"),
                )
            }
            Err(failure) => return save_failed("Gemini", &failure),
        };

        log::debug!("🖼️ Inline media type: {}", media.mime_type);
        match self
            .persister
            .persist(&media.base64_data, GEMINI_FOLDER, GEMINI_SUFFIX)
            .await
        {
            Ok(artifact) => saved_message(&artifact),
            Err(failure) => save_failed("Gemini", &failure),
        }
    }

    /// Identify the food in a photo and estimate its nutrition.
    pub async fn food_info(&self, image: Vec<u8>, mime_type: &str) -> Result<NutritionRecord, Failure> {
        log::info!("📸 Food analysis for {} byte {} image", image.len(), mime_type);

        let request = ProviderRequest::text(food_info::FOOD_INFO_PROMPT).with_image(image, mime_type);
        let raw = self.multimodal.call(&request).await.into_result()?;
        let payload = self.multimodal.extract(&raw)?;
        let record = food_info::parse(&payload)?;

        let pretty = food_info::to_pretty_json(&record)?;
        log::info!("🍽️ Food analysis result:\n{}", pretty);
        Ok(record)
    }
}

fn saved_message(artifact: &StoredArtifact) -> String {
    log::debug!("🕒 {} created at {}", artifact.path.display(), artifact.created_at);
    format!("Saved! File path: {}", artifact.path.display())
}

fn save_failed(source: &str, failure: &Failure) -> String {
    log::error!("❌ {} image save failed: {}", source, failure);
    format!("{} image save failed ({})", source, failure)
}
