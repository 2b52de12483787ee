use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Output modality a provider is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Text,
    Image,
}

/// One prompt addressed to a single provider. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    pub prompt: String,
    pub modalities: BTreeSet<Modality>,
    pub image_bytes: Option<Vec<u8>>,
    pub mime_type: Option<String>,
}

impl ProviderRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            modalities: BTreeSet::new(),
            image_bytes: None,
            mime_type: None,
        }
    }

    pub fn with_modalities(mut self, modalities: &[Modality]) -> Self {
        self.modalities = modalities.iter().copied().collect();
        self
    }

    pub fn with_image(mut self, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        self.image_bytes = Some(bytes);
        self.mime_type = Some(mime_type.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConfigurationError,
    TransportError,
    ProviderError,
    EmptyResponse,
    ParseError,
    DecodeError,
    IoError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::ConfigurationError => "ConfigurationError",
            ErrorKind::TransportError => "TransportError",
            ErrorKind::ProviderError => "ProviderError",
            ErrorKind::EmptyResponse => "EmptyResponse",
            ErrorKind::ParseError => "ParseError",
            ErrorKind::DecodeError => "DecodeError",
            ErrorKind::IoError => "IoError",
        };
        write!(f, "{}", s)
    }
}

/// A typed failure raised by any stage of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: ErrorKind,
    pub detail: String,
}

impl Failure {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

impl std::error::Error for Failure {}

/// Outcome of exactly one provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResponse {
    Success { raw_body: String },
    Failure(Failure),
}

impl ProviderResponse {
    pub fn failure(kind: ErrorKind, detail: impl Into<String>) -> Self {
        ProviderResponse::Failure(Failure::new(kind, detail))
    }

    pub fn into_result(self) -> Result<String, Failure> {
        match self {
            ProviderResponse::Success { raw_body } => Ok(raw_body),
            ProviderResponse::Failure(failure) => Err(failure),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineMedia {
    pub mime_type: String,
    pub base64_data: String,
}

/// Normalised content of a successful provider reply. Both fields empty means
/// the provider answered without content, which is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPayload {
    pub text: Option<String>,
    pub inline_media: Option<InlineMedia>,
}

impl ExtractedPayload {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.inline_media.is_none()
    }
}

/// Estimated nutrition per 100 g.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionFacts {
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbohydrates: f64,
    pub calcium: f64,
    #[serde(rename = "omega_3")]
    pub omega3: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionRecord {
    #[serde(rename = "food_name")]
    pub food_name: String,
    #[serde(rename = "nutritionInfo", default)]
    pub nutrition: Option<NutritionFacts>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A media file written to disk. The process keeps no handle on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}
